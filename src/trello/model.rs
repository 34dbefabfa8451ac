use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A card on the board. `custom_field_items` only contains fields that have
/// a value set; unset fields are absent from the listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub name: String,
    pub id_list: String,
    #[serde(default)]
    pub custom_field_items: Vec<CustomFieldItem>,
    #[serde(default)]
    pub date_last_activity: Option<DateTime<Utc>>,
}

/// One custom field value attached to a card, keyed by the opaque field id.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldItem {
    pub id_custom_field: String,
    #[serde(default)]
    pub value: Option<CustomFieldValue>,
}

/// The raw value union as Trello transmits it. Numbers and booleans arrive
/// as strings; exactly one variant is populated per item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomFieldValue {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub checked: Option<String>,
}

/// A list (workflow stage) on the board.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardList {
    pub id: String,
    pub name: String,
}

/// A custom field definition scoped to the board. Translates between human
/// field names and the ids the field-update API expects.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomFieldDef {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

/// An entry from the board's activity log. Only the type and timestamp are
/// ever inspected.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardAction {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: String,
    pub date: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_parses_with_custom_fields() {
        let raw = r#"{
            "id": "card-1",
            "name": "Task A",
            "idList": "list-1",
            "dateLastActivity": "2024-03-01T12:00:00.000Z",
            "customFieldItems": [
                { "idCustomField": "cf-reach", "value": { "number": "5" } },
                { "idCustomField": "cf-synced", "value": { "checked": "true" } }
            ]
        }"#;
        let card: Card = serde_json::from_str(raw).unwrap();
        assert_eq!(card.id, "card-1");
        assert_eq!(card.id_list, "list-1");
        assert_eq!(card.custom_field_items.len(), 2);
        let value = card.custom_field_items[0].value.as_ref().unwrap();
        assert_eq!(value.number.as_deref(), Some("5"));
        assert!(card.date_last_activity.is_some());
    }

    #[test]
    fn card_parses_without_custom_fields() {
        let raw = r#"{ "id": "card-2", "name": "Bare", "idList": "list-1" }"#;
        let card: Card = serde_json::from_str(raw).unwrap();
        assert!(card.custom_field_items.is_empty());
        assert!(card.date_last_activity.is_none());
    }

    #[test]
    fn field_definition_parses_type() {
        let raw = r#"{ "id": "cf-1", "name": "Reach", "type": "number" }"#;
        let def: CustomFieldDef = serde_json::from_str(raw).unwrap();
        assert_eq!(def.name, "Reach");
        assert_eq!(def.field_type, "number");
    }

    #[test]
    fn action_parses_type_and_date() {
        let raw = r#"{ "id": "act-1", "type": "updateCard", "date": "2024-03-01T12:00:00.000Z" }"#;
        let action: BoardAction = serde_json::from_str(raw).unwrap();
        assert_eq!(action.action_type, "updateCard");
    }
}
