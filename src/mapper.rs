//! Pure translation layer between board cards and database entries.
//!
//! Everything here is stateless: resolving raw custom-field items into named
//! [`FieldValue`]s, building Notion property maps from a card, recovering a
//! card update from a page, and the change predicate both sync directions
//! share.

use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::model::{
    FieldValue, CARD_ID_PROP, DEPARTMENT_PROP, SCORE_FIELDS, SYNCED_FIELD, TITLE_PROP,
};
use crate::notion::Page;
use crate::trello::{Card, CustomFieldDef};

/// Tolerance for numeric comparison. Values round-trip through two remote
/// APIs with string encodings in between.
pub const NUMERIC_TOLERANCE: f64 = 0.001;

/// The board-side update recovered from a database entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CardUpdate {
    pub name: Option<String>,
    pub fields: Vec<(String, FieldValue)>,
}

/// Resolve a card's opaque field-id-keyed items to named values.
///
/// Each item takes the first populated variant of {number, text, checked}.
/// A number-typed field whose value is unset or unparseable resolves to 0.
/// Items referencing a definition the board no longer has are skipped.
pub fn extract_field_values(card: &Card, defs: &[CustomFieldDef]) -> HashMap<String, FieldValue> {
    let by_id: HashMap<&str, &CustomFieldDef> =
        defs.iter().map(|d| (d.id.as_str(), d)).collect();
    let mut out = HashMap::new();
    for item in &card.custom_field_items {
        let Some(def) = by_id.get(item.id_custom_field.as_str()) else {
            continue;
        };
        let resolved = item.value.as_ref().and_then(|value| {
            if let Some(n) = value.number.as_deref() {
                n.trim().parse().ok().map(FieldValue::Number)
            } else if let Some(t) = &value.text {
                Some(FieldValue::Text(t.clone()))
            } else {
                value
                    .checked
                    .as_deref()
                    .map(|c| FieldValue::Bool(c.trim().eq_ignore_ascii_case("true")))
            }
        });
        match resolved {
            Some(v) => {
                out.insert(def.name.clone(), v);
            }
            None if def.field_type == "number" => {
                out.insert(def.name.clone(), FieldValue::Number(0.0));
            }
            None => {}
        }
    }
    out
}

/// Map a card into the full database property set: title, Department (list
/// name or "Unknown"), the cross-reference id, whichever score fields carry
/// a numeric value, and the synced marker (always true — the entry has been
/// produced or confirmed by a sync pass).
pub fn to_notion_properties(
    card: &Card,
    values: &HashMap<String, FieldValue>,
    list_name: Option<&str>,
) -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert(TITLE_PROP.to_string(), title_prop(&card.name));
    properties.insert(
        DEPARTMENT_PROP.to_string(),
        select_prop(list_name.unwrap_or("Unknown")),
    );
    properties.insert(CARD_ID_PROP.to_string(), rich_text_prop(&card.id));
    for field in SCORE_FIELDS {
        if let Some(n) = values.get(field).and_then(FieldValue::as_number) {
            properties.insert(field.to_string(), number_prop(n));
        }
    }
    properties.insert(SYNCED_FIELD.to_string(), checkbox_prop(true));
    properties
}

/// Inverse mapping: title and score fields present on the page, plus the
/// forced synced marker.
pub fn to_card_update(page: &Page) -> CardUpdate {
    let name = page.title(TITLE_PROP);
    let mut fields = Vec::new();
    for field in SCORE_FIELDS {
        if let Some(n) = page.number(field) {
            fields.push((field.to_string(), FieldValue::Number(n)));
        }
    }
    fields.push((SYNCED_FIELD.to_string(), FieldValue::Bool(true)));
    CardUpdate { name, fields }
}

/// The change predicate. Two numbers differ beyond the tolerance; anything
/// else differs when the trimmed string forms differ; presence on exactly
/// one side always differs.
pub fn values_differ(a: Option<&FieldValue>, b: Option<&FieldValue>) -> bool {
    match (a, b) {
        (None, None) => false,
        (None, Some(_)) | (Some(_), None) => true,
        (Some(FieldValue::Number(x)), Some(FieldValue::Number(y))) => {
            (x - y).abs() > NUMERIC_TOLERANCE
        }
        (Some(a), Some(b)) => a.string_form().trim() != b.string_form().trim(),
    }
}

/// Public permalink for a page, pushed one-way into the board's back-link
/// field.
pub fn page_permalink(page_id: &str) -> String {
    format!("https://www.notion.so/{}", page_id.replace('-', ""))
}

pub fn title_prop(content: &str) -> Value {
    json!({ "title": [ { "text": { "content": content } } ] })
}

pub fn rich_text_prop(content: &str) -> Value {
    json!({ "rich_text": [ { "text": { "content": content } } ] })
}

pub fn select_prop(name: &str) -> Value {
    json!({ "select": { "name": name } })
}

pub fn number_prop(n: f64) -> Value {
    json!({ "number": n })
}

pub fn checkbox_prop(checked: bool) -> Value {
    json!({ "checkbox": checked })
}
