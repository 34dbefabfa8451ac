use serde::Deserialize;
use serde_json::{Map, Value};

/// A page (database entry) with its opaque property bag. Typed accessors
/// pull out the property kinds this synchronizer recognizes; they accept
/// both the read shape the query API returns (with `plain_text`) and the
/// write shape this crate builds (bare `text.content`).
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Page {
    pub fn prop(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn title(&self, name: &str) -> Option<String> {
        self.prop(name).and_then(prop::title)
    }

    pub fn rich_text(&self, name: &str) -> Option<String> {
        self.prop(name).and_then(prop::rich_text)
    }

    pub fn select(&self, name: &str) -> Option<String> {
        self.prop(name).and_then(prop::select)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.prop(name).and_then(prop::number)
    }

    pub fn formula_number(&self, name: &str) -> Option<f64> {
        self.prop(name).and_then(prop::formula_number)
    }

    pub fn checkbox(&self, name: &str) -> Option<bool> {
        self.prop(name).and_then(prop::checkbox)
    }
}

/// Per-variant extraction from a single property value.
pub mod prop {
    use serde_json::Value;

    fn segments_text(segments: &Value) -> Option<String> {
        let parts = segments.as_array()?;
        let mut out = String::new();
        for part in parts {
            if let Some(text) = part.get("plain_text").and_then(Value::as_str) {
                out.push_str(text);
            } else if let Some(text) = part
                .get("text")
                .and_then(|t| t.get("content"))
                .and_then(Value::as_str)
            {
                out.push_str(text);
            }
        }
        if parts.is_empty() {
            None
        } else {
            Some(out)
        }
    }

    pub fn title(v: &Value) -> Option<String> {
        segments_text(v.get("title")?)
    }

    pub fn rich_text(v: &Value) -> Option<String> {
        segments_text(v.get("rich_text")?)
    }

    pub fn select(v: &Value) -> Option<String> {
        v.get("select")?
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn number(v: &Value) -> Option<f64> {
        v.get("number")?.as_f64()
    }

    pub fn formula_number(v: &Value) -> Option<f64> {
        v.get("formula")?.get("number")?.as_f64()
    }

    pub fn checkbox(v: &Value) -> Option<bool> {
        v.get("checkbox")?.as_bool()
    }
}

/// One page of results from the database query endpoint.
#[derive(Debug, Deserialize)]
pub struct QueryDatabaseResp {
    pub results: Vec<Page>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_page() -> Page {
        serde_json::from_value(json!({
            "id": "page-1",
            "archived": false,
            "properties": {
                "Priority Name": {
                    "title": [ { "plain_text": "Task A", "text": { "content": "Task A" } } ]
                },
                "Department": { "select": { "name": "Doing" } },
                "Reach": { "number": 5 },
                "Total Score": { "formula": { "type": "number", "number": 42.5 } },
                "Synced": { "checkbox": true },
                "Trello Card ID": {
                    "rich_text": [ { "plain_text": "card-abc" } ]
                },
                "Effort": { "number": null },
                "Empty Ref": { "rich_text": [] }
            }
        }))
        .unwrap()
    }

    #[test]
    fn accessors_read_query_shapes() {
        let page = sample_page();
        assert_eq!(page.title("Priority Name").as_deref(), Some("Task A"));
        assert_eq!(page.select("Department").as_deref(), Some("Doing"));
        assert_eq!(page.number("Reach"), Some(5.0));
        assert_eq!(page.formula_number("Total Score"), Some(42.5));
        assert_eq!(page.checkbox("Synced"), Some(true));
        assert_eq!(page.rich_text("Trello Card ID").as_deref(), Some("card-abc"));
    }

    #[test]
    fn null_and_empty_properties_are_absent() {
        let page = sample_page();
        assert_eq!(page.number("Effort"), None);
        assert_eq!(page.rich_text("Empty Ref"), None);
        assert_eq!(page.select("Missing"), None);
    }

    #[test]
    fn accessors_read_write_shapes() {
        let page: Page = serde_json::from_value(json!({
            "id": "page-2",
            "properties": {
                "Priority Name": { "title": [ { "text": { "content": "Built" } } ] },
                "Trello Card ID": { "rich_text": [ { "text": { "content": "card-x" } } ] }
            }
        }))
        .unwrap();
        assert_eq!(page.title("Priority Name").as_deref(), Some("Built"));
        assert_eq!(page.rich_text("Trello Card ID").as_deref(), Some("card-x"));
    }

    #[test]
    fn query_response_parses_cursor() {
        let resp: QueryDatabaseResp = serde_json::from_value(json!({
            "results": [],
            "has_more": true,
            "next_cursor": "cur-1"
        }))
        .unwrap();
        assert!(resp.has_more);
        assert_eq!(resp.next_cursor.as_deref(), Some("cur-1"));
    }
}
