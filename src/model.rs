use serde::{Deserialize, Serialize};

/// Custom field names bridged between the board and the database.
/// Names are case-sensitive and must match on both sides.
pub const SCORE_FIELDS: [&str; 4] = ["Reach", "Confidence", "Effort", "Impact"];
pub const TOTAL_SCORE_FIELD: &str = "Total Score";
pub const SYNCED_FIELD: &str = "Synced";
pub const NOTION_LINK_FIELD: &str = "Notion Link";

/// Notion property names on the database side.
pub const TITLE_PROP: &str = "Priority Name";
pub const DEPARTMENT_PROP: &str = "Department";
pub const CARD_ID_PROP: &str = "Trello Card ID";

/// A resolved custom field value. Trello transmits numbers and booleans as
/// strings; this union is the normalized form both sync directions work with.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Bool(bool),
}

impl FieldValue {
    /// Numeric coercion. Non-numeric text yields `None` rather than an error.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse().ok(),
            FieldValue::Bool(_) => None,
        }
    }

    /// The string form used for non-numeric comparisons and for the Trello
    /// custom-field wire format.
    pub fn string_form(&self) -> String {
        match self {
            FieldValue::Number(n) => format!("{}", n),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Bool(b) => (if *b { "true" } else { "false" }).to_string(),
        }
    }
}

/// Created/updated counters for one propagation direction.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectionStats {
    pub created: u32,
    pub updated: u32,
}

/// Outcome of one reconciliation pass. Constructed fresh per pass and
/// returned by value; per-record failures are tallied in `errors` without
/// aborting the pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncStats {
    pub trello_to_notion: DirectionStats,
    pub notion_to_trello: DirectionStats,
    pub errors: u32,
}

impl SyncStats {
    pub fn total_changes(&self) -> u32 {
        self.trello_to_notion.created
            + self.trello_to_notion.updated
            + self.notion_to_trello.created
            + self.notion_to_trello.updated
    }
}
