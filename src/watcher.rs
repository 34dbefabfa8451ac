//! Change trigger: polls the board's activity log and reports when cards
//! were created or edited since the last check.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::trello::BoardService;

/// Action types that count as a board change. Contents beyond the type are
/// never inspected.
pub const WATCHED_ACTIONS: [&str; 3] = ["createCard", "updateCard", "updateCustomFieldItem"];

/// What a poll observed: how many relevant actions occurred and their types.
#[derive(Debug, Clone)]
pub struct ChangeSummary {
    pub actions: usize,
    pub kinds: Vec<String>,
}

pub struct ChangeWatcher<B> {
    board: B,
    since: DateTime<Utc>,
}

impl<B: BoardService> ChangeWatcher<B> {
    pub fn new(board: B) -> Self {
        Self {
            board,
            since: Utc::now(),
        }
    }

    /// Check the activity log once. On success the cursor advances to now,
    /// so a burst of changes within one interval coalesces into a single
    /// summary and is reported at most once. A fetch failure leaves the
    /// cursor untouched; the interval is re-read on the next poll.
    pub async fn poll(&mut self) -> Result<Option<ChangeSummary>> {
        let actions = self.board.list_actions(self.since).await?;
        self.since = Utc::now();

        let kinds: Vec<String> = actions
            .iter()
            .filter(|a| WATCHED_ACTIONS.contains(&a.action_type.as_str()))
            .map(|a| a.action_type.clone())
            .collect();
        if kinds.is_empty() {
            debug!("no board activity since last check");
            return Ok(None);
        }
        Ok(Some(ChangeSummary {
            actions: kinds.len(),
            kinds,
        }))
    }
}
