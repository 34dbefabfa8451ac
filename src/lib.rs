//! Bidirectional task synchronization between a Trello board and a Notion
//! database.

pub mod config;
pub mod mapper;
pub mod model;
pub mod notion;
pub mod sync;
pub mod trello;
pub mod watcher;
