//! In-session tab record.

use serde::{Deserialize, Serialize};

/// An open document in the current session. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub document_id: String,
    pub title: String,
}

impl Tab {
    pub fn new(document_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            title: title.into(),
        }
    }
}
