use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: Uuid,
    pub name: String,
    /// `None` places the folder at the root.
    pub parent_ref: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Folder {
    pub fn new(name: impl Into<String>, parent_ref: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            parent_ref,
            created_at: Utc::now(),
        }
    }
}
