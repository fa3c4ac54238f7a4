use serde::{Deserialize, Serialize};

/// A make from the static brand catalog. Unique by name, case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    pub id: u32,
    pub name: String,
}

impl Brand {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
