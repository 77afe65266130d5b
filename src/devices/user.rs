use serde::{Deserialize, Serialize};

/// A virtual household member that nodes can be assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualUser {
    /// Unique name of the user.
    pub username: String,
}

impl VirtualUser {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}
