//! Household device model: nodes, users and their shared enums.

/// Smart-utility connection point.
pub mod node;
/// Id derivation from display names.
pub mod slug;
pub mod types;
/// Virtual household members.
pub mod user;

// Re-export the main types for convenience
pub use node::{NodeRecord, WaveNode};
pub use slug::slugify;
pub use types::{NodeStatus, NodeType};
pub use user::VirtualUser;
