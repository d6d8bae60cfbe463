use serde::{Deserialize, Serialize};

pub mod change;
pub mod screening;

// Re-exports for convenience
pub use change::*;
pub use screening::*;

// Common enums used across models
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Unknown,
    Available,
    SoldOut,
    Waitlist,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    NewAvailable,
    NowAvailable,
    PurchaseSuccess,
    PurchaseFailed,
}

/// Canonical form used for snapshot keys and rule matching: lowercased,
/// trimmed, internal whitespace collapsed to single spaces.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
