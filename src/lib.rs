pub mod browser;
pub mod checkout;
pub mod config;
pub mod differ;
pub mod extractor;
pub mod matcher;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod state_store;
pub mod utils;

// Re-export commonly used types
pub use checkout::{CheckoutEngine, CheckoutOutcome, CheckoutPage};
pub use config::{AppConfig, PurchaseConfig};
pub use models::{ChangeEvent, ChangeKind, ScheduleSnapshot, ScreeningRecord, TicketStatus};
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
