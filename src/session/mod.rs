pub mod chain;
pub mod dedup;
pub mod error;
pub mod manager;
pub mod router;
pub mod state;

pub use error::SessionError;
pub use manager::{SessionEvent, SessionManager};
