//! Party service HTTP client.

mod config;
mod native;
pub mod retry;

pub use config::{ClientConfig, DEFAULT_BASE_URL};
pub use native::HttpPartyService;
pub use retry::{parse_retry_after, RetryConfig, RetryDecision, RetryState};
