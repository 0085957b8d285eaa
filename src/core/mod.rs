//! Connection layer: negotiation, status fetching, and periodic refresh.

pub mod auth_plan;
pub mod http;
pub mod logging;
pub mod manager;
pub mod models;
pub mod negotiator;
pub mod scheduler;
pub mod status;

pub use auth_plan::{AuthPlan, StrategyAttempt, StrategyId};
pub use manager::ConnectionManager;
pub use models::{ConnectionProfile, ConnectionStatus, CredentialMode, Credentials, ServerStatus};
pub use negotiator::AuthNegotiator;
pub use scheduler::{RefreshCallback, RefreshInterval, RefreshScheduler, refresh_callback};
pub use status::StatusFetcher;
