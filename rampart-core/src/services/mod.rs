//! Service layer for the blocking engine's business logic.

pub mod blocking;
pub mod login;

pub use blocking::{BlockStatistics, BlockingService};
pub use login::{FailedLoginOutcome, LoginProtectionService};
