use async_trait::async_trait;

use crate::domain::{DomainError, LocationFix};

/// Port for one location poll.
///
/// The tracker calls this on its interval; a failure leaves the previously
/// cached fix untouched and is logged, never surfaced to the operator.
#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn current_fix(&self) -> Result<LocationFix, DomainError>;
}
