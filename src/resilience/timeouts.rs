//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap upstream work with a deadline
//! - Cancel the wrapped future cleanly on expiry
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors

use std::future::Future;
use std::time::Duration;

use crate::error::GatewayError;

/// Run `fut` with a deadline. Dropping the inner future on expiry aborts
/// the outbound connection.
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(res) => res,
        Err(_) => Err(GatewayError::UpstreamTimeout(deadline)),
    }
}
