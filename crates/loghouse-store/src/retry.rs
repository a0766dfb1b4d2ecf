//! Bounded-retry connection establishment.
//!
//! Stores are reached over the network and may come up after the services
//! that depend on them. Startup therefore retries the initial connection a
//! bounded number of times at a fixed interval, then gives up with
//! [`StoreError::Unavailable`]. This only applies to process startup; once
//! a pool is established, individual operations are not retried here.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{Result, StoreError};

/// Retry budget for establishing a store connection.
#[derive(Debug, Clone, Copy)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_secs(5),
        }
    }
}

/// Run `connect` until it succeeds or the budget is exhausted.
///
/// `what` names the store for log lines ("payload store", "index store").
pub async fn connect_with_retry<T, F, Fut>(
    what: &str,
    settings: RetrySettings,
    mut connect: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;
    for attempt in 1..=settings.max_attempts {
        match connect().await {
            Ok(connection) => {
                info!(store = what, attempt, "Connected");
                return Ok(connection);
            }
            Err(e) => {
                warn!(
                    store = what,
                    attempt,
                    max_attempts = settings.max_attempts,
                    error = %e,
                    "Connection failed"
                );
                last_error = Some(e);
                if attempt < settings.max_attempts {
                    tokio::time::sleep(settings.interval).await;
                }
            }
        }
    }

    Err(StoreError::Unavailable(format!(
        "could not connect to {} after {} attempts: {}",
        what,
        settings.max_attempts,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}
