use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};

#[cfg(test)]
use mockall::automock;

/// Represents an entity responsible for providing dates across application. This can allow it to
/// be used for testing
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    /// Current wall clock time in the local time zone. Day and time keys are derived from it.
    fn time(&self) -> DateTime<Local>;

    async fn sleep(&self, duration: Duration);
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Local> {
        Local::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
