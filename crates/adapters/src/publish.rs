// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use async_trait::async_trait;
use marquee_core::DestinationId;
use thiserror::Error;

/// Errors from publish operations
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publish failed: {0}")]
    Failed(String),
}

/// Options accompanying a publish.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Silent mode stores to the destination's bucket without a
    /// user-visible overlay.
    pub silent: bool,
    pub metadata: Option<serde_json::Value>,
    pub batch_id: Option<String>,
}

/// Result of a publish.
#[derive(Debug, Clone, Default)]
pub struct PublishResult {
    pub success: bool,
    pub meta: Option<serde_json::Value>,
}

/// Adapter for routing finished media to destination buckets.
#[async_trait]
pub trait Publisher: Send + Sync + 'static {
    /// Publish `source` to a destination's bucket.
    async fn publish(
        &self,
        source: &str,
        destination: &DestinationId,
        options: &PublishOptions,
    ) -> Result<PublishResult, PublishError>;

    /// Drop bucket entries older than `days` for the destination.
    async fn purge(&self, destination: &DestinationId, days: f64) -> Result<(), PublishError>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{PublishError, PublishOptions, PublishResult, Publisher};
    use async_trait::async_trait;
    use marquee_core::DestinationId;
    use parking_lot::Mutex;

    /// Recorded publish call
    #[derive(Debug, Clone)]
    pub struct PublishCall {
        pub source: String,
        pub destination: DestinationId,
        pub silent: bool,
    }

    /// Recording fake publisher
    #[derive(Default)]
    pub struct FakePublisher {
        pub calls: Mutex<Vec<PublishCall>>,
        pub purges: Mutex<Vec<(DestinationId, f64)>>,
        pub fail: Mutex<bool>,
        /// Return `success = false` without erroring (bucket refused the
        /// entry), still recording the attempt.
        pub refuse: Mutex<bool>,
    }

    impl FakePublisher {
        pub fn set_fail(&self, fail: bool) {
            *self.fail.lock() = fail;
        }

        pub fn set_refuse(&self, refuse: bool) {
            *self.refuse.lock() = refuse;
        }
    }

    #[async_trait]
    impl Publisher for FakePublisher {
        async fn publish(
            &self,
            source: &str,
            destination: &DestinationId,
            options: &PublishOptions,
        ) -> Result<PublishResult, PublishError> {
            if *self.fail.lock() {
                return Err(PublishError::Failed("scripted failure".to_string()));
            }
            self.calls.lock().push(PublishCall {
                source: source.to_string(),
                destination: destination.clone(),
                silent: options.silent,
            });
            if *self.refuse.lock() {
                return Ok(PublishResult { success: false, meta: None });
            }
            Ok(PublishResult { success: true, meta: None })
        }

        async fn purge(
            &self,
            destination: &DestinationId,
            days: f64,
        ) -> Result<(), PublishError> {
            self.purges.lock().push((destination.clone(), days));
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakePublisher, PublishCall};

#[cfg(test)]
#[path = "publish_tests.rs"]
mod tests;
