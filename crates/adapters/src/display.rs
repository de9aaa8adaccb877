// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use async_trait::async_trait;
use marquee_core::DestinationId;
use thiserror::Error;

/// Errors from display operations
#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("display failed: {0}")]
    Failed(String),
}

/// Adapter for driving what a destination currently shows.
#[async_trait]
pub trait DisplayDriver: Send + Sync + 'static {
    /// Show `mode` (e.g. a bucket entry name, "Random", "Blank") on the
    /// destination.
    async fn show(
        &self,
        destination: &DestinationId,
        mode: &str,
        silent: bool,
    ) -> Result<(), DisplayError>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{DisplayDriver, DisplayError};
    use async_trait::async_trait;
    use marquee_core::DestinationId;
    use parking_lot::Mutex;

    /// Recorded display call
    #[derive(Debug, Clone)]
    pub struct DisplayCall {
        pub destination: DestinationId,
        pub mode: String,
        pub silent: bool,
    }

    /// Recording fake display driver
    #[derive(Default)]
    pub struct FakeDisplay {
        pub calls: Mutex<Vec<DisplayCall>>,
        pub fail: Mutex<bool>,
    }

    impl FakeDisplay {
        pub fn set_fail(&self, fail: bool) {
            *self.fail.lock() = fail;
        }
    }

    #[async_trait]
    impl DisplayDriver for FakeDisplay {
        async fn show(
            &self,
            destination: &DestinationId,
            mode: &str,
            silent: bool,
        ) -> Result<(), DisplayError> {
            if *self.fail.lock() {
                return Err(DisplayError::Failed("scripted failure".to_string()));
            }
            self.calls.lock().push(DisplayCall {
                destination: destination.clone(),
                mode: mode.to_string(),
                silent,
            });
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{DisplayCall, FakeDisplay};
