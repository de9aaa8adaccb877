// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use async_trait::async_trait;
use marquee_core::DestinationId;
use thiserror::Error;

/// Errors from device control
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device command failed: {0}")]
    Failed(String),
}

/// Adapter for power/state control of the physical device behind a
/// destination (originally a Samsung TV websocket driver).
#[async_trait]
pub trait DeviceDriver: Send + Sync + 'static {
    async fn wake(&self, destination: &DestinationId) -> Result<(), DeviceError>;
    async fn sleep(&self, destination: &DestinationId) -> Result<(), DeviceError>;
    async fn standby(&self, destination: &DestinationId) -> Result<(), DeviceError>;
    /// Re-sync the device's media/art channel.
    async fn sync_media(&self, destination: &DestinationId) -> Result<(), DeviceError>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{DeviceDriver, DeviceError};
    use async_trait::async_trait;
    use marquee_core::DestinationId;
    use parking_lot::Mutex;

    /// Recording fake device driver; stores `(command, destination)` pairs.
    #[derive(Default)]
    pub struct FakeDevice {
        pub calls: Mutex<Vec<(String, DestinationId)>>,
    }

    impl FakeDevice {
        fn record(&self, command: &str, destination: &DestinationId) {
            self.calls.lock().push((command.to_string(), destination.clone()));
        }
    }

    #[async_trait]
    impl DeviceDriver for FakeDevice {
        async fn wake(&self, destination: &DestinationId) -> Result<(), DeviceError> {
            self.record("wake", destination);
            Ok(())
        }

        async fn sleep(&self, destination: &DestinationId) -> Result<(), DeviceError> {
            self.record("sleep", destination);
            Ok(())
        }

        async fn standby(&self, destination: &DestinationId) -> Result<(), DeviceError> {
            self.record("standby", destination);
            Ok(())
        }

        async fn sync_media(&self, destination: &DestinationId) -> Result<(), DeviceError> {
            self.record("sync_media", destination);
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeDevice;
