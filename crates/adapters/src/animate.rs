// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use async_trait::async_trait;
use marquee_core::DestinationId;
use thiserror::Error;

/// Errors from the animation service
#[derive(Debug, Error)]
pub enum AnimateError {
    #[error("animation failed: {0}")]
    Failed(String),
}

/// One animation request.
#[derive(Debug, Clone, Default)]
pub struct AnimateRequest {
    pub prompt: Option<String>,
    pub image_path: Option<String>,
    pub target: Option<DestinationId>,
}

/// Result of starting an animation.
#[derive(Debug, Clone, Default)]
pub struct AnimateResult {
    pub animation_id: Option<String>,
}

/// Adapter for the animation back-end.
#[async_trait]
pub trait Animator: Send + Sync + 'static {
    async fn animate(&self, request: &AnimateRequest) -> Result<AnimateResult, AnimateError>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{AnimateError, AnimateRequest, AnimateResult, Animator};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Recording fake animator
    #[derive(Default)]
    pub struct FakeAnimator {
        pub calls: Mutex<Vec<AnimateRequest>>,
        pub fail: Mutex<bool>,
    }

    impl FakeAnimator {
        pub fn set_fail(&self, fail: bool) {
            *self.fail.lock() = fail;
        }
    }

    #[async_trait]
    impl Animator for FakeAnimator {
        async fn animate(
            &self,
            request: &AnimateRequest,
        ) -> Result<AnimateResult, AnimateError> {
            if *self.fail.lock() {
                return Err(AnimateError::Failed("scripted failure".to_string()));
            }
            self.calls.lock().push(request.clone());
            Ok(AnimateResult { animation_id: Some("anim-1".to_string()) })
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeAnimator;
