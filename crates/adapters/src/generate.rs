// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use async_trait::async_trait;
use marquee_core::DestinationId;
use thiserror::Error;

/// Errors from the generation service
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("generation failed: {0}")]
    Failed(String),
}

/// One generation request.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub prompt: String,
    pub images: Vec<String>,
    pub refiner: Option<String>,
    pub workflow: Option<String>,
    /// Destinations to publish to; empty means generate without publishing.
    pub targets: Vec<DestinationId>,
    pub extra: Option<serde_json::Value>,
}

/// One generated output.
#[derive(Debug, Clone, Default)]
pub struct GenerateResult {
    pub message: String,
    pub published_path: Option<String>,
}

/// Adapter for the image generation back-end.
#[async_trait]
pub trait Generator: Send + Sync + 'static {
    async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<Vec<GenerateResult>, GenerateError>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{GenerateError, GenerateRequest, GenerateResult, Generator};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Recording fake generator
    #[derive(Default)]
    pub struct FakeGenerator {
        pub calls: Mutex<Vec<GenerateRequest>>,
        pub fail: Mutex<bool>,
    }

    impl FakeGenerator {
        pub fn set_fail(&self, fail: bool) {
            *self.fail.lock() = fail;
        }
    }

    #[async_trait]
    impl Generator for FakeGenerator {
        async fn generate(
            &self,
            request: &GenerateRequest,
        ) -> Result<Vec<GenerateResult>, GenerateError> {
            if *self.fail.lock() {
                return Err(GenerateError::Failed("scripted failure".to_string()));
            }
            self.calls.lock().push(request.clone());
            Ok(vec![GenerateResult {
                message: format!("generated:{}", request.prompt),
                published_path: request
                    .targets
                    .first()
                    .map(|t| format!("/buckets/{}/generated.jpg", t)),
            }])
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeGenerator;
