// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the reasoner
#[derive(Debug, Error)]
pub enum ReasonError {
    #[error("reasoner failed: {0}")]
    Failed(String),
}

/// One reasoning request.
#[derive(Debug, Clone, Default)]
pub struct ReasonRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    /// JSON schema the reasoner's structured output must match.
    pub schema: serde_json::Value,
    pub images: Option<Vec<String>>,
}

/// Structured reasoner output; `outputs` bind positionally to the
/// instruction's `output_vars`.
#[derive(Debug, Clone, Default)]
pub struct ReasonResponse {
    pub outputs: Vec<String>,
    pub explanation: Option<String>,
}

/// Adapter for the LLM-backed reasoner.
#[async_trait]
pub trait Reasoner: Send + Sync + 'static {
    async fn reason(&self, request: &ReasonRequest) -> Result<ReasonResponse, ReasonError>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{ReasonError, ReasonRequest, ReasonResponse, Reasoner};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Scriptable fake reasoner.
    ///
    /// Prime with [`FakeReasoner::respond_with`]; call
    /// [`FakeReasoner::set_fail`] to exercise the engine's fallback path.
    #[derive(Default)]
    pub struct FakeReasoner {
        pub calls: Mutex<Vec<ReasonRequest>>,
        pub response: Mutex<ReasonResponse>,
        pub fail: Mutex<bool>,
    }

    impl FakeReasoner {
        pub fn respond_with(&self, outputs: Vec<String>, explanation: Option<String>) {
            *self.response.lock() = ReasonResponse { outputs, explanation };
        }

        pub fn set_fail(&self, fail: bool) {
            *self.fail.lock() = fail;
        }
    }

    #[async_trait]
    impl Reasoner for FakeReasoner {
        async fn reason(
            &self,
            request: &ReasonRequest,
        ) -> Result<ReasonResponse, ReasonError> {
            if *self.fail.lock() {
                return Err(ReasonError::Failed("scripted failure".to_string()));
            }
            self.calls.lock().push(request.clone());
            Ok(self.response.lock().clone())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeReasoner;
