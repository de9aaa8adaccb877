// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! marquee-adapters: external collaborator contracts.
//!
//! The scheduler core is agnostic to what its instructions ultimately do; it
//! invokes each collaborator through the small surfaces defined here.
//! Production implementations (image back-ends, device drivers, LLM
//! gateways) live outside this workspace. The fakes behind `test-support`
//! record calls and return scripted results.

pub mod animate;
pub mod device;
pub mod display;
pub mod generate;
pub mod groups;
pub mod publish;
pub mod reason;

pub use animate::{AnimateError, AnimateRequest, AnimateResult, Animator};
pub use device::{DeviceDriver, DeviceError};
pub use display::{DisplayDriver, DisplayError};
pub use generate::{GenerateError, GenerateRequest, GenerateResult, Generator};
pub use groups::{GroupResolver, StaticGroups};
pub use publish::{PublishError, PublishOptions, PublishResult, Publisher};
pub use reason::{ReasonError, ReasonRequest, ReasonResponse, Reasoner};

#[cfg(any(test, feature = "test-support"))]
pub use animate::FakeAnimator;
#[cfg(any(test, feature = "test-support"))]
pub use device::FakeDevice;
#[cfg(any(test, feature = "test-support"))]
pub use display::FakeDisplay;
#[cfg(any(test, feature = "test-support"))]
pub use generate::FakeGenerator;
#[cfg(any(test, feature = "test-support"))]
pub use publish::FakePublisher;
#[cfg(any(test, feature = "test-support"))]
pub use reason::FakeReasoner;

use std::sync::Arc;

/// The full collaborator bundle handed to the engine.
#[derive(Clone)]
pub struct Collaborators {
    pub publisher: Arc<dyn Publisher>,
    pub generator: Arc<dyn Generator>,
    pub animator: Arc<dyn Animator>,
    pub display: Arc<dyn DisplayDriver>,
    pub device: Arc<dyn DeviceDriver>,
    pub reasoner: Arc<dyn Reasoner>,
    pub groups: Arc<dyn GroupResolver>,
}

#[cfg(any(test, feature = "test-support"))]
impl Collaborators {
    /// A bundle of recording fakes over the given destination config.
    pub fn fake(config: marquee_core::DestinationsConfig) -> Self {
        Self {
            publisher: Arc::new(FakePublisher::default()),
            generator: Arc::new(FakeGenerator::default()),
            animator: Arc::new(FakeAnimator::default()),
            display: Arc::new(FakeDisplay::default()),
            device: Arc::new(FakeDevice::default()),
            reasoner: Arc::new(FakeReasoner::default()),
            groups: Arc::new(StaticGroups::new(config)),
        }
    }
}
