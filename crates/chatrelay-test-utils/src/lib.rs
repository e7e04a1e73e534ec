// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for ChatRelay integration tests.
//!
//! Mock adapters (platform, responder), a recording broadcaster, and a
//! full-pipeline harness over a scratch database.

pub mod harness;
pub mod mock_platform;
pub mod mock_responder;
pub mod recording_bus;

pub use harness::{PipelineHarness, PipelineHarnessBuilder};
pub use mock_platform::MockPlatform;
pub use mock_responder::MockResponder;
pub use recording_bus::{PublishedEvent, RecordingBus};
