// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of platform adapters keyed by platform tag.
//!
//! Selecting the adapter through the resolved service's platform tag keeps
//! platform branching out of the dispatch path: the router asks the
//! registry, never matches on platform strings itself.

use std::collections::HashMap;
use std::sync::Arc;

use chatrelay_core::ChatRelayError;
use chatrelay_core::traits::PlatformAdapter;
use chatrelay_core::types::Platform;

/// Immutable after construction; built once at startup and shared.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own platform tag.
    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) {
        self.adapters.insert(adapter.platform(), adapter);
    }

    /// Look up the adapter for a platform.
    pub fn get(&self, platform: Platform) -> Result<Arc<dyn PlatformAdapter>, ChatRelayError> {
        self.adapters.get(&platform).cloned().ok_or_else(|| {
            ChatRelayError::Internal(format!("no adapter registered for {platform}"))
        })
    }

    /// Number of registered adapters.
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
