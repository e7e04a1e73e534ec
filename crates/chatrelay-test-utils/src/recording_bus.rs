// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Broadcaster that records every publish for assertions.

use std::sync::Mutex;

use chatrelay_core::traits::Broadcaster;

/// One recorded publish.
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub room: String,
    pub event: String,
    pub payload: serde_json::Value,
}

#[derive(Default)]
pub struct RecordingBus {
    events: Mutex<Vec<PublishedEvent>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PublishedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events published to a given room.
    pub fn events_in(&self, room: &str) -> Vec<PublishedEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.room == room)
            .cloned()
            .collect()
    }

    /// Whether any publish carried the given event name.
    pub fn saw_event(&self, event: &str) -> bool {
        self.events.lock().unwrap().iter().any(|e| e.event == event)
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl Broadcaster for RecordingBus {
    fn publish(&self, room: &str, event: &str, payload: serde_json::Value) {
        self.events.lock().unwrap().push(PublishedEvent {
            room: room.to_string(),
            event: event.to_string(),
            payload,
        });
    }
}
