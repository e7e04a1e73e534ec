// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Room registry: the realtime broadcaster implementation.
//!
//! Rooms are plain strings (`service_{tenant}_{code}`,
//! `conversation_{id}`, `admin_panel`); each holds the send half of every
//! subscribed connection. Delivery is best-effort, at-most-once: a publish
//! enqueues a frame per subscriber and silently unsubscribes any whose
//! channel has closed. Nothing is buffered or replayed -- reconnecting
//! clients re-fetch state through the read API.

use chatrelay_core::traits::Broadcaster;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::trace;

/// One server -> client frame, already serialized.
pub type Frame = String;

#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, DashMap<String, mpsc::UnboundedSender<Frame>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a connection's sender to a room.
    pub fn join(&self, room: &str, conn_id: &str, tx: mpsc::UnboundedSender<Frame>) {
        self.rooms
            .entry(room.to_string())
            .or_default()
            .insert(conn_id.to_string(), tx);
        trace!(room, conn_id, "joined room");
    }

    /// Unsubscribe a connection from one room.
    pub fn leave(&self, room: &str, conn_id: &str) {
        if let Some(subs) = self.rooms.get(room) {
            subs.remove(conn_id);
        }
        trace!(room, conn_id, "left room");
    }

    /// Unsubscribe a connection from every room (socket closed).
    pub fn leave_all(&self, conn_id: &str) {
        for subs in self.rooms.iter() {
            subs.remove(conn_id);
        }
    }

    /// Number of live subscribers in a room.
    pub fn subscriber_count(&self, room: &str) -> usize {
        self.rooms.get(room).map(|subs| subs.len()).unwrap_or(0)
    }

    /// Build the wire frame for an event.
    pub fn frame(event: &str, payload: &serde_json::Value) -> Frame {
        serde_json::json!({"event": event, "data": payload}).to_string()
    }
}

impl Broadcaster for RoomRegistry {
    fn publish(&self, room: &str, event: &str, payload: serde_json::Value) {
        let Some(subs) = self.rooms.get(room) else {
            return;
        };
        let frame = Self::frame(event, &payload);

        let mut dead = Vec::new();
        for sub in subs.iter() {
            if sub.value().send(frame.clone()).is_err() {
                dead.push(sub.key().clone());
            }
        }
        drop(subs);

        if !dead.is_empty()
            && let Some(subs) = self.rooms.get(room)
        {
            for conn_id in dead {
                subs.remove(&conn_id);
            }
        }
    }
}
