// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Responder adapter trait for the AI auto-reply collaborator.
//!
//! The responder is a black box to the router: conversation history and
//! tenant configuration go in, a text completion (or an explicit failure)
//! comes out. Fallback-on-failure policy lives in the dispatch router, not
//! here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChatRelayError;
use crate::traits::adapter::PluginAdapter;

/// One turn of conversation history supplied to the responder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// `"user"` for contact messages, `"assistant"` for bot messages.
    pub role: String,
    pub content: String,
}

/// A completion request assembled by the dispatch router.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Tenant personality / system instructions, if configured.
    #[serde(default)]
    pub system: Option<String>,
    /// Conversation history, oldest first, ending with the inbound message.
    pub messages: Vec<ChatTurn>,
}

/// Adapter for the external AI completion API.
#[async_trait]
pub trait ResponderAdapter: PluginAdapter {
    /// Requests a text completion for the conversation.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ChatRelayError>;
}
