// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant resolution: platform identifier in, owning client service out.
//!
//! Identifiers change rarely, so resolutions are cached in a DashMap keyed
//! by (platform, identifier) with explicit invalidation on credential
//! update. Only services whose lifecycle status accepts traffic resolve;
//! everything else emits an `unmatched_webhook` observability event and
//! returns `None` -- the caller acknowledges the webhook with 200 to stop
//! platform retries but does not advance the pipeline.

use std::sync::Arc;

use chatrelay_core::ChatRelayError;
use chatrelay_core::types::Platform;
use chatrelay_storage::{ClientService, ConversationStore};
use dashmap::DashMap;
use tracing::{debug, warn};

pub struct TenantResolver {
    store: Arc<ConversationStore>,
    cache: DashMap<(Platform, String), Arc<ClientService>>,
}

impl TenantResolver {
    pub fn new(store: Arc<ConversationStore>) -> Self {
        Self {
            store,
            cache: DashMap::new(),
        }
    }

    /// Resolve a platform identifier to its owning client service.
    pub async fn resolve(
        &self,
        platform: Platform,
        identifier: &str,
    ) -> Result<Option<Arc<ClientService>>, ChatRelayError> {
        let key = (platform, identifier.to_string());
        if let Some(cached) = self.cache.get(&key) {
            return Ok(Some(cached.clone()));
        }

        let service = match platform {
            Platform::WhatsApp | Platform::Messenger | Platform::Instagram => {
                self.store.find_meta_service(identifier).await?
            }
            Platform::Telegram => self.store.find_telegram_service(identifier).await?,
            Platform::WebChat => self
                .store
                .service(identifier)
                .await?
                .filter(|s| s.platform == Platform::WebChat),
        };

        match service {
            Some(service) if service.status.accepts_traffic() => {
                let service = Arc::new(service);
                self.cache.insert(key, service.clone());
                debug!(
                    platform = %platform,
                    identifier,
                    service_id = service.id.as_str(),
                    "resolved client service"
                );
                Ok(Some(service))
            }
            Some(service) => {
                warn!(
                    event = "unmatched_webhook",
                    platform = %platform,
                    identifier,
                    status = %service.status,
                    "client service exists but does not accept traffic"
                );
                Ok(None)
            }
            None => {
                warn!(
                    event = "unmatched_webhook",
                    platform = %platform,
                    identifier,
                    "no client service matches identifier"
                );
                Ok(None)
            }
        }
    }

    /// Drop every cache entry pointing at a service (credential update,
    /// status change).
    pub fn invalidate_service(&self, service_id: &str) {
        self.cache.retain(|_, service| service.id != service_id);
    }

    /// Drop one identifier's cache entry.
    pub fn invalidate(&self, platform: Platform, identifier: &str) {
        self.cache.remove(&(platform, identifier.to_string()));
    }

    /// Drop the whole cache.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Number of cached resolutions.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}
