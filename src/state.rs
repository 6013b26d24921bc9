/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - session resolver (gate 用), provider forwarder (auth namespace 用)
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 * - request ごとの認証情報は持たない (AuthCtx は request extensions 側)
 */
use std::sync::Arc;

use crate::services::auth::{ProviderForwarder, ProviderServices, SessionResolver};

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<dyn SessionResolver>,
    pub forwarder: ProviderForwarder,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("forwarder", &self.forwarder)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(resolver: Arc<dyn SessionResolver>, forwarder: ProviderForwarder) -> Self {
        Self {
            resolver,
            forwarder,
        }
    }
}

impl From<ProviderServices> for AppState {
    fn from(services: ProviderServices) -> Self {
        Self::new(services.resolver, services.forwarder)
    }
}
