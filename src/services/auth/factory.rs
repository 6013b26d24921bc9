/// Factory: build the provider-facing services from application `Config`.
use std::sync::Arc;

use anyhow::Context;

use crate::config::Config;
use crate::services::auth::{
    HttpSessionResolver, ProviderForwarder, SessionResolver, provider::build_http_client,
};

pub struct ProviderServices {
    pub resolver: Arc<dyn SessionResolver>,
    pub forwarder: ProviderForwarder,
}

pub fn build_provider_services(config: &Config) -> anyhow::Result<ProviderServices> {
    let client = build_http_client(config.auth_timeout)
        .context("building session provider http client")?;
    let endpoint = config.session_endpoint()?;

    tracing::info!(%endpoint, "session lookups go to provider");

    Ok(ProviderServices {
        resolver: Arc::new(HttpSessionResolver::new(client.clone(), endpoint)),
        forwarder: ProviderForwarder::new(client, config.auth_service_url.clone()),
    })
}
