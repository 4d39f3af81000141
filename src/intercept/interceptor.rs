//! Interceptor answering registered routes from the gold engine

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::client::Client;
use crate::config::UnregisteredPolicy;
use crate::golding::GoldEngine;
use crate::network::{RequestSpec, Response, Transport};
use crate::{GolderError, Result};

/// Transport that serves registered URLs through a [`GoldEngine`]
pub struct Interceptor {
    engine: Arc<GoldEngine>,
    live: Arc<dyn Transport>,
    unregistered: UnregisteredPolicy,
}

impl Interceptor {
    /// Create an interceptor that falls back to `live` for unregistered URLs
    /// when `unregistered` allows it
    #[must_use]
    pub fn new(
        engine: Arc<GoldEngine>,
        live: Arc<dyn Transport>,
        unregistered: UnregisteredPolicy,
    ) -> Self {
        Self {
            engine,
            live,
            unregistered,
        }
    }

    /// Route `client`'s requests through a new interceptor
    ///
    /// Any interceptor already installed on `client` is removed first, so
    /// installs never stack. The returned handle restores the live transport
    /// when restored or dropped.
    pub fn install(
        client: &Arc<Client>,
        engine: Arc<GoldEngine>,
        unregistered: UnregisteredPolicy,
    ) -> Installation {
        let interceptor = Self::new(engine, Arc::clone(client.live()), unregistered);
        let id = client.install(Arc::new(interceptor));
        debug!("Installed interceptor {id} ({unregistered:?} for unregistered URLs)");

        Installation {
            client: Arc::clone(client),
            id,
            restored: false,
        }
    }
}

#[async_trait]
impl Transport for Interceptor {
    async fn send(&self, request: &RequestSpec) -> Result<Response> {
        let url = request.url();

        if self.engine.registry().route_for_url(url).is_some() {
            let resolution = self.engine.resolve(request).await?;
            return Ok(resolution.snapshot.response);
        }

        match self.unregistered {
            UnregisteredPolicy::PassThrough => {
                debug!("Passing {url} through to the network");
                self.live.send(request).await
            }
            UnregisteredPolicy::Reject => {
                warn!("Refusing live request to unregistered {url}");
                Err(GolderError::UnregisteredRoute(url.to_string()))
            }
        }
    }
}

/// Handle for an installed interceptor
#[must_use = "dropping an Installation restores the live transport"]
pub struct Installation {
    client: Arc<Client>,
    id: u64,
    restored: bool,
}

impl Installation {
    /// Restore the live transport
    ///
    /// Returns `false` if another interceptor has replaced this one since.
    pub fn restore(mut self) -> bool {
        self.restored = true;
        self.client.restore(self.id)
    }

    /// Keep the interceptor installed after this handle is dropped
    pub fn leak(mut self) {
        self.restored = true;
    }
}

impl Drop for Installation {
    fn drop(&mut self) {
        if !self.restored {
            self.client.restore(self.id);
        }
    }
}
