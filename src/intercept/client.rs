//! Request entry point handed to code under test

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use tracing::debug;

use crate::network::{RequestOptions, RequestSpec, Response, Transport};
use crate::Result;

struct Substitute {
    id: u64,
    handler: Arc<dyn Transport>,
}

/// HTTP client whose transport can be swapped out while tests run
///
/// Code under test issues requests through a `Client`. Normally they go to
/// the live transport; while an [`Interceptor`](super::Interceptor) is
/// installed they go to the interceptor instead.
pub struct Client {
    live: Arc<dyn Transport>,
    substitute: RwLock<Option<Substitute>>,
    next_id: AtomicU64,
}

impl Client {
    /// Create a client over the live transport
    #[must_use]
    pub fn new(live: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            live,
            substitute: RwLock::new(None),
            next_id: AtomicU64::new(1),
        })
    }

    /// Short-hand GET returning only the body
    ///
    /// The body is returned whatever the status code.
    ///
    /// # Errors
    ///
    /// Returns whatever error the active transport produced
    pub async fn get(&self, url: &str) -> Result<Bytes> {
        let response = self.dispatch(&RequestSpec::Simple(url.to_string())).await?;
        Ok(response.body)
    }

    /// Request with options, returning the full response
    ///
    /// # Errors
    ///
    /// Returns whatever error the active transport produced
    pub async fn send(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.dispatch(&RequestSpec::WithOptions(url.to_string(), options))
            .await
    }

    /// Send `request` to the installed substitute, or the live transport
    ///
    /// # Errors
    ///
    /// Returns whatever error the active transport produced
    pub async fn dispatch(&self, request: &RequestSpec) -> Result<Response> {
        let handler = self.active();
        handler.send(request).await
    }

    /// The transport used when nothing is installed
    #[must_use]
    pub fn live(&self) -> &Arc<dyn Transport> {
        &self.live
    }

    /// Whether a substitute is installed
    #[must_use]
    pub fn is_intercepted(&self) -> bool {
        self.substitute
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn active(&self) -> Arc<dyn Transport> {
        self.substitute
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or_else(|| Arc::clone(&self.live), |s| Arc::clone(&s.handler))
    }

    /// Replace any installed substitute with `handler`, returning its id
    pub(crate) fn install(&self, handler: Arc<dyn Transport>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut slot = self
            .substitute
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(previous) = slot.take() {
            debug!("Restoring live transport before replacing substitute {}", previous.id);
        }
        *slot = Some(Substitute { id, handler });
        id
    }

    /// Restore the live transport if substitute `id` is still installed
    pub(crate) fn restore(&self, id: u64) -> bool {
        let mut slot = self
            .substitute
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        match slot.as_ref() {
            Some(current) if current.id == id => {
                *slot = None;
                debug!("Restored live transport (removed substitute {id})");
                true
            }
            _ => false,
        }
    }
}
