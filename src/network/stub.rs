//! Scriptable transport for tests

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::request::{RequestSpec, Response, Transport};
use crate::{GolderError, Result};

#[derive(Clone)]
enum Reply {
    Respond(Response),
    Fail(String),
}

/// A transport that answers every request with a canned reply and records
/// what it was asked
pub struct StubTransport {
    reply: Mutex<Reply>,
    requests: Mutex<Vec<RequestSpec>>,
    delay: Option<Duration>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StubTransport {
    /// Answer every request with `status` and `body`
    #[must_use]
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            reply: Mutex::new(Reply::Respond(Response {
                status,
                headers: BTreeMap::new(),
                body: body.into(),
            })),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Wait `delay` before answering
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answer subsequent requests with `response`
    pub fn respond_with(&self, response: Response) {
        *locked(&self.reply) = Reply::Respond(response);
    }

    /// Answer subsequent requests with `status` and `body`, no headers
    pub fn respond(&self, status: u16, body: impl Into<Bytes>) {
        self.respond_with(Response {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        });
    }

    /// Fail subsequent requests as if the connection could not be made
    pub fn fail_with(&self, message: impl Into<String>) {
        *locked(&self.reply) = Reply::Fail(message.into());
    }

    /// Number of requests received
    #[must_use]
    pub fn call_count(&self) -> usize {
        locked(&self.requests).len()
    }

    /// Requests received, oldest first
    #[must_use]
    pub fn requests(&self) -> Vec<RequestSpec> {
        locked(&self.requests).clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: &RequestSpec) -> Result<Response> {
        locked(&self.requests).push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = locked(&self.reply).clone();
        match reply {
            Reply::Respond(response) => Ok(response),
            Reply::Fail(message) => Err(GolderError::Network(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_requests_and_switches_reply() {
        let stub = StubTransport::new(200, "ok");
        let request = RequestSpec::Simple("http://a/".to_string());

        assert_eq!(stub.send(&request).await.unwrap().status, 200);

        stub.respond(404, "gone");
        assert_eq!(stub.send(&request).await.unwrap().body, Bytes::from("gone"));

        stub.fail_with("connection refused");
        assert!(matches!(
            stub.send(&request).await,
            Err(GolderError::Network(_))
        ));

        assert_eq!(stub.call_count(), 3);
        assert_eq!(stub.requests()[0], request);
    }
}
