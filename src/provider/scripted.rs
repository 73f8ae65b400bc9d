//! Provider that replays a fixed script of responses.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{LaunchSpec, Provider, RawResponse};
use crate::domain::DomainId;

/// Deterministic provider for tests and `ocihunt simulate`.
///
/// Responses are served in order; once the script runs out the fallback
/// (if any) is returned forever, otherwise an `Unrecognized` response.
/// A call dropped before its delay elapses consumes nothing, like a killed
/// CLI launch.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<RawResponse>>,
    fallback: Option<RawResponse>,
    delay: Option<Duration>,
    calls: Mutex<Vec<DomainId>>,
    in_flight: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(script: impl IntoIterator<Item = RawResponse>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Provider that answers "out of host capacity" forever
    pub fn always_out_of_capacity() -> Self {
        Self::new(Vec::<RawResponse>::new()).with_fallback(RawResponse::out_of_capacity())
    }

    /// Response to repeat once the script is exhausted
    pub fn with_fallback(mut self, response: RawResponse) -> Self {
        self.fallback = Some(response);
        self
    }

    /// Simulated latency of every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Domains the provider was called with, in call order
    pub fn calls(&self) -> Vec<DomainId> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Number of calls currently inside `attempt_create`
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Scripted responses not yet delivered
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn next_response(&self) -> RawResponse {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        script
            .pop_front()
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| RawResponse::unrecognized("script exhausted"))
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn attempt_create(&self, domain: &DomainId, _launch: &LaunchSpec) -> RawResponse {
        let _guard = InFlight::enter(&self.in_flight);
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(domain.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.next_response()
    }
}

/// Counts a call as in flight until it returns or is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
