//! Retry engine - owns the run lifecycle and drives the attempt loop.
//!
//! Each iteration of a run:
//! 1. Checks for a pending stop (the only cancellation checkpoint)
//! 2. Calls the provider for the cycler's current domain
//! 3. Classifies the response and records an Attempt plus an Event
//! 4. Success: persists the result record and ends the run
//! 5. Fatal error: ends the run as failed
//! 6. Otherwise: advances to the next domain and sleeps the retry interval
//!
//! The provider call is never interrupted by a stop request; only the
//! pacing sleep is.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::classifier::classify;
use super::cycler::{DomainCycler, DomainList};
use super::snapshot::StatusSnapshot;
use crate::domain::{Attempt, DomainId, Event, LaunchedInstance, Outcome, ResultRecord, RunState};
use crate::error::{HuntError, Result};
use crate::events::{DEFAULT_LOG_CAPACITY, DEFAULT_SUBSCRIBER_BUFFER, EventLog, LogPage, Subscription};
use crate::provider::{LaunchSpec, Provider, RawResponse};
use crate::storage::ResultSink;

/// Default pause between attempts
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(60);
/// Default upper bound for a single provider call
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(120);
/// Default number of attempts kept in the history
pub const DEFAULT_ATTEMPT_HISTORY: usize = 1000;

/// Engine-lifetime settings (retention and buffering).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub event_log_capacity: usize,
    pub attempt_history_capacity: usize,
    pub subscriber_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_log_capacity: DEFAULT_LOG_CAPACITY,
            attempt_history_capacity: DEFAULT_ATTEMPT_HISTORY,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

/// Per-run settings, passed to `start`.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub domains: DomainList,
    pub launch: LaunchSpec,
    /// Uniform pause after every retryable attempt
    pub retry_interval: Duration,
    /// Provider calls running longer than this count as transient errors
    pub attempt_timeout: Duration,
}

impl RunConfig {
    pub fn new(domains: DomainList, launch: LaunchSpec) -> Self {
        Self {
            domains,
            launch,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }
}

/// State of the current run, mutated by the loop (and `start`/`stop`).
#[derive(Default)]
struct RunShared {
    run_id: u64,
    state: RunState,
    current_domain: Option<DomainId>,
    attempt_count: u64,
    attempts: VecDeque<Attempt>,
    last_event: Option<Event>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    instance: Option<LaunchedInstance>,
    stop_tx: Option<watch::Sender<bool>>,
}

struct EngineInner {
    provider: Arc<dyn Provider>,
    sink: Arc<dyn ResultSink>,
    config: EngineConfig,
    events: EventLog,
    shared: Mutex<RunShared>,
    state_tx: watch::Sender<RunState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to the retry engine. Cheap to clone; all clones share one run.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    pub fn new(provider: Arc<dyn Provider>, sink: Arc<dyn ResultSink>, config: EngineConfig) -> Self {
        let (state_tx, _) = watch::channel(RunState::Idle);
        let events = EventLog::new(config.event_log_capacity, config.subscriber_buffer);
        Self {
            inner: Arc::new(EngineInner {
                provider,
                sink,
                config,
                events,
                shared: Mutex::new(RunShared::default()),
                state_tx,
                task: Mutex::new(None),
            }),
        }
    }

    /// Begin a new run on a background task and return its run id.
    ///
    /// Fails with `AlreadyRunning` while a run is active; the active run is
    /// left untouched. Must be called from within a tokio runtime.
    pub fn start(&self, run: RunConfig) -> Result<u64> {
        let (run_id, stop_rx) = {
            let mut shared = self.inner.lock_shared();
            if !shared.state.can_start() {
                warn!("Start rejected: run #{} is {}", shared.run_id, shared.state);
                return Err(HuntError::AlreadyRunning);
            }

            let (stop_tx, stop_rx) = watch::channel(false);
            shared.run_id += 1;
            shared.current_domain = Some(run.domains.get(0).clone());
            shared.attempt_count = 0;
            shared.attempts.clear();
            shared.last_event = None;
            shared.started_at = Some(Utc::now());
            shared.finished_at = None;
            shared.instance = None;
            shared.stop_tx = Some(stop_tx);
            // Cleared under the run lock so a racing stop() keeps its event.
            self.inner.events.clear();
            self.inner.set_state(&mut shared, RunState::Running);
            (shared.run_id, stop_rx)
        };
        info!("Starting run #{} across {} domains", run_id, run.domains.len());

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let worker = tokio::spawn(run_loop(Arc::clone(&inner), run, run_id, stop_rx));
            if let Err(e) = worker.await {
                inner.emit(Event::error(format!("Run #{} aborted unexpectedly: {}", run_id, e)));
                inner.finish(RunState::Failed);
            }
        });
        *self.inner.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);

        Ok(run_id)
    }

    /// Request a graceful stop.
    ///
    /// The loop notices at its next checkpoint, after any in-flight provider
    /// call has returned. Returns `NotRunning` (and changes nothing) when no
    /// run is active; repeated calls while stopping are accepted.
    pub fn stop(&self) -> Result<()> {
        let mut shared = self.inner.lock_shared();
        let state = shared.state;
        match state {
            RunState::Running => {
                if let Some(stop_tx) = &shared.stop_tx {
                    stop_tx.send_replace(true);
                }
                self.inner.set_state(&mut shared, RunState::Stopping);
                // Appended under the run lock so it always precedes "Stopped by user".
                let stored = self.inner.events.append(Event::info(format!(
                    "Stop requested after {} attempts",
                    shared.attempt_count
                )));
                shared.last_event = Some(stored);
                Ok(())
            }
            RunState::Stopping => Ok(()),
            _ => Err(HuntError::NotRunning),
        }
    }

    /// Consistent point-in-time view of the current run
    pub fn snapshot(&self) -> StatusSnapshot {
        let shared = self.inner.lock_shared();
        StatusSnapshot {
            run_id: shared.run_id,
            state: shared.state,
            current_domain: shared.current_domain.clone(),
            attempt_count: shared.attempt_count,
            last_event: shared.last_event.clone(),
            started_at: shared.started_at,
            finished_at: shared.finished_at,
            instance: shared.instance.clone(),
        }
    }

    pub fn state(&self) -> RunState {
        self.inner.lock_shared().state
    }

    /// Retained attempts of the current run, oldest first
    pub fn attempts(&self) -> Vec<Attempt> {
        self.inner.lock_shared().attempts.iter().cloned().collect()
    }

    /// Retained events of the current run
    pub fn history(&self) -> Vec<Event> {
        self.inner.events.history()
    }

    /// Retained events newer than `since`
    pub fn history_since(&self, since: u64) -> LogPage {
        self.inner.events.since(since)
    }

    /// Live event feed from now on
    pub fn subscribe(&self) -> Subscription {
        self.inner.events.subscribe()
    }

    /// Watch channel following every state transition
    pub fn watch_state(&self) -> watch::Receiver<RunState> {
        self.inner.state_tx.subscribe()
    }

    /// Wait until no run is active and return the resulting state.
    pub async fn wait(&self) -> RunState {
        let mut rx = self.watch_state();
        match rx.wait_for(|state| !state.is_active()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        }
    }

    /// Stop any active run and wait for its task to exit.
    pub async fn shutdown(&self) -> RunState {
        if self.stop().is_ok() {
            debug!("Shutdown stopping active run");
        }
        let state = self.wait().await;
        let handle = self.inner.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        state
    }
}

impl EngineInner {
    fn lock_shared(&self) -> MutexGuard<'_, RunShared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Transition under the caller's lock so watchers observe states in order.
    fn set_state(&self, shared: &mut RunShared, next: RunState) {
        if !shared.state.can_transition_to(next) {
            warn!("Unexpected transition {} -> {} in run #{}", shared.state, next, shared.run_id);
        }
        debug!("Run #{}: {} -> {}", shared.run_id, shared.state, next);
        shared.state = next;
        if next.is_terminal() {
            shared.finished_at = Some(Utc::now());
            shared.stop_tx = None;
        }
        self.state_tx.send_replace(next);
    }

    fn emit(&self, event: Event) {
        let stored = self.events.append(event);
        self.lock_shared().last_event = Some(stored);
    }

    fn stop_requested(&self) -> bool {
        self.lock_shared().state == RunState::Stopping
    }

    fn set_current_domain(&self, domain: DomainId) {
        self.lock_shared().current_domain = Some(domain);
    }

    fn record_attempt(&self, attempt: Attempt) {
        let mut shared = self.lock_shared();
        shared.attempt_count = attempt.seq;
        if shared.attempts.len() >= self.config.attempt_history_capacity.max(1) {
            shared.attempts.pop_front();
        }
        shared.attempts.push_back(attempt);
    }

    fn finish(&self, state: RunState) {
        let mut shared = self.lock_shared();
        self.set_state(&mut shared, state);
    }

    fn finish_success(&self, instance: LaunchedInstance) {
        let mut shared = self.lock_shared();
        shared.instance = Some(instance);
        self.set_state(&mut shared, RunState::Succeeded);
    }

    fn persist(&self, run_id: u64, run: &RunConfig, instance: &LaunchedInstance, domain: &DomainId, attempts: u64) {
        let started_at = self.lock_shared().started_at.unwrap_or_else(Utc::now);
        let record = ResultRecord::new(
            run_id,
            instance,
            domain.clone(),
            &run.launch.shape_summary(),
            attempts,
            started_at,
        );
        match self.sink.write(&record) {
            Ok(()) => self.emit(Event::info(format!("Result saved to {}", self.sink.location()))),
            Err(e) => self.emit(Event::error(format!(
                "Instance {} was created but the result could not be saved: {}",
                instance.id, e
            ))),
        }
    }
}

async fn run_loop(inner: Arc<EngineInner>, run: RunConfig, run_id: u64, mut stop_rx: watch::Receiver<bool>) {
    let mut cycler = DomainCycler::new(run.domains.clone());
    let interval_secs = run.retry_interval.as_secs();

    inner.emit(Event::info(format!(
        "Starting run #{} ({})",
        run_id,
        run.launch.describe()
    )));
    inner.emit(Event::info(format!(
        "Cycling {} availability domains, retry interval: {} seconds",
        run.domains.len(),
        interval_secs
    )));

    let mut seq: u64 = 0;
    loop {
        if inner.stop_requested() {
            inner.emit(Event::info(format!("Stopped by user after {} attempts", seq)));
            inner.finish(RunState::Stopped);
            return;
        }

        let domain = cycler.current().clone();
        seq += 1;
        debug!("Run #{} attempt {} targeting {}", run_id, seq, domain);

        let raw = match tokio::time::timeout(
            run.attempt_timeout,
            inner.provider.attempt_create(&domain, &run.launch),
        )
        .await
        {
            Ok(raw) => raw,
            Err(_) => {
                warn!(
                    "Run #{} attempt {} exceeded {:?}, call aborted",
                    run_id, seq, run.attempt_timeout
                );
                RawResponse::TimedOut
            }
        };
        let outcome = classify(&raw);
        inner.record_attempt(Attempt::new(seq, domain.clone(), outcome.clone()));

        match outcome {
            Outcome::Success(instance) => {
                inner.emit(Event::success(format!(
                    "SUCCESS! Instance {} created in {} on attempt {}",
                    instance.id,
                    domain.short(),
                    seq
                )));
                inner.persist(run_id, &run, &instance, &domain, seq);
                inner.finish_success(instance);
                return;
            }
            Outcome::FatalError(reason) => {
                inner.emit(Event::error(format!(
                    "Attempt {} ({}): fatal error, giving up: {}",
                    seq,
                    domain.short(),
                    reason
                )));
                inner.finish(RunState::Failed);
                return;
            }
            Outcome::CapacityUnavailable => {
                inner.emit(Event::warn(format!(
                    "Attempt {} ({}): out of capacity",
                    seq,
                    domain.short()
                )));
            }
            Outcome::TransientError(reason) => {
                inner.emit(Event::warn(format!(
                    "Attempt {} ({}): {}",
                    seq,
                    domain.short(),
                    reason
                )));
            }
        }

        let next = cycler.advance().clone();
        inner.set_current_domain(next);
        if cycler.at_cycle_start() {
            inner.emit(Event::info(format!(
                "All {} domains tried (cycle {}), waiting {} seconds between attempts",
                cycler.domains().len(),
                cycler.cycles(),
                interval_secs
            )));
        }

        if !*stop_rx.borrow() {
            tokio::select! {
                _ = tokio::time::sleep(run.retry_interval) => {}
                _ = stop_rx.wait_for(|stopped| *stopped) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ScriptedProvider, test_launch_spec};
    use crate::storage::MemorySink;
    use serde_json::json;

    fn domains() -> DomainList {
        DomainList::new(["AD-1", "AD-2", "AD-3"].map(DomainId::new)).unwrap()
    }

    fn run_config() -> RunConfig {
        RunConfig::new(domains(), test_launch_spec()).with_retry_interval(Duration::from_secs(60))
    }

    fn engine(provider: Arc<ScriptedProvider>, sink: Arc<MemorySink>) -> Engine {
        Engine::new(provider, sink, EngineConfig::default())
    }

    #[test]
    fn test_run_config_defaults() {
        let run = RunConfig::new(domains(), test_launch_spec());
        assert_eq!(run.retry_interval, DEFAULT_RETRY_INTERVAL);
        assert_eq!(run.attempt_timeout, DEFAULT_ATTEMPT_TIMEOUT);
    }

    #[tokio::test]
    async fn test_initial_snapshot() {
        let engine = engine(Arc::new(ScriptedProvider::new(Vec::new())), Arc::new(MemorySink::new()));
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.state, RunState::Idle);
        assert_eq!(snapshot.run_id, 0);
        assert_eq!(snapshot.attempt_count, 0);
        assert!(snapshot.last_event.is_none());
        assert_eq!(engine.wait().await, RunState::Idle);
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_misuse() {
        let engine = engine(Arc::new(ScriptedProvider::new(Vec::new())), Arc::new(MemorySink::new()));
        let err = engine.stop().unwrap_err();
        assert!(matches!(err, HuntError::NotRunning));
        assert_eq!(engine.state(), RunState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_third_attempt() {
        let provider = Arc::new(ScriptedProvider::new([
            RawResponse::out_of_capacity(),
            RawResponse::out_of_capacity(),
            RawResponse::launched(json!({"data": {"id": "ocid1.instance.win"}})),
        ]));
        let sink = Arc::new(MemorySink::new());
        let engine = engine(provider.clone(), sink.clone());

        engine.start(run_config()).unwrap();
        assert_eq!(engine.wait().await, RunState::Succeeded);

        let calls: Vec<String> = provider.calls().iter().map(|d| d.to_string()).collect();
        assert_eq!(calls, vec!["AD-1", "AD-2", "AD-3"]);

        let attempts = engine.attempts();
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts.iter().map(|a| a.seq).collect::<Vec<_>>(), vec![1, 2, 3]);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].instance_id, "ocid1.instance.win");
        assert_eq!(records[0].availability_domain.as_str(), "AD-3");
        assert_eq!(records[0].attempts, 3);

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.instance.unwrap().id, "ocid1.instance.win");
        assert!(snapshot.finished_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_halts_immediately() {
        let provider = Arc::new(ScriptedProvider::new([RawResponse::service_error(
            401,
            "NotAuthenticated",
            "The required information to complete authentication was not provided",
        )]));
        let sink = Arc::new(MemorySink::new());
        let engine = engine(provider.clone(), sink.clone());

        engine.start(run_config()).unwrap();
        assert_eq!(engine.wait().await, RunState::Failed);

        assert_eq!(provider.call_count(), 1);
        assert_eq!(engine.attempts().len(), 1);
        assert!(sink.records().is_empty());
        assert!(engine.snapshot().last_event.unwrap().is_error());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_running_is_rejected() {
        let provider = Arc::new(ScriptedProvider::always_out_of_capacity());
        let engine = engine(provider, Arc::new(MemorySink::new()));

        let run_id = engine.start(run_config()).unwrap();
        tokio::time::sleep(Duration::from_secs(90)).await;
        let before = engine.snapshot();

        let err = engine.start(run_config()).unwrap_err();
        assert!(matches!(err, HuntError::AlreadyRunning));

        let after = engine.snapshot();
        assert_eq!(after.run_id, run_id);
        assert_eq!(after.state, RunState::Running);
        assert_eq!(after.attempt_count, before.attempt_count);

        engine.stop().unwrap();
        assert_eq!(engine.wait().await, RunState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_between_attempts() {
        let provider = Arc::new(ScriptedProvider::always_out_of_capacity());
        let engine = engine(provider.clone(), Arc::new(MemorySink::new()));
        let mut events = engine.subscribe();

        engine.start(run_config()).unwrap();
        while let Some(event) = events.recv().await {
            if event.message.starts_with("Attempt 2 ") {
                break;
            }
        }
        engine.stop().unwrap();
        assert_eq!(engine.state(), RunState::Stopping);
        engine.stop().unwrap();

        assert_eq!(engine.wait().await, RunState::Stopped);
        assert_eq!(provider.call_count(), 2);
        assert_eq!(engine.snapshot().attempt_count, 2);
        assert!(engine.history().last().unwrap().message.starts_with("Stopped by user"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_in_flight_call() {
        let provider = Arc::new(ScriptedProvider::always_out_of_capacity().with_delay(Duration::from_secs(10)));
        let engine = engine(provider.clone(), Arc::new(MemorySink::new()));

        engine.start(run_config()).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(provider.in_flight(), 1);

        engine.stop().unwrap();
        assert_eq!(engine.wait().await, RunState::Stopped);
        assert_eq!(provider.in_flight(), 0);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(engine.attempts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_transient() {
        // Every call outlives the deadline; the launch must never land unseen.
        let provider = Arc::new(
            ScriptedProvider::new([RawResponse::launched(json!({"data": {"id": "ocid1.instance.late"}}))])
                .with_delay(Duration::from_secs(30)),
        );
        let sink = Arc::new(MemorySink::new());
        let engine = engine(provider.clone(), sink.clone());
        let run = run_config().with_attempt_timeout(Duration::from_secs(5));

        let mut events = engine.subscribe();
        engine.start(run).unwrap();
        let first_attempt = loop {
            let event = events.recv().await.unwrap();
            if event.message.starts_with("Attempt 1 ") {
                break event;
            }
        };
        assert!(first_attempt.message.contains("timed out"));
        assert_eq!(provider.in_flight(), 0);

        engine.stop().unwrap();
        assert_eq!(engine.wait().await, RunState::Stopped);
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert!(matches!(engine.attempts()[0].outcome, Outcome::TransientError(_)));
        assert_eq!(provider.remaining(), 1);
        assert!(sink.records().is_empty());
        assert!(engine.snapshot().instance.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_in_flight_during_stop_wins() {
        let provider = Arc::new(
            ScriptedProvider::new([RawResponse::launched(json!({"data": {"id": "ocid1.instance.race"}}))])
                .with_delay(Duration::from_secs(10)),
        );
        let sink = Arc::new(MemorySink::new());
        let engine = engine(provider.clone(), sink.clone());

        engine.start(run_config()).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(provider.in_flight(), 1);
        engine.stop().unwrap();
        assert_eq!(engine.state(), RunState::Stopping);

        assert_eq!(engine.wait().await, RunState::Succeeded);
        assert_eq!(provider.call_count(), 1);
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].instance_id, "ocid1.instance.race");

        let messages: Vec<String> = engine.history().into_iter().map(|e| e.message).collect();
        let requested = messages.iter().position(|m| m.starts_with("Stop requested")).unwrap();
        let success = messages.iter().position(|m| m.starts_with("SUCCESS!")).unwrap();
        assert!(requested < success);
        assert!(!messages.iter().any(|m| m.starts_with("Stopped by user")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_in_flight_during_stop_wins() {
        let provider = Arc::new(
            ScriptedProvider::new([RawResponse::service_error(401, "NotAuthenticated", "bad key")])
                .with_fallback(RawResponse::out_of_capacity())
                .with_delay(Duration::from_secs(10)),
        );
        let sink = Arc::new(MemorySink::new());
        let engine = engine(provider.clone(), sink.clone());

        engine.start(run_config()).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        engine.stop().unwrap();

        assert_eq!(engine.wait().await, RunState::Failed);
        assert_eq!(provider.call_count(), 1);
        assert!(sink.records().is_empty());

        let messages: Vec<String> = engine.history().into_iter().map(|e| e.message).collect();
        let requested = messages.iter().position(|m| m.starts_with("Stop requested")).unwrap();
        let fatal = messages.iter().position(|m| m.contains("fatal error")).unwrap();
        assert!(requested < fatal);
        assert!(!messages.iter().any(|m| m.starts_with("Stopped by user")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_right_after_start_keeps_its_event() {
        let provider = Arc::new(ScriptedProvider::always_out_of_capacity());
        let engine = engine(provider, Arc::new(MemorySink::new()));

        engine.start(run_config()).unwrap();
        engine.stop().unwrap();
        assert_eq!(engine.wait().await, RunState::Stopped);

        let messages: Vec<String> = engine.history().into_iter().map(|e| e.message).collect();
        assert_eq!(messages.first().unwrap(), "Stop requested after 0 attempts");
        assert!(messages.last().unwrap().starts_with("Stopped by user"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_failure_keeps_success() {
        let provider = Arc::new(ScriptedProvider::new([RawResponse::launched(
            json!({"id": "ocid1.instance.x"}),
        )]));
        let engine = Engine::new(
            provider,
            Arc::new(MemorySink::failing("read-only filesystem")),
            EngineConfig::default(),
        );

        engine.start(run_config()).unwrap();
        assert_eq!(engine.wait().await, RunState::Succeeded);
        let last = engine.history().pop().unwrap();
        assert!(last.is_error());
        assert!(last.message.contains("read-only filesystem"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_resets_history() {
        let provider = Arc::new(ScriptedProvider::new([
            RawResponse::service_error(400, "InvalidParameter", "bad image"),
            RawResponse::out_of_capacity(),
            RawResponse::launched(json!({"id": "ocid1.instance.y"})),
        ]));
        let engine = engine(provider, Arc::new(MemorySink::new()));

        assert_eq!(engine.start(run_config()).unwrap(), 1);
        assert_eq!(engine.wait().await, RunState::Failed);

        assert_eq!(engine.start(run_config()).unwrap(), 2);
        assert_eq!(engine.wait().await, RunState::Succeeded);

        let attempts = engine.attempts();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].seq, 1);
        assert_eq!(attempts[0].domain.as_str(), "AD-1");
        assert!(engine.history().iter().all(|e| !e.message.contains("bad image")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_history_is_bounded() {
        let provider = Arc::new(ScriptedProvider::always_out_of_capacity());
        let config = EngineConfig {
            attempt_history_capacity: 4,
            ..EngineConfig::default()
        };
        let engine = Engine::new(provider, Arc::new(MemorySink::new()), config);
        let run = run_config().with_retry_interval(Duration::from_secs(1));

        engine.start(run).unwrap();
        tokio::time::sleep(Duration::from_millis(9_500)).await;
        engine.stop().unwrap();
        engine.wait().await;

        let snapshot = engine.snapshot();
        let attempts = engine.attempts();
        assert_eq!(attempts.len(), 4);
        assert_eq!(attempts.last().unwrap().seq, snapshot.attempt_count);
        assert!(snapshot.attempt_count > 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_exhaustion_event() {
        let provider = Arc::new(ScriptedProvider::always_out_of_capacity());
        let engine = engine(provider, Arc::new(MemorySink::new()));
        let mut events = engine.subscribe();

        engine.start(run_config()).unwrap();
        let exhausted = loop {
            let event = events.recv().await.unwrap();
            if event.message.starts_with("All 3 domains tried") {
                break event;
            }
        };
        assert!(exhausted.message.contains("cycle 1"));
        assert_eq!(engine.snapshot().attempt_count, 3);
        assert_eq!(engine.shutdown().await, RunState::Stopped);
    }
}
