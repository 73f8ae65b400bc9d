//! Retry engine scenario tests
//!
//! Drives the engine end to end through the public API with a scripted
//! provider, an in-memory sink and a paused clock.

use std::sync::Arc;
use std::time::Duration;

use ocihunt::domain::{DomainId, Event, Outcome, RunState};
use ocihunt::provider::{LaunchSpec, RawResponse, ScriptedProvider};
use ocihunt::runner::{DomainList, Engine, EngineConfig, RunConfig};
use ocihunt::storage::{JsonFileSink, MemorySink, ResultSink};
use ocihunt::{HuntError, Result};
use serde_json::json;
use tempfile::TempDir;

const DOMAINS: [&str; 3] = ["FpAe:US-ASHBURN-AD-1", "FpAe:US-ASHBURN-AD-2", "FpAe:US-ASHBURN-AD-3"];

fn launch_spec() -> LaunchSpec {
    LaunchSpec {
        compartment_id: "ocid1.compartment.oc1..test".into(),
        shape: "VM.Standard.A1.Flex".into(),
        ocpus: 4,
        memory_gbs: 24,
        image_id: "ocid1.image.oc1.iad.test".into(),
        subnet_id: "ocid1.subnet.oc1.iad.test".into(),
        display_name: "ubuntu-arm-free".into(),
        ssh_public_key: "ssh-ed25519 AAAA test".into(),
        assign_public_ip: true,
    }
}

fn run_config() -> Result<RunConfig> {
    let domains = DomainList::new(DOMAINS.map(DomainId::new))?;
    Ok(RunConfig::new(domains, launch_spec()).with_retry_interval(Duration::from_secs(60)))
}

fn engine_with(provider: Arc<ScriptedProvider>, sink: Arc<dyn ResultSink>) -> Engine {
    Engine::new(provider, sink, EngineConfig::default())
}

fn launched(id: &str) -> RawResponse {
    RawResponse::launched(json!({
        "data": {
            "id": id,
            "availability-domain": "FpAe:US-ASHBURN-AD-3",
            "lifecycle-state": "PROVISIONING"
        }
    }))
}

async fn wait_for_message(events: &mut ocihunt::events::Subscription, prefix: &str) -> Event {
    loop {
        let event = events.recv().await.expect("event log closed");
        if event.message.starts_with(prefix) {
            return event;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_capacity_capacity_success() -> Result<()> {
    let provider = Arc::new(ScriptedProvider::new([
        RawResponse::out_of_capacity(),
        RawResponse::out_of_capacity(),
        launched("ocid1.instance.oc1.iad.abc"),
    ]));
    let sink = Arc::new(MemorySink::new());
    let engine = engine_with(provider.clone(), sink.clone());

    engine.start(run_config()?)?;
    assert_eq!(engine.wait().await, RunState::Succeeded);

    let calls: Vec<DomainId> = provider.calls();
    assert_eq!(calls, DOMAINS.map(DomainId::new).to_vec());

    let attempts = engine.attempts();
    assert_eq!(attempts.len(), 3);
    assert!(matches!(attempts[0].outcome, Outcome::CapacityUnavailable));
    assert!(matches!(attempts[2].outcome, Outcome::Success(_)));

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].instance_id, "ocid1.instance.oc1.iad.abc");
    assert_eq!(records[0].availability_domain.as_str(), DOMAINS[2]);
    assert_eq!(records[0].shape, "VM.Standard.A1.Flex");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_fatal_on_first_attempt() -> Result<()> {
    let provider = Arc::new(
        ScriptedProvider::new([RawResponse::service_error(
            404,
            "NotAuthorizedOrNotFound",
            "Authorization failed or requested resource not found.",
        )])
        .with_fallback(RawResponse::out_of_capacity()),
    );
    let sink = Arc::new(MemorySink::new());
    let engine = engine_with(provider.clone(), sink.clone());

    engine.start(run_config()?)?;
    assert_eq!(engine.wait().await, RunState::Failed);

    // Give a misbehaving loop the chance to call again
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(provider.call_count(), 1);
    assert_eq!(engine.attempts().len(), 1);
    assert!(sink.records().is_empty());

    let last = engine.snapshot().last_event.expect("terminal event");
    assert!(last.is_error());
    assert!(last.message.contains("NotAuthorizedOrNotFound"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_fatal_after_retries_counts_every_attempt() -> Result<()> {
    let provider = Arc::new(ScriptedProvider::new([
        RawResponse::out_of_capacity(),
        RawResponse::service_error(429, "TooManyRequests", "slow down"),
        RawResponse::transport("connection reset by peer"),
        RawResponse::service_error(400, "LimitExceeded", "service limit reached"),
    ]));
    let engine = engine_with(provider.clone(), Arc::new(MemorySink::new()));

    engine.start(run_config()?)?;
    assert_eq!(engine.wait().await, RunState::Failed);
    assert_eq!(provider.call_count(), 4);
    assert_eq!(engine.snapshot().attempt_count, 4);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_round_robin_never_repeats_domain() -> Result<()> {
    let provider = Arc::new(ScriptedProvider::always_out_of_capacity());
    let engine = engine_with(provider.clone(), Arc::new(MemorySink::new()));

    engine.start(run_config()?)?;
    tokio::time::sleep(Duration::from_secs(60 * 10 + 30)).await;
    engine.stop()?;
    engine.wait().await;

    let calls = provider.calls();
    assert!(calls.len() >= 10);
    for (i, domain) in calls.iter().enumerate() {
        assert_eq!(domain.as_str(), DOMAINS[i % 3]);
    }
    for pair in calls.windows(2) {
        assert_ne!(pair[0], pair[1]);
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_sequence_numbers_are_gap_free() -> Result<()> {
    let provider = Arc::new(ScriptedProvider::new(
        (0..7)
            .map(|_| RawResponse::out_of_capacity())
            .chain([launched("ocid1.instance.oc1.iad.seq")]),
    ));
    let engine = engine_with(provider, Arc::new(MemorySink::new()));

    engine.start(run_config()?)?;
    assert_eq!(engine.wait().await, RunState::Succeeded);

    let seqs: Vec<u64> = engine.attempts().iter().map(|a| a.seq).collect();
    assert_eq!(seqs, (1..=8).collect::<Vec<u64>>());

    let event_seqs: Vec<u64> = engine.history().iter().map(|e| e.seq).collect();
    for pair in event_seqs.windows(2) {
        assert_eq!(pair[1], pair[0] + 1);
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stop_between_attempt_two_and_three() -> Result<()> {
    let provider = Arc::new(ScriptedProvider::always_out_of_capacity());
    let engine = engine_with(provider.clone(), Arc::new(MemorySink::new()));
    let mut events = engine.subscribe();

    engine.start(run_config()?)?;
    wait_for_message(&mut events, "Attempt 2 ").await;
    engine.stop()?;

    assert_eq!(engine.wait().await, RunState::Stopped);
    assert_eq!(engine.attempts().len(), 2);
    assert_eq!(provider.call_count(), 2);

    let messages: Vec<String> = engine.history().into_iter().map(|e| e.message).collect();
    assert!(messages.iter().any(|m| m.starts_with("Stop requested")));
    assert!(messages.last().unwrap().starts_with("Stopped by user"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stop_lands_within_one_interval() -> Result<()> {
    let provider = Arc::new(ScriptedProvider::always_out_of_capacity());
    let engine = engine_with(provider, Arc::new(MemorySink::new()));

    engine.start(run_config()?)?;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let requested = tokio::time::Instant::now();
    engine.stop()?;
    engine.wait().await;
    assert!(requested.elapsed() < Duration::from_secs(60));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_start_while_running_keeps_run_intact() -> Result<()> {
    let provider = Arc::new(ScriptedProvider::always_out_of_capacity());
    let engine = engine_with(provider, Arc::new(MemorySink::new()));

    let run_id = engine.start(run_config()?)?;
    tokio::time::sleep(Duration::from_secs(130)).await;
    let before = engine.snapshot();

    let err = engine.start(run_config()?).unwrap_err();
    assert!(matches!(err, HuntError::AlreadyRunning));
    assert!(err.is_misuse());

    let after = engine.snapshot();
    assert_eq!(after.run_id, run_id);
    assert_eq!(after.attempt_count, before.attempt_count);
    assert_eq!(after.current_domain, before.current_domain);
    assert_eq!(engine.attempts().len() as u64, before.attempt_count);

    engine.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_two_subscribers_see_same_events() -> Result<()> {
    let provider = Arc::new(ScriptedProvider::new([
        RawResponse::out_of_capacity(),
        launched("ocid1.instance.oc1.iad.fan"),
    ]));
    let engine = engine_with(provider, Arc::new(MemorySink::new()));
    let first = engine.subscribe();
    let second = engine.subscribe();

    engine.start(run_config()?)?;
    engine.wait().await;
    drop(engine);

    let collect = |mut sub: ocihunt::events::Subscription| {
        let mut seen = Vec::new();
        while let Some(event) = sub.try_recv() {
            seen.push(event);
        }
        seen
    };
    let a = collect(first);
    let b = collect(second);

    assert!(!a.is_empty());
    assert_eq!(a, b);
    let attempt_events = a.iter().filter(|e| e.message.starts_with("Attempt 1 ")).count();
    assert_eq!(attempt_events, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_success_writes_result_file() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("vm_creation_result.json");
    let provider = Arc::new(ScriptedProvider::new([launched("ocid1.instance.oc1.iad.file")]));
    let engine = engine_with(provider, Arc::new(JsonFileSink::new(&path)));

    engine.start(run_config()?)?;
    assert_eq!(engine.wait().await, RunState::Succeeded);

    let record = JsonFileSink::new(&path).load()?.expect("result file");
    assert!(record.success);
    assert_eq!(record.instance_id, "ocid1.instance.oc1.iad.file");
    assert_eq!(record.attempts, 1);
    assert!(
        engine
            .history()
            .iter()
            .any(|e| e.message.contains("vm_creation_result.json"))
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_every_terminal_state_has_an_event() -> Result<()> {
    let cases = [
        (vec![launched("ocid1.instance.oc1.iad.t")], RunState::Succeeded),
        (
            vec![RawResponse::service_error(401, "NotAuthenticated", "bad key")],
            RunState::Failed,
        ),
    ];

    for (script, expected) in cases {
        let engine = engine_with(Arc::new(ScriptedProvider::new(script)), Arc::new(MemorySink::new()));
        engine.start(run_config()?)?;
        assert_eq!(engine.wait().await, expected);
        let last = engine.snapshot().last_event.expect("terminal event");
        assert!(last.seq > 0);
    }
    Ok(())
}
