//! Pre-defined scenarios
//!
//! Includes the canonical "hands" walkthrough, a binlog crash/recovery run
//! and a garbage collection run.

use std::path::Path;

use tracing::info;

use tqueue_core::{Event, EventId, QueueId, TQueue, TQueueConfig};
use tqueue_storage::{Binlog, BinlogConfig, TQueueBinlog};

use crate::simulation::{Harness, SimConfig, SimError, SimStats};

/// Queue used by the canonical walkthrough
pub const HANDS_QUEUE: QueueId = 12;

/// Queue used by the crash scenario
pub const CRASH_QUEUE: QueueId = 1;

/// Outcome of [`run_hands_scenario`]
#[derive(Debug, Clone)]
pub struct HandsOutcome {
    pub pushed: EventId,
    pub head: EventId,
    pub tail: EventId,
    pub read: Vec<Event>,
}

/// Outcome of [`run_crash_scenario`]
#[derive(Debug, Clone)]
pub struct CrashOutcome {
    pub pushed: Vec<EventId>,
    pub head_after: Option<EventId>,
    pub tail_after: Option<EventId>,
    pub recovered: Vec<Event>,
}

/// Outcome of [`run_gc_scenario`]
#[derive(Debug, Clone)]
pub struct GcOutcome {
    pub removed: usize,
    pub head_before: Option<EventId>,
    pub head_after: Option<EventId>,
    pub visible: Vec<Event>,
}

/// Run the canonical walkthrough:
///
/// ```text
/// queue 12 is unknown: no head, no tail
/// push "hello" expiring at 0
/// tail is head + 1
/// reading from head at time 0 returns exactly that event
/// ```
pub fn run_hands_scenario() -> Result<HandsOutcome, SimError> {
    info!("=== Running Hands Scenario ===");
    let mut queue = TQueue::create();
    if queue.get_head(HANDS_QUEUE).is_some() || queue.get_tail(HANDS_QUEUE).is_some() {
        return Err(scenario_failure(HANDS_QUEUE, "unknown queue reports a head or tail"));
    }

    let pushed = queue.push(HANDS_QUEUE, "hello", 0.0, None)?;
    let head = queue
        .get_head(HANDS_QUEUE)
        .ok_or_else(|| scenario_failure(HANDS_QUEUE, "no head after push"))?;
    let tail = queue
        .get_tail(HANDS_QUEUE)
        .ok_or_else(|| scenario_failure(HANDS_QUEUE, "no tail after push"))?;
    if tail != head.next()? {
        return Err(scenario_failure(HANDS_QUEUE, "tail is not head + 1"));
    }

    let mut out = vec![Event::default(); 100];
    let fetched = queue.get(HANDS_QUEUE, head, true, 0.0, &mut out)?;
    out.truncate(fetched.written);
    info!(head = %head, tail = %tail, read = out.len(), "Hands scenario complete");

    Ok(HandsOutcome {
        pushed,
        head,
        tail,
        read: out,
    })
}

/// Push `events` events through a binlog-backed engine, crash it and reopen
///
/// The log at `dir/crash.binlog` is destroyed first. The recovered queue
/// must report the same head, tail and events as before the crash.
pub fn run_crash_scenario(dir: &Path, events: usize) -> Result<CrashOutcome, SimError> {
    info!(events, "=== Running Crash Scenario ===");
    let path = dir.join("crash.binlog");
    Binlog::destroy(&path)?;

    let mut engine = TQueueBinlog::open(&path, BinlogConfig::default(), TQueueConfig::default())?;
    let mut pushed = Vec::with_capacity(events);
    for i in 0..events {
        pushed.push(engine.push(CRASH_QUEUE, format!("event {}", i), 1_000.0, None)?);
    }
    let head_before = engine.get_head(CRASH_QUEUE);
    let tail_before = engine.get_tail(CRASH_QUEUE);

    engine.emulate_restart();
    drop(engine);
    info!("Engine crashed, reopening binlog");

    let mut engine = TQueueBinlog::open(&path, BinlogConfig::default(), TQueueConfig::default())?;
    let head_after = engine.get_head(CRASH_QUEUE);
    let tail_after = engine.get_tail(CRASH_QUEUE);
    if head_after != head_before || tail_after != tail_before {
        return Err(scenario_failure(
            CRASH_QUEUE,
            format!(
                "recovered head/tail {:?}/{:?}, expected {:?}/{:?}",
                head_after, tail_after, head_before, tail_before
            ),
        ));
    }

    let recovered = match head_after {
        Some(head) => engine.get_events(CRASH_QUEUE, head, false, 0.0, events.max(1))?,
        None => Vec::new(),
    };
    info!(recovered = recovered.len(), "Crash scenario complete");

    Ok(CrashOutcome {
        pushed,
        head_after,
        tail_after,
        recovered,
    })
}

/// Push a short-lived and a long-lived event, then collect at a later time
pub fn run_gc_scenario() -> Result<GcOutcome, SimError> {
    info!("=== Running GC Scenario ===");
    let queue_id = 7;
    let mut queue = TQueue::create();
    queue.push(queue_id, "short lived", 10.0, None)?;
    queue.push(queue_id, "long lived", 100.0, None)?;

    let head_before = queue.get_head(queue_id);
    let removed = queue.run_gc(50.0)?;
    let head_after = queue.get_head(queue_id);
    let visible = match head_after {
        Some(head) => queue.get_events(queue_id, head, false, 50.0, 10)?,
        None => Vec::new(),
    };
    info!(removed, "GC scenario complete");

    Ok(GcOutcome {
        removed,
        head_before,
        head_after,
        visible,
    })
}

/// Run the oracle harness with `config`
pub fn run_random_scenario(config: SimConfig) -> Result<SimStats, SimError> {
    info!(seed = config.seed, steps = config.steps, "=== Running Random Scenario ===");
    Harness::new(config)?.run()
}

fn scenario_failure(queue_id: QueueId, detail: impl Into<String>) -> SimError {
    SimError::Divergence {
        step: 0,
        queue_id,
        check: "scenario",
        detail: detail.into(),
    }
}
