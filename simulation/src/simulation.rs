//! Cross-implementation oracle harness
//!
//! Drives three engines with one pseudo-random schedule:
//! - a baseline with no persistence, which never loses state
//! - an engine mirrored into [`TQueueMemoryStorage`]
//! - an engine backed by a durable [`TQueueBinlog`]
//!
//! Restarts rebuild the two persistent engines from their storage. After
//! every step the observable results must agree: assigned ids, tails and
//! the id/payload sequences returned by `get`. Heads are not compared,
//! because garbage collection runs independently on each engine and may
//! leave expired events retained in one but not another.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use tqueue_core::{
    Event, EventId, FirstEventId, QueueId, StorageError, TQueue, TQueueConfig, TQueueError,
};
use tqueue_storage::{Binlog, BinlogConfig, TQueueBinlog, TQueueMemoryStorage};

/// Events requested per `get` check
const GET_BATCH: usize = 10;

/// Errors raised by the harness
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Engine error: {0}")]
    Engine(#[from] TQueueError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to prepare binlog directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Divergence at step {step} on queue {queue_id} ({check}): {detail}")]
    Divergence {
        step: u64,
        queue_id: QueueId,
        check: &'static str,
        detail: String,
    },

    #[error("Storage adapter missing from the {0} engine")]
    MissingCallback(&'static str),
}

/// Configuration for the harness
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Seed of the step schedule
    pub seed: u64,
    /// Number of steps for [`Harness::run`]
    pub steps: u64,
    /// Queue ids are drawn from `1..=queue_count`
    pub queue_count: QueueId,
    /// Relative weight of a push
    pub push_weight: u32,
    /// Relative weight of a tail comparison
    pub check_tail_weight: u32,
    /// Relative weight of a `get` comparison
    pub get_weight: u32,
    /// Relative weight of advancing the clock
    pub tick_weight: u32,
    /// Relative weight of a restart
    pub restart_weight: u32,
    /// Seconds added to the clock per tick
    pub tick_seconds: f64,
    /// Chance that a push names an explicit id at or after the tail
    pub explicit_id_probability: f64,
    /// Chance, per engine, of running GC right after a restart
    pub gc_on_restart_probability: f64,
    /// Chance of compacting storage before a restart
    pub compact_on_restart_probability: f64,
    /// First id of every new queue
    pub first_event_id: EventId,
    /// Directory for the durable log; a temporary one when `None`
    pub binlog_dir: Option<PathBuf>,
    /// Sync every binlog append
    pub sync_on_write: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 123,
            steps: 100_000,
            queue_count: 10,
            push_weight: 100,
            check_tail_weight: 10,
            get_weight: 40,
            tick_weight: 5,
            restart_weight: 1,
            tick_seconds: 10.0,
            explicit_id_probability: 0.05,
            gc_on_restart_probability: 1.0 / 11.0,
            compact_on_restart_probability: 0.1,
            // Close to the end of the id window so queues recycle
            first_event_id: EventId::MAX.advance(-20).unwrap_or(EventId::MIN),
            binlog_dir: None,
            sync_on_write: false,
        }
    }
}

/// Harness statistics
#[derive(Debug, Clone, Default)]
pub struct SimStats {
    pub steps: u64,
    pub pushes: u64,
    pub rejected_pushes: u64,
    pub explicit_pushes: u64,
    pub recycles: u64,
    pub tail_checks: u64,
    pub get_checks: u64,
    /// Events returned by the baseline across all `get` checks
    pub events_read: u64,
    pub ticks: u64,
    pub restarts: u64,
    pub gc_runs: u64,
    /// Events removed by garbage collection, all engines combined
    pub gc_removed: u64,
    pub compactions: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Push,
    CheckTail,
    Get,
    Tick,
    Restart,
}

/// Three engines driven in lockstep
#[derive(Debug)]
pub struct Harness {
    config: SimConfig,
    engine_config: TQueueConfig,
    binlog_config: BinlogConfig,
    rng: StdRng,
    now: f64,
    step: u64,
    baseline: TQueue,
    memory: TQueue,
    binlog: TQueue,
    binlog_path: PathBuf,
    /// Keeps the temporary binlog directory alive
    _tmp_dir: Option<TempDir>,
    /// Statistics
    pub stats: SimStats,
}

impl Harness {
    /// Create the three engines; any existing log in `binlog_dir` is destroyed
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        let engine_config = TQueueConfig::default()
            .with_first_event_id(FirstEventId::Fixed(config.first_event_id));
        let binlog_config = BinlogConfig::default().with_sync_on_write(config.sync_on_write);

        let (tmp_dir, dir) = match &config.binlog_dir {
            Some(dir) => (None, dir.clone()),
            None => {
                let tmp = TempDir::new()?;
                let dir = tmp.path().to_path_buf();
                (Some(tmp), dir)
            }
        };
        let binlog_path = dir.join("tqueue.binlog");
        Binlog::destroy(&binlog_path)?;

        let baseline = TQueue::with_config(engine_config.clone())?;
        let mut memory = TQueue::with_config(engine_config.clone())?;
        memory.set_callback(Box::new(TQueueMemoryStorage::new()));
        let binlog = TQueueBinlog::open(&binlog_path, binlog_config.clone(), engine_config.clone())?;

        info!(
            seed = config.seed,
            queues = config.queue_count,
            path = %binlog_path.display(),
            "Harness initialized"
        );

        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            engine_config,
            binlog_config,
            now: 0.0,
            step: 0,
            baseline,
            memory,
            binlog,
            binlog_path,
            _tmp_dir: tmp_dir,
            stats: SimStats::default(),
        })
    }

    /// Current simulated time
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Location of the durable log
    pub fn binlog_path(&self) -> &Path {
        &self.binlog_path
    }

    /// Run the configured number of steps
    pub fn run(&mut self) -> Result<SimStats, SimError> {
        for _ in 0..self.config.steps {
            self.step()?;
        }
        info!(
            steps = self.stats.steps,
            pushes = self.stats.pushes,
            restarts = self.stats.restarts,
            recycles = self.stats.recycles,
            events_read = self.stats.events_read,
            "Harness run complete"
        );
        Ok(self.stats.clone())
    }

    /// Execute one randomly chosen step
    pub fn step(&mut self) -> Result<(), SimError> {
        self.step += 1;
        self.stats.steps += 1;
        match self.pick_step() {
            Step::Push => {
                let queue_id = self.next_queue_id();
                self.push_random(queue_id)
            }
            Step::CheckTail => {
                let queue_id = self.next_queue_id();
                self.check_tail(queue_id)
            }
            Step::Get => {
                let queue_id = self.next_queue_id();
                self.check_get(queue_id)
            }
            Step::Tick => {
                self.advance_clock();
                Ok(())
            }
            Step::Restart => self.restart(),
        }
    }

    fn pick_step(&mut self) -> Step {
        let weighted = [
            (Step::Push, self.config.push_weight),
            (Step::CheckTail, self.config.check_tail_weight),
            (Step::Get, self.config.get_weight),
            (Step::Tick, self.config.tick_weight),
            (Step::Restart, self.config.restart_weight),
        ];
        let total: u32 = weighted.iter().map(|(_, w)| w).sum();
        let mut roll = self.rng.random_range(0..total.max(1));
        for (step, weight) in weighted {
            if roll < weight {
                return step;
            }
            roll -= weight;
        }
        Step::Tick
    }

    fn next_queue_id(&mut self) -> QueueId {
        self.rng.random_range(1..=self.config.queue_count.max(1))
    }

    /// Advance the simulated clock by one tick
    pub fn advance_clock(&mut self) {
        self.now += self.config.tick_seconds;
        self.stats.ticks += 1;
    }

    /// Push the same random event into all three engines
    pub fn push_random(&mut self, queue_id: QueueId) -> Result<(), SimError> {
        let data = self.rng.random::<u64>().to_string();
        let offset = f64::from(self.rng.random_range(-10..=10i32));
        let expires_at =
            self.now + offset * self.config.tick_seconds + self.config.tick_seconds / 2.0;

        let explicit_id = match self.baseline.get_tail(queue_id) {
            Some(tail) if self.rng.random_bool(self.config.explicit_id_probability) => {
                tail.advance(self.rng.random_range(0..3)).ok()
            }
            _ => None,
        };
        self.push(queue_id, data, expires_at, explicit_id).map(|_| ())
    }

    /// Push into all three engines and require identical outcomes
    ///
    /// Returns the assigned id, or `None` when every engine rejected the push.
    pub fn push(
        &mut self,
        queue_id: QueueId,
        data: impl Into<bytes::Bytes>,
        expires_at: f64,
        explicit_id: Option<EventId>,
    ) -> Result<Option<EventId>, SimError> {
        let data = data.into();
        let previous_tail = self.baseline.get_tail(queue_id);

        let a = self.baseline.push(queue_id, data.clone(), expires_at, explicit_id);
        let b = self.memory.push(queue_id, data.clone(), expires_at, explicit_id);
        let c = self.binlog.push(queue_id, data, expires_at, explicit_id);

        let id = match (a, b, c) {
            (Ok(a), Ok(b), Ok(c)) if a == b && a == c => a,
            (Err(a), Err(_), Err(_)) => {
                trace!(queue_id, error = %a, "Push rejected by every engine");
                self.stats.rejected_pushes += 1;
                return Ok(None);
            }
            (a, b, c) => {
                return Err(self.divergence(
                    queue_id,
                    "push",
                    format!("baseline {:?}, memory {:?}, binlog {:?}", a, b, c),
                ));
            }
        };

        self.stats.pushes += 1;
        if explicit_id.is_some() {
            self.stats.explicit_pushes += 1;
        }
        if previous_tail.is_some_and(|tail| id < tail) {
            debug!(queue_id, restart_at = %id, "Queue recycled");
            self.stats.recycles += 1;
        }
        Ok(Some(id))
    }

    /// Compare the tail of `queue_id` across engines
    pub fn check_tail(&mut self, queue_id: QueueId) -> Result<(), SimError> {
        self.stats.tail_checks += 1;
        let expected = self.baseline.get_tail(queue_id);
        let memory = self.memory.get_tail(queue_id);
        let binlog = self.binlog.get_tail(queue_id);
        if memory != expected || binlog != expected {
            return Err(self.divergence(
                queue_id,
                "tail",
                format!(
                    "baseline {:?}, memory {:?}, binlog {:?}",
                    expected, memory, binlog
                ),
            ));
        }
        Ok(())
    }

    /// Read from a cursor near the baseline head and compare the results
    pub fn check_get(&mut self, queue_id: QueueId) -> Result<(), SimError> {
        self.stats.get_checks += 1;
        let head = self.baseline.get_head(queue_id).unwrap_or(EventId::MIN);
        let from = head
            .advance(self.rng.random_range(-10..10))
            .unwrap_or(head);
        let now = self.now;

        let mut a = vec![Event::default(); GET_BATCH];
        let mut b = vec![Event::default(); GET_BATCH];
        let mut c = vec![Event::default(); GET_BATCH];
        let fa = self.baseline.get(queue_id, from, true, now, &mut a)?;
        let fb = self.memory.get(queue_id, from, true, now, &mut b)?;
        let fc = self.binlog.get(queue_id, from, true, now, &mut c)?;

        let expected = summarize(&a[..fa.written]);
        let memory = summarize(&b[..fb.written]);
        let binlog = summarize(&c[..fc.written]);
        let more_agrees = fb.has_more == fa.has_more && fc.has_more == fa.has_more;
        if memory != expected || binlog != expected || !more_agrees {
            return Err(self.divergence(
                queue_id,
                "get",
                format!(
                    "from {}: baseline {:?}, memory {:?}, binlog {:?}",
                    from, expected, memory, binlog
                ),
            ));
        }
        self.stats.events_read += fa.written as u64;
        Ok(())
    }

    /// Crash every engine and rebuild the persistent ones from storage
    pub fn restart(&mut self) -> Result<(), SimError> {
        self.stats.restarts += 1;
        let now = self.now;
        debug!(step = self.step, now, "Restarting engines");

        self.baseline.emulate_restart();
        self.maybe_gc(Engine::Baseline, now)?;

        self.memory.emulate_restart();
        let mut storage = self
            .memory
            .extract_callback_as::<TQueueMemoryStorage>()
            .ok_or(SimError::MissingCallback("memory"))?;
        if self.roll(self.config.compact_on_restart_probability) {
            storage.compact()?;
            self.stats.compactions += 1;
        }
        let mut memory = TQueue::with_config(self.engine_config.clone())?;
        storage.replay(&mut memory)?;
        memory.set_callback(storage);
        self.memory = memory;
        self.maybe_gc(Engine::Memory, now)?;

        if self.roll(self.config.compact_on_restart_probability) {
            let mut adapter = self
                .binlog
                .extract_callback_as::<TQueueBinlog>()
                .ok_or(SimError::MissingCallback("binlog"))?;
            adapter.compact()?;
            self.binlog.set_callback(adapter);
            self.stats.compactions += 1;
        }
        self.binlog.emulate_restart();
        drop(std::mem::take(&mut self.binlog));
        self.binlog = TQueueBinlog::open(
            &self.binlog_path,
            self.binlog_config.clone(),
            self.engine_config.clone(),
        )?;
        self.maybe_gc(Engine::Binlog, now)?;

        Ok(())
    }

    fn maybe_gc(&mut self, engine: Engine, now: f64) -> Result<(), SimError> {
        if !self.roll(self.config.gc_on_restart_probability) {
            return Ok(());
        }
        let removed = match engine {
            Engine::Baseline => self.baseline.run_gc(now)?,
            Engine::Memory => self.memory.run_gc(now)?,
            Engine::Binlog => self.binlog.run_gc(now)?,
        };
        self.stats.gc_runs += 1;
        self.stats.gc_removed += removed as u64;
        Ok(())
    }

    fn roll(&mut self, probability: f64) -> bool {
        self.rng.random_bool(probability.clamp(0.0, 1.0))
    }

    fn divergence(&self, queue_id: QueueId, check: &'static str, detail: String) -> SimError {
        warn!(step = self.step, queue_id, check, %detail, "Engines diverged");
        SimError::Divergence {
            step: self.step,
            queue_id,
            check,
            detail,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Engine {
    Baseline,
    Memory,
    Binlog,
}

fn summarize(events: &[Event]) -> Vec<(EventId, &[u8])> {
    events.iter().map(|e| (e.id, e.data.as_ref())).collect()
}
