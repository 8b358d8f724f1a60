use crate::corpus::SeedCorpus;
use crate::mutator::Mutator;
use crate::oracle::Oracle;
use crate::store::{CrashRecord, CrashStore, StoreError};
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Default campaign length (iterations).
pub const DEFAULT_ITERATIONS: u64 = 2000;
/// Default courtesy pause between submissions.
pub const DEFAULT_DELAY_MS: u64 = 10;

/// Errors that abort a fuzzing campaign. Submission failures are *not*
/// among them: a transport failure is a crash signal, recorded and moved
/// past, never a reason to stop the run.
#[derive(Error, Debug)]
pub enum DriverError {
    /// Refused before the campaign starts: there is nothing to mutate.
    #[error("Seed corpus is empty, refusing to start a campaign")]
    EmptyCorpus,

    /// `run` was called on a driver whose campaign already completed.
    #[error("Campaign already completed; build a new driver to run again")]
    AlreadyCompleted,

    /// Appending to the crash store failed; losing crash records silently
    /// would defeat the whole run, so this aborts.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A worker panicked while holding a shared lock.
    #[error("Campaign state poisoned by a failed worker")]
    Poisoned,
}

/// Campaign lifecycle: `Idle -> Running -> Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
    Completed,
}

/// Knobs for one campaign.
#[derive(Debug, Clone)]
pub struct CampaignSettings {
    /// Total submissions across all workers.
    pub iterations: u64,
    /// Pause after each submission (rate-limiting courtesy to the target).
    pub delay: Duration,
    /// Concurrent submission pipelines; 1 is the sequential baseline.
    pub workers: usize,
    /// Seed for the campaign's generators. Worker `k` derives its generator
    /// from `rng_seed + k`, so a recorded seed replays the campaign.
    pub rng_seed: u64,
}

impl Default for CampaignSettings {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
            workers: 1,
            rng_seed: 0,
        }
    }
}

/// Terminal report of a completed campaign.
#[derive(Debug, Clone)]
pub struct CampaignSummary {
    pub executions: u64,
    pub crashes_recorded: u64,
    /// Distinct `(kind, detail)` signatures, sorted for stable output.
    pub signatures: Vec<(String, String)>,
}

impl CampaignSummary {
    pub fn distinct_signatures(&self) -> usize {
        self.signatures.len()
    }
}

/// Cooperative cancellation flag. Cancelling stops workers from issuing new
/// submissions; an in-flight round trip completes or times out normally.
#[derive(Debug, Default)]
pub struct CancelToken {
    cancelled: AtomicBool,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Orchestrates the mutation -> submission -> classification -> recording
/// loop for a bounded campaign.
///
/// The campaign never halts early on a crash; it records and keeps going.
/// The crash store is the only shared-write resource, so it sits behind a
/// mutex and every record line is appended atomically.
pub struct FuzzDriver<'a> {
    corpus: &'a SeedCorpus,
    mutator: &'a dyn Mutator,
    oracle: &'a dyn Oracle,
    store: &'a Mutex<CrashStore>,
    settings: CampaignSettings,
    state: DriverState,
}

/// Shared campaign counters, updated lock-free by the workers.
struct CampaignCounters {
    next_iteration: AtomicU64,
    executions: AtomicU64,
    crashes: AtomicU64,
}

impl<'a> FuzzDriver<'a> {
    pub fn new(
        corpus: &'a SeedCorpus,
        mutator: &'a dyn Mutator,
        oracle: &'a dyn Oracle,
        store: &'a Mutex<CrashStore>,
        settings: CampaignSettings,
    ) -> Self {
        Self {
            corpus,
            mutator,
            oracle,
            store,
            settings,
            state: DriverState::Idle,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Runs the campaign to completion (or cancellation) and reports the
    /// summary. Malformed configuration aborts before any submission.
    pub fn run(&mut self, cancel: &CancelToken) -> Result<CampaignSummary, DriverError> {
        if self.state == DriverState::Completed {
            return Err(DriverError::AlreadyCompleted);
        }
        if self.corpus.is_empty() {
            return Err(DriverError::EmptyCorpus);
        }
        self.state = DriverState::Running;

        let workers = self.settings.workers.max(1);
        let counters = CampaignCounters {
            next_iteration: AtomicU64::new(0),
            executions: AtomicU64::new(0),
            crashes: AtomicU64::new(0),
        };
        let signatures: Mutex<HashSet<(String, String)>> = Mutex::new(HashSet::new());
        let first_error: Mutex<Option<DriverError>> = Mutex::new(None);

        thread::scope(|scope| {
            for worker_id in 0..workers {
                let counters = &counters;
                let signatures = &signatures;
                let first_error = &first_error;
                let settings = &self.settings;
                let corpus = self.corpus;
                let mutator = self.mutator;
                let oracle = self.oracle;
                let store = self.store;
                scope.spawn(move || {
                    let mut rng = ChaCha8Rng::seed_from_u64(
                        settings.rng_seed.wrapping_add(worker_id as u64),
                    );
                    loop {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let iteration = counters.next_iteration.fetch_add(1, Ordering::Relaxed);
                        if iteration >= settings.iterations {
                            break;
                        }

                        let seed = corpus.choose(&mut rng);
                        let input = mutator.mutate(seed, &mut rng);
                        let verdict = oracle.examine(&input);
                        counters.executions.fetch_add(1, Ordering::Relaxed);

                        if let Some((kind, detail)) = verdict.signature() {
                            let digest = md5::compute(input.as_bytes());
                            log::warn!(
                                "crash at iteration {iteration}: {} {} (payload {} chars, md5 {:x})",
                                kind.as_str(),
                                detail,
                                input.chars().count(),
                                digest
                            );
                            let record = CrashRecord {
                                kind,
                                detail: detail.clone(),
                                payload: input,
                            };
                            let append_result = match store.lock() {
                                Ok(mut guard) => guard.append(&record).map_err(DriverError::from),
                                Err(_) => Err(DriverError::Poisoned),
                            };
                            if let Err(e) = append_result {
                                let mut slot = first_error
                                    .lock()
                                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                                if slot.is_none() {
                                    *slot = Some(e);
                                }
                                cancel.cancel();
                                break;
                            }
                            signatures
                                .lock()
                                .unwrap_or_else(|poisoned| poisoned.into_inner())
                                .insert((kind.as_str().to_string(), detail));
                            counters.crashes.fetch_add(1, Ordering::Relaxed);
                        } else {
                            log::debug!("iteration {iteration}: benign");
                        }

                        if !settings.delay.is_zero() {
                            thread::sleep(settings.delay);
                        }
                    }
                });
            }
        });

        let maybe_error = first_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(error) = maybe_error {
            return Err(error);
        }

        let mut signature_list: Vec<(String, String)> = signatures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain()
            .collect();
        signature_list.sort();

        self.state = DriverState::Completed;
        Ok(CampaignSummary {
            executions: counters.executions.load(Ordering::Relaxed),
            crashes_recorded: counters.crashes.load(Ordering::Relaxed),
            signatures: signature_list,
        })
    }
}
