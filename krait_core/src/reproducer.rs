use crate::client::{RawOutcome, TargetClient};
use crate::oracle::{Verdict, classify};
use crate::store::{CrashStore, ReproducerSlot, StoreError};
use thiserror::Error;

/// Errors from a reproduction attempt. Note that a benign verdict is not an
/// error here: the caller decides how loudly "did not reproduce" should be.
#[derive(Error, Debug)]
pub enum ReproduceError {
    /// Crash store lookup or reproducer slot write failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What happened when a stored payload was resubmitted.
#[derive(Debug, Clone)]
pub struct Reproduction {
    pub verdict: Verdict,
    /// Status line and body, or the transport failure message.
    pub response: String,
    pub payload: String,
}

impl Reproduction {
    pub fn reproduced(&self) -> bool {
        self.verdict.is_crash()
    }
}

/// Loads the `index`-th crash record, resubmits its payload, and classifies
/// the outcome. On a crashing verdict the payload (and only the payload) is
/// written to `slot`, overwriting any previous reproducer.
///
/// Lookup failures (`NoCases`, `IndexOutOfRange`) propagate untouched and
/// leave the slot file alone.
pub fn reproduce(
    store: &mut CrashStore,
    index: usize,
    client: &dyn TargetClient,
    slot: &ReproducerSlot,
) -> Result<Reproduction, ReproduceError> {
    let record = store.get(index)?;
    let outcome = client.submit(&record.payload);
    let verdict = classify(&outcome);

    let response = match &outcome {
        RawOutcome::Response { status, body } => format!("{status}\n{body}"),
        RawOutcome::Transport(message) => message.clone(),
    };

    if verdict.is_crash() {
        slot.store(&record.payload)?;
        log::info!(
            "case {index} reproduced ({:?}), reproducer written to {:?}",
            verdict,
            slot.path()
        );
    } else {
        log::warn!("case {index} did not reproduce a crash");
    }

    Ok(Reproduction {
        verdict,
        response,
        payload: record.payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CrashKind, CrashRecord};
    use tempfile::tempdir;

    struct FixedClient(RawOutcome);
    impl TargetClient for FixedClient {
        fn submit(&self, _payload: &str) -> RawOutcome {
            self.0.clone()
        }
    }

    fn seeded_store(dir: &std::path::Path, payloads: &[&str]) -> CrashStore {
        let mut store = CrashStore::new(dir.join("crashes.txt"));
        for payload in payloads {
            store
                .append(&CrashRecord {
                    kind: CrashKind::ServerError,
                    detail: "500".to_string(),
                    payload: payload.to_string(),
                })
                .unwrap();
        }
        store
    }

    #[test]
    fn crashing_verdict_fills_the_slot() {
        let dir = tempdir().unwrap();
        let mut store = seeded_store(dir.path(), &["boom"]);
        let slot = ReproducerSlot::new(dir.path().join("repro.txt"));
        let client = FixedClient(RawOutcome::Response {
            status: 500,
            body: "err".to_string(),
        });

        let result = reproduce(&mut store, 0, &client, &slot).unwrap();
        assert!(result.reproduced());
        assert_eq!(std::fs::read_to_string(slot.path()).unwrap(), "boom");
    }

    #[test]
    fn transport_failure_counts_as_reproduction() {
        let dir = tempdir().unwrap();
        let mut store = seeded_store(dir.path(), &["boom"]);
        let slot = ReproducerSlot::new(dir.path().join("repro.txt"));
        let client = FixedClient(RawOutcome::Transport("refused".to_string()));

        let result = reproduce(&mut store, 0, &client, &slot).unwrap();
        assert!(result.reproduced());
        assert!(slot.path().exists());
    }

    #[test]
    fn benign_verdict_leaves_the_slot_untouched() {
        let dir = tempdir().unwrap();
        let mut store = seeded_store(dir.path(), &["boom"]);
        let slot = ReproducerSlot::new(dir.path().join("repro.txt"));
        let client = FixedClient(RawOutcome::Response {
            status: 200,
            body: "fine".to_string(),
        });

        let result = reproduce(&mut store, 0, &client, &slot).unwrap();
        assert!(!result.reproduced());
        assert!(!slot.path().exists());
    }

    #[test]
    fn out_of_range_index_does_not_touch_the_slot() {
        let dir = tempdir().unwrap();
        let mut store = seeded_store(dir.path(), &["a", "b", "c"]);
        let slot = ReproducerSlot::new(dir.path().join("repro.txt"));
        let client = FixedClient(RawOutcome::Response {
            status: 500,
            body: String::new(),
        });

        match reproduce(&mut store, 99, &client, &slot) {
            Err(ReproduceError::Store(StoreError::IndexOutOfRange { index: 99, len: 3 })) => {}
            other => panic!("Expected IndexOutOfRange, got {other:?}"),
        }
        assert!(!slot.path().exists());
    }

    #[test]
    fn missing_store_is_no_cases() {
        let dir = tempdir().unwrap();
        let mut store = CrashStore::new(dir.path().join("absent.txt"));
        let slot = ReproducerSlot::new(dir.path().join("repro.txt"));
        let client = FixedClient(RawOutcome::Transport("unused".to_string()));

        match reproduce(&mut store, 0, &client, &slot) {
            Err(ReproduceError::Store(StoreError::NoCases(_))) => {}
            other => panic!("Expected NoCases, got {other:?}"),
        }
    }
}
