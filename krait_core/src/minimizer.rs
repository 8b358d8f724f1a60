use crate::oracle::Oracle;
use crate::store::{CrashStore, MinimizeLog, MinimizedRecord, StoreError};
use thiserror::Error;

/// Errors from a minimization run.
#[derive(Error, Debug)]
pub enum MinimizeError {
    /// The supplied payload no longer crashes the target, so there is
    /// nothing to minimize. Surfaced before any reduction starts.
    #[error("Payload does not reproduce a crash against the target")]
    NotReproducible,

    /// Crash store or minimize log access failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The result of a successful minimization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinimizeOutcome {
    pub minimized: String,
    /// Oracle round trips spent, including the reproduction precondition.
    pub oracle_calls: u64,
}

/// Greedy chunk-removal delta-debugging.
///
/// Starting at chunk size `max(1, n/2)`, repeatedly try to delete the
/// chunk-sized substring at each offset; an accepted deletion re-probes the
/// same offset against the now-shorter string, and the chunk size halves
/// only after a full pass removes nothing. Every accepted candidate is
/// oracle-confirmed first, so the result still crashes and is never longer
/// than the input. Greedy and local: not guaranteed minimal, guaranteed
/// monotonic, and bounded by `O(n log n)` oracle calls.
pub fn minimize(payload: &str, oracle: &dyn Oracle) -> Result<MinimizeOutcome, MinimizeError> {
    let mut oracle_calls = 0u64;
    let mut still_crashes = |candidate: &str| {
        oracle_calls += 1;
        oracle.examine(candidate).is_crash()
    };

    if !still_crashes(payload) {
        return Err(MinimizeError::NotReproducible);
    }

    let mut current: Vec<char> = payload.chars().collect();
    let mut chunk = (current.len() / 2).max(1);

    loop {
        let mut offset = 0;
        let mut changed = false;
        while offset < current.len() {
            let end = (offset + chunk).min(current.len());
            if end == offset {
                offset += 1;
                continue;
            }
            let candidate: String = current[..offset]
                .iter()
                .chain(current[end..].iter())
                .collect();
            if still_crashes(&candidate) {
                current = candidate.chars().collect();
                changed = true;
                // Re-probe the same offset against the shorter string.
            } else {
                offset += 1;
            }
        }
        if !changed {
            if chunk == 1 {
                break;
            }
            chunk /= 2;
        }
    }

    Ok(MinimizeOutcome {
        minimized: current.into_iter().collect(),
        oracle_calls,
    })
}

/// Store-driven wrapper: load the `index`-th crash record, minimize its
/// payload, and append the `{original, minimized}` pair to the minimize log.
pub fn minimize_case(
    store: &mut CrashStore,
    index: usize,
    oracle: &dyn Oracle,
    log: &MinimizeLog,
) -> Result<(MinimizedRecord, MinimizeOutcome), MinimizeError> {
    let record = store.get(index)?;
    let outcome = minimize(&record.payload, oracle)?;
    let pair = MinimizedRecord {
        original: record.payload,
        minimized: outcome.minimized.clone(),
    };
    log.append(&pair)?;
    log::info!(
        "minimized case {index}: {} -> {} chars in {} oracle calls",
        pair.original.chars().count(),
        pair.minimized.chars().count(),
        outcome.oracle_calls
    );
    Ok((pair, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::Verdict;
    use crate::store::{CrashKind, CrashRecord};
    use rand::Rng;
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;
    use tempfile::tempdir;

    /// Oracle that crashes exactly when the payload contains the token.
    struct TokenOracle(&'static str);
    impl Oracle for TokenOracle {
        fn examine(&self, payload: &str) -> Verdict {
            if payload.contains(self.0) {
                Verdict::ServerError(500)
            } else {
                Verdict::Benign
            }
        }
    }

    fn call_bound(n: usize) -> u64 {
        let log2 = (usize::BITS - (n + 1).leading_zeros()) as u64; // ceil(log2(n+1))
        4 * n as u64 * log2.max(1)
    }

    #[test]
    fn isolates_the_trigger_substring() {
        let outcome = minimize("AAAACRASHAAAA", &TokenOracle("CRASH")).unwrap();
        assert_eq!(outcome.minimized, "CRASH");
    }

    #[test]
    fn result_is_never_longer_and_still_crashes() {
        let oracle = TokenOracle("CRASH");
        let mut rng = ChaCha8Rng::from_seed([21u8; 32]);

        for _ in 0..10 {
            let left = "x".repeat(rng.random_range(0..40));
            let right = "y".repeat(rng.random_range(0..40));
            let input = format!("{left}CRASH{right}");

            let outcome = minimize(&input, &oracle).unwrap();
            assert!(outcome.minimized.chars().count() <= input.chars().count());
            assert!(
                oracle.examine(&outcome.minimized).is_crash(),
                "Minimized result must still crash: {:?}",
                outcome.minimized
            );
        }
    }

    #[test]
    fn benign_payload_is_not_reproducible() {
        match minimize("hello", &TokenOracle("CRASH")) {
            Err(MinimizeError::NotReproducible) => {}
            other => panic!("Expected NotReproducible, got {other:?}"),
        }
    }

    #[test]
    fn oracle_call_count_is_bounded() {
        let oracle = TokenOracle("CRASH");
        for (left, right) in [(4usize, 4usize), (45, 50), (200, 100)] {
            let input = format!("{}CRASH{}", "A".repeat(left), "B".repeat(right));
            let n = input.chars().count();
            let outcome = minimize(&input, &oracle).unwrap();
            assert!(
                outcome.oracle_calls <= call_bound(n),
                "{} oracle calls for n={} exceeds bound {}",
                outcome.oracle_calls,
                n,
                call_bound(n)
            );
        }
    }

    #[test]
    fn whole_payload_trigger_minimizes_to_itself() {
        let outcome = minimize("CRASH", &TokenOracle("CRASH")).unwrap();
        assert_eq!(outcome.minimized, "CRASH");
    }

    #[test]
    fn minimize_case_reads_store_and_appends_log() {
        let dir = tempdir().unwrap();
        let mut store = CrashStore::new(dir.path().join("crashes.txt"));
        store
            .append(&CrashRecord {
                kind: CrashKind::ServerError,
                detail: "500".to_string(),
                payload: "zzCRASHzz".to_string(),
            })
            .unwrap();
        let log_path = dir.path().join("minimized.txt");
        let log = MinimizeLog::new(&log_path);

        let (pair, _outcome) =
            minimize_case(&mut store, 0, &TokenOracle("CRASH"), &log).unwrap();
        assert_eq!(pair.original, "zzCRASHzz");
        assert_eq!(pair.minimized, "CRASH");

        let text = std::fs::read_to_string(&log_path).unwrap();
        assert!(text.contains("ORIG\tzzCRASHzz"));
        assert!(text.contains("MIN\tCRASH"));
    }

    #[test]
    fn minimize_case_propagates_missing_store() {
        let dir = tempdir().unwrap();
        let mut store = CrashStore::new(dir.path().join("absent.txt"));
        let log = MinimizeLog::new(dir.path().join("minimized.txt"));

        match minimize_case(&mut store, 0, &TokenOracle("CRASH"), &log) {
            Err(MinimizeError::Store(StoreError::NoCases(_))) => {}
            other => panic!("Expected NoCases, got {other:?}"),
        }
    }
}
