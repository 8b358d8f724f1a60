use crate::client::{RawOutcome, TargetClient};

/// The classified result of one submission.
///
/// Produced exactly once per round trip and never retried; everything past
/// the classification boundary treats outcomes as data, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The target handled the input without incident.
    Benign,
    /// The target answered with a 5xx status.
    ServerError(u16),
    /// The round trip itself failed (refused, timed out, malformed).
    TransportException(String),
}

impl Verdict {
    /// The single definition of "crash" shared by fuzzing, reproduction and
    /// minimization.
    pub fn is_crash(&self) -> bool {
        !matches!(self, Verdict::Benign)
    }

    /// The stored-record kind and detail for a crashing verdict, or `None`
    /// for a benign one.
    pub fn signature(&self) -> Option<(crate::store::CrashKind, String)> {
        match self {
            Verdict::Benign => None,
            Verdict::ServerError(status) => {
                Some((crate::store::CrashKind::ServerError, status.to_string()))
            }
            Verdict::TransportException(message) => {
                Some((crate::store::CrashKind::Exception, message.clone()))
            }
        }
    }
}

/// Maps a raw submission outcome to a verdict.
///
/// Policy: status >= 500 is a server error, any transport failure is
/// crash-equivalent, everything else is benign. Pure and total.
pub fn classify(outcome: &RawOutcome) -> Verdict {
    match outcome {
        RawOutcome::Response { status, .. } if *status >= 500 => Verdict::ServerError(*status),
        RawOutcome::Response { .. } => Verdict::Benign,
        RawOutcome::Transport(message) => Verdict::TransportException(message.clone()),
    }
}

/// An `Oracle` decides whether a payload currently triggers a crash.
///
/// Both discovery (the fuzz driver) and reduction (the minimizer) consult
/// the same oracle, so they cannot disagree about what a crash is. The
/// trait is the seam for plugging in a different crash definition without
/// touching either algorithm.
pub trait Oracle: Send + Sync {
    fn examine(&self, payload: &str) -> Verdict;
}

/// The standard oracle: submit through a [`TargetClient`], then [`classify`].
pub struct ClassifierOracle<'a> {
    client: &'a dyn TargetClient,
}

impl<'a> ClassifierOracle<'a> {
    pub fn new(client: &'a dyn TargetClient) -> Self {
        Self { client }
    }
}

impl Oracle for ClassifierOracle<'_> {
    fn examine(&self, payload: &str) -> Verdict {
        classify(&self.client.submit(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16) -> RawOutcome {
        RawOutcome::Response {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn classify_verdict_table() {
        assert_eq!(classify(&response(200)), Verdict::Benign);
        assert_eq!(classify(&response(404)), Verdict::Benign);
        assert_eq!(classify(&response(499)), Verdict::Benign);
        assert_eq!(classify(&response(500)), Verdict::ServerError(500));
        assert_eq!(classify(&response(503)), Verdict::ServerError(503));
        assert_eq!(
            classify(&RawOutcome::Transport("connection refused".to_string())),
            Verdict::TransportException("connection refused".to_string())
        );
    }

    #[test]
    fn classify_is_idempotent_per_input() {
        let outcomes = [
            response(200),
            response(500),
            RawOutcome::Transport("timed out".to_string()),
        ];
        for outcome in &outcomes {
            assert_eq!(classify(outcome), classify(outcome));
        }
    }

    #[test]
    fn only_benign_is_not_a_crash() {
        assert!(!Verdict::Benign.is_crash());
        assert!(Verdict::ServerError(500).is_crash());
        assert!(Verdict::TransportException("x".to_string()).is_crash());
    }

    struct FixedClient(RawOutcome);
    impl TargetClient for FixedClient {
        fn submit(&self, _payload: &str) -> RawOutcome {
            self.0.clone()
        }
    }

    #[test]
    fn classifier_oracle_composes_client_and_policy() {
        let crashing = FixedClient(response(500));
        let benign = FixedClient(response(200));
        assert!(ClassifierOracle::new(&crashing).examine("x").is_crash());
        assert!(!ClassifierOracle::new(&benign).examine("x").is_crash());
    }
}
