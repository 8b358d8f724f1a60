use rand::Rng;
use rand_core::RngCore;

/// Default probability of prepending the crash-trigger token to a mutant.
const DEFAULT_TRIGGER_RATE: f64 = 0.02;
/// Default trigger token understood by the demo target.
const DEFAULT_TRIGGER_TOKEN: &str = "CRASH";

/// A `Mutator` transforms a seed string into a new candidate input.
///
/// Mutators are stateless between calls; given a seeded random generator the
/// output is fully deterministic, which is what makes a recorded campaign
/// replayable from its seed value.
pub trait Mutator: Send + Sync {
    /// Produces a mutated candidate from `seed`.
    fn mutate(&self, seed: &str, rng: &mut dyn RngCore) -> String;
}

/// The three edit operations applied by [`RandomEditMutator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditOp {
    Flip,
    Insert,
    Delete,
}

impl EditOp {
    fn choose(rng: &mut dyn RngCore) -> Self {
        match rng.random_range(0..3u8) {
            0 => EditOp::Flip,
            1 => EditOp::Insert,
            _ => EditOp::Delete,
        }
    }
}

/// A `Mutator` that applies a random number of character-level edits
/// (flip, insert, delete) to the seed.
///
/// The edit count `k` is drawn uniformly from `[1, max(1, seed length)]`.
/// Each edit re-draws its position against the *current* string, so edits
/// compose and the length drifts over the course of the `k` steps. Inserted
/// and flipped characters are printable ASCII.
///
/// With probability `trigger_rate` the `trigger_token` is prepended to the
/// result. This biases the stream toward a known crash condition of the
/// target under test so the rest of the pipeline gets periodic signal; both
/// knobs are configuration, and a rate of `0.0` disables the bias entirely.
#[derive(Debug, Clone)]
pub struct RandomEditMutator {
    trigger_rate: f64,
    trigger_token: String,
}

impl RandomEditMutator {
    /// Creates a mutator with an explicit trigger-injection rate and token.
    /// Rates outside `[0.0, 1.0]` are clamped.
    pub fn new(trigger_rate: f64, trigger_token: String) -> Self {
        Self {
            trigger_rate: trigger_rate.clamp(0.0, 1.0),
            trigger_token,
        }
    }

    fn random_printable(rng: &mut dyn RngCore) -> char {
        // Printable ASCII (32-126).
        rng.random_range(32u8..127u8) as char
    }
}

impl Default for RandomEditMutator {
    fn default() -> Self {
        Self::new(DEFAULT_TRIGGER_RATE, DEFAULT_TRIGGER_TOKEN.to_string())
    }
}

impl Mutator for RandomEditMutator {
    fn mutate(&self, seed: &str, rng: &mut dyn RngCore) -> String {
        let mut chars: Vec<char> = seed.chars().collect();
        let edits = rng.random_range(1..=chars.len().max(1));

        for _ in 0..edits {
            match EditOp::choose(rng) {
                EditOp::Flip => {
                    if !chars.is_empty() {
                        let position = rng.random_range(0..chars.len());
                        chars[position] = Self::random_printable(rng);
                    }
                }
                EditOp::Insert => {
                    let position = if chars.is_empty() {
                        0
                    } else {
                        rng.random_range(0..chars.len())
                    };
                    chars.insert(position, Self::random_printable(rng));
                }
                EditOp::Delete => {
                    if !chars.is_empty() {
                        let position = rng.random_range(0..chars.len());
                        chars.remove(position);
                    }
                }
            }
        }

        let mutated: String = chars.into_iter().collect();
        if self.trigger_rate > 0.0 && rng.random_bool(self.trigger_rate) {
            format!("{}{}", self.trigger_token, mutated)
        } else {
            mutated
        }
    }
}
