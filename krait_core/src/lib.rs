pub mod client;
pub mod config;
pub mod corpus;
pub mod driver;
pub mod minimizer;
pub mod mutator;
pub mod oracle;
pub mod reproducer;
pub mod store;

pub use client::{HttpTargetClient, RawOutcome, TargetClient};
pub use config::KraitConfig;
pub use corpus::{CorpusError, SeedCorpus};
pub use driver::{
    CampaignSettings, CampaignSummary, CancelToken, DriverError, DriverState, FuzzDriver,
};
pub use minimizer::{MinimizeError, MinimizeOutcome, minimize, minimize_case};
pub use mutator::{Mutator, RandomEditMutator};
pub use oracle::{ClassifierOracle, Oracle, Verdict, classify};
pub use reproducer::{ReproduceError, Reproduction, reproduce};
pub use store::{
    CrashKind, CrashRecord, CrashStore, MinimizeLog, MinimizedRecord, ReproducerSlot, StoreError,
};
