use krait_core::config::KraitConfig;
use krait_core::{
    CancelToken, ClassifierOracle, CrashStore, FuzzDriver, HttpTargetClient, MinimizeError,
    MinimizeLog, RandomEditMutator, ReproduceError, ReproducerSlot, SeedCorpus, StoreError,
    minimize_case, reproduce,
};

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Instant;

/// Payload did not reproduce a crash.
const EXIT_NOT_REPRODUCIBLE: u8 = 2;
/// The crash log holds no cases.
const EXIT_NO_CASES: u8 = 3;
/// The requested case index is out of range.
const EXIT_INDEX_OUT_OF_RANGE: u8 = 4;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Black-box fuzzing toolkit for HTTP services", long_about = None)]
struct Cli {
    /// TOML configuration file; `krait.toml` is picked up automatically.
    #[clap(short, long, value_parser, global = true)]
    config_file: Option<PathBuf>,
    /// Target address ([http://]host:port), overriding the config.
    #[clap(long, global = true)]
    target: Option<String>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a fuzzing campaign against the target.
    Fuzz {
        /// Number of submissions in this campaign.
        #[clap(long)]
        iters: Option<u64>,
        /// Pause between submissions, in milliseconds.
        #[clap(long, value_name = "MS")]
        delay: Option<u64>,
        /// Concurrent submission workers.
        #[clap(long)]
        workers: Option<usize>,
        /// Campaign RNG seed, for deterministic replay.
        #[clap(long)]
        rng_seed: Option<u64>,
    },
    /// Resubmit a stored crash case and confirm it still crashes.
    Reproduce {
        /// 0-based index into the crash log.
        #[clap(long)]
        index: usize,
    },
    /// Reduce a stored crash case to a minimal reproducer.
    Minimize {
        /// 0-based index into the crash log.
        #[clap(long)]
        index: usize,
    },
}

fn load_config(cli: &Cli) -> Result<KraitConfig, anyhow::Error> {
    let mut config = match &cli.config_file {
        Some(config_path) => {
            println!("Loading configuration from specified path: {config_path:?}");
            KraitConfig::load_from_file(config_path)?
        }
        None => {
            let default_config_path = PathBuf::from("krait.toml");
            if default_config_path.exists() {
                println!("Loading default configuration: {default_config_path:?}");
                KraitConfig::load_from_file(&default_config_path)?
            } else {
                KraitConfig::default()
            }
        }
    };

    if let Some(target) = &cli.target {
        config.target.address = target.clone();
    }
    Ok(config)
}

fn build_client(config: &KraitConfig) -> Result<HttpTargetClient, anyhow::Error> {
    Ok(HttpTargetClient::new(
        &config.target.address,
        &config.target.endpoint,
        config.target.timeout(),
    )?)
}

fn run_fuzz(
    config: &KraitConfig,
    iters: Option<u64>,
    delay: Option<u64>,
    workers: Option<usize>,
    rng_seed: Option<u64>,
) -> Result<ExitCode, anyhow::Error> {
    let mut settings = config.campaign.to_settings();
    if let Some(iters) = iters {
        settings.iterations = iters;
    }
    if let Some(delay_ms) = delay {
        settings.delay = std::time::Duration::from_millis(delay_ms);
    }
    if let Some(workers) = workers {
        settings.workers = workers;
    }
    if let Some(rng_seed) = rng_seed {
        settings.rng_seed = rng_seed;
    }

    let corpus = SeedCorpus::from_sources(config.inline_seeds(), &config.corpus.seed_paths)?;
    let mutator = RandomEditMutator::new(
        config.mutation.trigger_rate,
        config.mutation.trigger_token.clone(),
    );
    let client = build_client(config)?;
    let oracle = ClassifierOracle::new(&client);
    let store = Mutex::new(CrashStore::new(&config.store.crash_log));

    println!(
        "Fuzzing {} for {} iterations ({} worker(s), {} seed(s), rng seed {})...",
        config.target.address,
        settings.iterations,
        settings.workers.max(1),
        corpus.len(),
        settings.rng_seed
    );

    let cancel = CancelToken::new();
    let start_time = Instant::now();
    let mut driver = FuzzDriver::new(&corpus, &mutator, &oracle, &store, settings);
    let summary = driver.run(&cancel)?;

    println!(
        "\nCampaign finished in {:.2?}: {} executions, {} crashes recorded.",
        start_time.elapsed(),
        summary.executions,
        summary.crashes_recorded
    );
    if summary.signatures.is_empty() {
        println!("No issues found (in this run).");
    } else {
        println!("Found {} distinct issue(s):", summary.distinct_signatures());
        for (kind, detail) in &summary.signatures {
            println!("  {kind}\t{detail}");
        }
        println!("Crash cases appended to {:?}", config.store.crash_log);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_reproduce(config: &KraitConfig, index: usize) -> Result<ExitCode, anyhow::Error> {
    let client = build_client(config)?;
    let mut store = CrashStore::new(&config.store.crash_log);
    let slot = ReproducerSlot::new(&config.store.reproducer_slot);

    let result = match reproduce(&mut store, index, &client, &slot) {
        Ok(result) => result,
        Err(ReproduceError::Store(e)) => return store_error_exit(e),
    };

    println!("Payload: {:?}", result.payload);
    println!("Outcome: {:?}", result.verdict);
    println!("Response:\n{}", result.response);

    if result.reproduced() {
        println!("Saved reproducer to {:?}", config.store.reproducer_slot);
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("Case {index} did not reproduce a crash against the target.");
        Ok(ExitCode::from(EXIT_NOT_REPRODUCIBLE))
    }
}

fn run_minimize(config: &KraitConfig, index: usize) -> Result<ExitCode, anyhow::Error> {
    let client = build_client(config)?;
    let oracle = ClassifierOracle::new(&client);
    let mut store = CrashStore::new(&config.store.crash_log);
    let log = MinimizeLog::new(&config.store.minimized_log);

    let start_time = Instant::now();
    let (pair, outcome) = match minimize_case(&mut store, index, &oracle, &log) {
        Ok(result) => result,
        Err(MinimizeError::NotReproducible) => {
            eprintln!("Case {index} does not reproduce a crash against the target; aborting.");
            return Ok(ExitCode::from(EXIT_NOT_REPRODUCIBLE));
        }
        Err(MinimizeError::Store(e)) => return store_error_exit(e),
    };

    println!("Original payload: {:?}", pair.original);
    println!(
        "Minimization finished in {:.2?} ({} oracle calls).",
        start_time.elapsed(),
        outcome.oracle_calls
    );
    println!("Minimized payload: {:?}", pair.minimized);
    println!("Wrote minimized case to {:?}", config.store.minimized_log);
    Ok(ExitCode::SUCCESS)
}

fn store_error_exit(error: StoreError) -> Result<ExitCode, anyhow::Error> {
    match error {
        StoreError::NoCases(path) => {
            eprintln!("No crash cases found in {path:?}.");
            Ok(ExitCode::from(EXIT_NO_CASES))
        }
        StoreError::IndexOutOfRange { index, len } => {
            eprintln!("Index {index} out of range (0..{len}).");
            Ok(ExitCode::from(EXIT_INDEX_OUT_OF_RANGE))
        }
        other => Err(other.into()),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = match &cli.command {
        Command::Fuzz {
            iters,
            delay,
            workers,
            rng_seed,
        } => run_fuzz(&config, *iters, *delay, *workers, *rng_seed),
        Command::Reproduce { index } => run_reproduce(&config, *index),
        Command::Minimize { index } => run_minimize(&config, *index),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
