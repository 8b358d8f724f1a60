use rand_core::RngCore;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can arise while building or loading a seed corpus.
#[derive(Error, Debug)]
pub enum CorpusError {
    /// The corpus ended up with no seeds; a campaign cannot start from nothing.
    #[error("Seed corpus is empty, cannot select an input")]
    Empty,

    /// An I/O error occurred while reading seed files or directories.
    /// Contains a string describing the underlying I/O error.
    #[error("Corpus I/O error: {0}")]
    Io(String),
}

/// An ordered, non-empty collection of seed strings used as mutation
/// starting points.
///
/// The corpus is immutable for the duration of a campaign; every iteration
/// draws one seed uniformly at random. Seeds can be supplied inline or
/// loaded from files and directories (each file's contents become one seed).
#[derive(Debug, Clone)]
pub struct SeedCorpus {
    seeds: Vec<String>,
}

impl SeedCorpus {
    /// Creates a corpus from the given seeds.
    ///
    /// # Returns
    /// `Err(CorpusError::Empty)` if `seeds` contains no entries.
    pub fn new(seeds: Vec<String>) -> Result<Self, CorpusError> {
        if seeds.is_empty() {
            return Err(CorpusError::Empty);
        }
        Ok(Self { seeds })
    }

    /// The built-in demo corpus.
    pub fn default_seeds() -> Vec<String> {
        vec![
            "hello".to_string(),
            "1234".to_string(),
            "{\"a\":1}".to_string(),
            "A".repeat(10),
        ]
    }

    /// Creates a corpus from inline seeds plus seeds loaded from `seed_paths`.
    ///
    /// Each path may be a file (its contents become one seed) or a directory
    /// (each file directly inside becomes one seed; subdirectories are not
    /// traversed, hidden files are skipped).
    pub fn from_sources(
        inline_seeds: Vec<String>,
        seed_paths: &[PathBuf],
    ) -> Result<Self, CorpusError> {
        let mut seeds = inline_seeds;
        for path_buf in seed_paths {
            let path_ref = path_buf.as_path();
            if path_ref.is_file() {
                let data = fs::read_to_string(path_ref).map_err(|e| {
                    CorpusError::Io(format!("Failed to read seed file {:?}: {}", path_ref, e))
                })?;
                seeds.push(data);
            } else if path_ref.is_dir() {
                for entry_result in fs::read_dir(path_ref).map_err(|e| {
                    CorpusError::Io(format!(
                        "Failed to read seed directory {:?}: {}",
                        path_ref, e
                    ))
                })? {
                    let entry = entry_result.map_err(|e| {
                        CorpusError::Io(format!("Error reading entry in {:?}: {}", path_ref, e))
                    })?;
                    let file_path = entry.path();
                    if !file_path.is_file() {
                        continue;
                    }
                    if let Some(name) = file_path.file_name().and_then(|n| n.to_str()) {
                        if name.starts_with('.') {
                            continue;
                        }
                    }
                    let data = fs::read_to_string(&file_path).map_err(|e| {
                        CorpusError::Io(format!("Failed to read seed file {:?}: {}", file_path, e))
                    })?;
                    seeds.push(data);
                }
            } else {
                return Err(CorpusError::Io(format!(
                    "Seed path {:?} is neither a file nor a directory",
                    path_ref
                )));
            }
        }
        Self::new(seeds)
    }

    /// Selects one seed uniformly at random.
    pub fn choose(&self, rng: &mut dyn RngCore) -> &str {
        // `new` guarantees at least one seed.
        let index = rng.next_u64() as usize % self.seeds.len();
        &self.seeds[index]
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }
}
