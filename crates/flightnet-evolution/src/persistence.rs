//! Durable storage for the champion.
//!
//! A store keeps a single record: the champion's weights, the high score they
//! reached, and the generation that reached it. Saving replaces the previous
//! record.
//!
//! - [`JsonFileStore`] - One pretty-printed JSON file ([`ChampionRecord`])
//! - [`MemoryStore`] - In-process store for tests and unsaved runs
//!
//! Loading always states the topology the caller expects, so a record saved by
//! a differently shaped population is rejected instead of misread.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Write as _},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use flightnet_network::{ShapeError, Topology, WeightTensor};
use serde::{Deserialize, Serialize};

/// Version written to every [`ChampionRecord`].
pub const FORMAT_VERSION: u32 = 1;

/// File name used when no save file is given.
pub const DEFAULT_SAVE_FILE: &str = "saved_champion.json";

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum PersistenceError {
    #[display("no saved champion found")]
    NotFound,
    #[display("failed to access {}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("corrupt champion record in {}", path.display())]
    CorruptData {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[display("champion weights do not match the recorded topology")]
    MalformedWeights { source: ShapeError },
    #[display("unsupported champion record version {found}")]
    UnsupportedVersion { found: u32 },
    #[display("saved champion has topology {found}, expected {expected}")]
    TopologyMismatch { expected: Topology, found: Topology },
}

/// A champion read back from a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedChampion {
    pub weights: WeightTensor,
    pub high_score: i32,
    pub generation: u32,
}

/// Storage for the single best-known champion.
pub trait PersistenceStore {
    /// Replaces the stored champion.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    fn save(
        &mut self,
        weights: &WeightTensor,
        high_score: i32,
        generation: u32,
    ) -> Result<(), PersistenceError>;

    /// Reads the stored champion, checking it against `topology`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NotFound`] when nothing has been saved, and
    /// other variants when the record is unreadable or shaped differently.
    fn load(&self, topology: &Topology) -> Result<SavedChampion, PersistenceError>;
}

impl<S> PersistenceStore for Box<S>
where
    S: PersistenceStore + ?Sized,
{
    fn save(
        &mut self,
        weights: &WeightTensor,
        high_score: i32,
        generation: u32,
    ) -> Result<(), PersistenceError> {
        (**self).save(weights, high_score, generation)
    }

    fn load(&self, topology: &Topology) -> Result<SavedChampion, PersistenceError> {
        (**self).load(topology)
    }
}

/// On-disk form of a saved champion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChampionRecord {
    pub format_version: u32,
    pub saved_at: DateTime<Utc>,
    pub topology: Topology,
    pub high_score: i32,
    pub generation: u32,
    /// Nested `layer → neuron → source` weights of the non-input layers.
    pub weights: Vec<Vec<Vec<f32>>>,
}

impl ChampionRecord {
    #[must_use]
    pub fn new(weights: &WeightTensor, high_score: i32, generation: u32) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            saved_at: Utc::now(),
            topology: weights.topology().clone(),
            high_score,
            generation,
            weights: weights.to_layers(),
        }
    }

    /// Rebuilds the weight tensor described by this record.
    ///
    /// # Errors
    ///
    /// Returns an error if the version is unknown or the nested weights do not
    /// fit the recorded topology.
    pub fn weight_tensor(&self) -> Result<WeightTensor, PersistenceError> {
        if self.format_version != FORMAT_VERSION {
            return Err(PersistenceError::UnsupportedVersion {
                found: self.format_version,
            });
        }
        WeightTensor::from_layers(self.topology.clone(), &self.weights)
            .map_err(|source| PersistenceError::MalformedWeights { source })
    }

    /// Converts the record into a champion for a population shaped like `topology`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is unusable or built for another topology.
    pub fn into_champion(self, topology: &Topology) -> Result<SavedChampion, PersistenceError> {
        if self.format_version == FORMAT_VERSION && self.topology != *topology {
            return Err(PersistenceError::TopologyMismatch {
                expected: topology.clone(),
                found: self.topology,
            });
        }
        let weights = self.weight_tensor()?;
        Ok(SavedChampion {
            weights,
            high_score: self.high_score,
            generation: self.generation,
        })
    }
}

/// Stores the champion as a JSON [`ChampionRecord`] in a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl Default for JsonFileStore {
    fn default() -> Self {
        Self::new(DEFAULT_SAVE_FILE)
    }
}

impl JsonFileStore {
    #[must_use]
    pub fn new<P>(path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the record without checking it against a topology.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, or not a record.
    pub fn read_record(&self) -> Result<ChampionRecord, PersistenceError> {
        let file = File::open(&self.path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                PersistenceError::NotFound
            } else {
                PersistenceError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|source| PersistenceError::CorruptData {
            path: self.path.clone(),
            source,
        })
    }

    fn write_record(&self, record: &ChampionRecord) -> io::Result<()> {
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, record)?;
        writeln!(writer)?;
        writer.flush()
    }
}

impl PersistenceStore for JsonFileStore {
    fn save(
        &mut self,
        weights: &WeightTensor,
        high_score: i32,
        generation: u32,
    ) -> Result<(), PersistenceError> {
        let record = ChampionRecord::new(weights, high_score, generation);
        self.write_record(&record)
            .map_err(|source| PersistenceError::Io {
                path: self.path.clone(),
                source,
            })
    }

    fn load(&self, topology: &Topology) -> Result<SavedChampion, PersistenceError> {
        self.read_record()?.into_champion(topology)
    }
}

/// Keeps the champion in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    saved: Option<SavedChampion>,
    save_count: usize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `champion`.
    #[must_use]
    pub fn with_saved(champion: SavedChampion) -> Self {
        Self {
            saved: Some(champion),
            save_count: 0,
        }
    }

    #[must_use]
    pub fn saved(&self) -> Option<&SavedChampion> {
        self.saved.as_ref()
    }

    /// Number of successful saves since creation.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.save_count
    }
}

impl PersistenceStore for MemoryStore {
    fn save(
        &mut self,
        weights: &WeightTensor,
        high_score: i32,
        generation: u32,
    ) -> Result<(), PersistenceError> {
        self.saved = Some(SavedChampion {
            weights: weights.clone(),
            high_score,
            generation,
        });
        self.save_count += 1;
        Ok(())
    }

    fn load(&self, topology: &Topology) -> Result<SavedChampion, PersistenceError> {
        let saved = self.saved.as_ref().ok_or(PersistenceError::NotFound)?;
        let found = saved.weights.topology();
        if found != topology {
            return Err(PersistenceError::TopologyMismatch {
                expected: topology.clone(),
                found: found.clone(),
            });
        }
        Ok(saved.clone())
    }
}
