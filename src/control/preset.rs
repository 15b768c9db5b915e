//! Preset persistence.
//!
//! The broker only decides *what* a preset is (a snapshot of discrete
//! indices keyed by parameter name). Where it is kept is up to a
//! [`PresetStore`].

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum PresetError {
    #[error("failed to access preset file: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse preset file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Snapshot of parameter identifier → discrete index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Preset {
    values: BTreeMap<String, i32>,
}

impl Preset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, index: i32) {
        self.values.insert(id.into(), index);
    }

    pub fn get(&self, id: &str) -> Option<i32> {
        self.values.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.values.iter().map(|(id, index)| (id.as_str(), *index))
    }
}

impl FromIterator<(String, i32)> for Preset {
    fn from_iter<I: IntoIterator<Item = (String, i32)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Slot-addressed storage for presets.
pub trait PresetStore: Send {
    fn load(&self, slot: u8) -> Option<Preset>;

    fn save(&mut self, slot: u8, preset: Preset);
}

/// Presets kept only for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryPresetStore {
    slots: HashMap<u8, Preset>,
}

impl MemoryPresetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PresetStore for MemoryPresetStore {
    fn load(&self, slot: u8) -> Option<Preset> {
        self.slots.get(&slot).cloned()
    }

    fn save(&mut self, slot: u8, preset: Preset) {
        self.slots.insert(slot, preset);
    }
}

/// Presets mirrored to a JSON file: `{ "<slot>": { "<ID>": index } }`.
///
/// A missing or unreadable file yields an empty store; the instrument keeps
/// playing with its live values.
#[derive(Debug)]
pub struct JsonPresetStore {
    path: PathBuf,
    slots: BTreeMap<u8, Preset>,
}

impl JsonPresetStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let slots = match Self::read(&path) {
            Ok(slots) => {
                log::info!("Loaded {} presets from {:?}", slots.len(), path);
                slots
            }
            Err(PresetError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("No preset file at {:?}, starting empty", path);
                BTreeMap::new()
            }
            Err(e) => {
                log::warn!("{} ({:?}); starting with no presets", e, path);
                BTreeMap::new()
            }
        };

        Self { path, slots }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(path: &Path) -> Result<BTreeMap<u8, Preset>, PresetError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn write(&self) -> Result<(), PresetError> {
        let json = serde_json::to_string_pretty(&self.slots)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl PresetStore for JsonPresetStore {
    fn load(&self, slot: u8) -> Option<Preset> {
        self.slots.get(&slot).cloned()
    }

    fn save(&mut self, slot: u8, preset: Preset) {
        self.slots.insert(slot, preset);
        match self.write() {
            Ok(()) => log::info!("Saved preset {} to {:?}", slot, self.path),
            Err(e) => log::warn!("Preset {} kept in memory only: {}", slot, e),
        }
    }
}
