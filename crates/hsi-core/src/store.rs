//! Raster persistence and discovery.
//!
//! The pipeline never touches the filesystem directly; it works against the
//! `RasterStore` capability so the decision logic stays independent of any
//! particular storage backend.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{HsiError, Result};
use crate::raster::Raster;
use crate::zones::ZoneStatsTable;

/// A named collection of rasters and statistics tables.
pub trait RasterStore {
    /// Raster names in the store, sorted.
    fn list(&self) -> Result<Vec<String>>;
    fn load(&self, name: &str) -> Result<Raster>;
    fn save(&mut self, name: &str, raster: &Raster) -> Result<()>;
    fn save_table(&mut self, name: &str, table: &ZoneStatsTable) -> Result<()>;
}

// ── In-memory store ───────────────────────────────────────────────────────────

/// Map-backed store for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct MemStore {
    rasters: BTreeMap<String, Raster>,
    tables: BTreeMap<String, ZoneStatsTable>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, raster: Raster) {
        self.rasters.insert(name.into(), raster);
    }

    pub fn raster(&self, name: &str) -> Option<&Raster> {
        self.rasters.get(name)
    }

    pub fn table(&self, name: &str) -> Option<&ZoneStatsTable> {
        self.tables.get(name)
    }

    pub fn raster_names(&self) -> Vec<String> {
        self.rasters.keys().cloned().collect()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }
}

impl RasterStore for MemStore {
    fn list(&self) -> Result<Vec<String>> {
        Ok(self.raster_names())
    }

    fn load(&self, name: &str) -> Result<Raster> {
        self.rasters
            .get(name)
            .cloned()
            .ok_or_else(|| HsiError::MissingRaster(name.to_string()))
    }

    fn save(&mut self, name: &str, raster: &Raster) -> Result<()> {
        self.rasters.insert(name.to_string(), raster.clone());
        Ok(())
    }

    fn save_table(&mut self, name: &str, table: &ZoneStatsTable) -> Result<()> {
        self.tables.insert(name.to_string(), table.clone());
        Ok(())
    }
}

// ── Directory store ───────────────────────────────────────────────────────────

/// Directory-backed store: one JSON file per raster at the root, statistics
/// tables under `tables/`. Writes are incremental with no locking, so two
/// runs must not share one output directory.
#[derive(Debug)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Open (creating if absent) a directory store.
    pub fn open(root: impl Into<PathBuf>) -> Result<DirStore> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| HsiError::Io {
            name: root.display().to_string(),
            source,
        })?;
        Ok(DirStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn raster_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.root.join("tables").join(format!("{name}.json"))
    }
}

impl RasterStore for DirStore {
    fn list(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|source| HsiError::Io {
            name: self.root.display().to_string(),
            source,
        })?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| HsiError::Io {
                name: self.root.display().to_string(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn load(&self, name: &str) -> Result<Raster> {
        let path = self.raster_path(name);
        if !path.exists() {
            return Err(HsiError::MissingRaster(name.to_string()));
        }
        let text = fs::read_to_string(&path).map_err(|source| HsiError::Io {
            name: name.to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| HsiError::Format {
            name: name.to_string(),
            source,
        })
    }

    fn save(&mut self, name: &str, raster: &Raster) -> Result<()> {
        let json = serde_json::to_string(raster).map_err(|source| HsiError::Format {
            name: name.to_string(),
            source,
        })?;
        fs::write(self.raster_path(name), json).map_err(|source| HsiError::Io {
            name: name.to_string(),
            source,
        })
    }

    fn save_table(&mut self, name: &str, table: &ZoneStatsTable) -> Result<()> {
        let dir = self.root.join("tables");
        fs::create_dir_all(&dir).map_err(|source| HsiError::Io {
            name: dir.display().to_string(),
            source,
        })?;
        let json = serde_json::to_string_pretty(table).map_err(|source| HsiError::Format {
            name: name.to_string(),
            source,
        })?;
        fs::write(self.table_path(name), json).map_err(|source| HsiError::Io {
            name: name.to_string(),
            source,
        })
    }
}
