//! # hsi-core
//!
//! Habitat Suitability Index (HSI) pipeline for freshwater mussels (Western
//! Pearlshell, California Floater).
//!
//! ## Pipeline
//!
//! ```text
//! survey rasters -> pairing -> morphological units -> species scoring
//!     -> HSI combination (+ cv score, seasonal high flow, aux layers)
//!     -> zonal statistics + weighted usable area
//! ```
//!
//! Raster persistence is behind the [`store::RasterStore`] capability; the
//! decision logic (classification thresholds, pairing, scoring tables,
//! combination formulas) lives entirely in this crate.

pub mod combine;
pub mod error;
pub mod morphology;
pub mod pairing;
pub mod pipeline;
pub mod raster;
pub mod species;
pub mod store;
pub mod suitability;
pub mod zones;

pub use error::{HsiError, Result};
pub use morphology::MorphUnit;
pub use pipeline::{resume_zonal, run, RunParams, RunSummary};
pub use raster::Raster;
pub use species::{Species, SpeciesSelection};
pub use store::{DirStore, MemStore, RasterStore};
pub use zones::{ZoneSource, ZoneStatsTable};
