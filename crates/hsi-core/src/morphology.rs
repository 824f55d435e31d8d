//! Morphological-unit classification from paired depth and velocity grids.
use crate::error::Result;
use crate::raster::Raster;

/// River morphological units, coded 0-7 in the persisted unit raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MorphUnit {
    Unclassified = 0,
    PlaneBed = 1,
    Riffle = 2,
    Run = 3,
    Pool = 4,
    Glide = 5,
    Chute = 6,
    DeepChannel = 7,
}

impl MorphUnit {
    pub const ALL: [MorphUnit; 8] = [
        MorphUnit::Unclassified,
        MorphUnit::PlaneBed,
        MorphUnit::Riffle,
        MorphUnit::Run,
        MorphUnit::Pool,
        MorphUnit::Glide,
        MorphUnit::Chute,
        MorphUnit::DeepChannel,
    ];

    /// Classify one cell from its depth and velocity.
    ///
    /// First true branch wins. All comparisons are strict: a cell sitting
    /// exactly on a threshold (depth 2 or 4, velocity 1 or 2 outside the
    /// stated ranges) falls through to Unclassified. Off-by-one changes here
    /// silently reclassify cells, so the inequalities must stay exact.
    pub fn classify(depth: f32, velocity: f32) -> MorphUnit {
        if depth < 2.0 && velocity < 1.0 {
            MorphUnit::PlaneBed
        } else if depth < 2.0 && velocity > 2.0 {
            MorphUnit::Riffle
        } else if depth > 2.0 && depth < 4.0 && velocity < 1.0 {
            MorphUnit::Run
        } else if depth > 4.0 && velocity < 1.0 {
            MorphUnit::Pool
        } else if depth < 2.0 && velocity > 1.0 && velocity < 2.0 {
            MorphUnit::Glide
        } else if depth > 2.0 && depth < 4.0 && velocity > 1.0 {
            MorphUnit::Chute
        } else if depth > 4.0 && velocity > 1.0 {
            MorphUnit::DeepChannel
        } else {
            MorphUnit::Unclassified
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<MorphUnit> {
        MorphUnit::ALL.get(code as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            MorphUnit::Unclassified => "Unclassified",
            MorphUnit::PlaneBed => "Plane Bed",
            MorphUnit::Riffle => "Riffle",
            MorphUnit::Run => "Run",
            MorphUnit::Pool => "Pool",
            MorphUnit::Glide => "Glide",
            MorphUnit::Chute => "Chute",
            MorphUnit::DeepChannel => "Deep Channel",
        }
    }
}

/// Evaluate the classification rule cell-wise over a depth/velocity pair.
/// Missing depth or velocity yields a missing unit cell.
pub fn morph_unit_raster(depth: &Raster, velocity: &Raster) -> Result<Raster> {
    depth.zip_map(velocity, |d, v| {
        if d.is_nan() || v.is_nan() {
            f32::NAN
        } else {
            f32::from(MorphUnit::classify(d, v).code())
        }
    })
}
