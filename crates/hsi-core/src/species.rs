//! Per-species suitability scoring of morphological units.
use serde::{Deserialize, Serialize};

use crate::morphology::MorphUnit;
use crate::raster::Raster;

/// Freshwater mussel species covered by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Species {
    WesternPearlshell,
    CaliforniaFloater,
}

impl Species {
    pub const ALL: [Species; 2] = [Species::WesternPearlshell, Species::CaliforniaFloater];

    /// Suitability of a morphological unit for this species.
    ///
    /// Pearlshell favours flowing units; Pool and Deep Channel are marginal,
    /// Unclassified is unsuitable. Floater is a pool specialist: everything
    /// except Pool (Unclassified included) scores 0.5.
    pub fn morph_suitability(self, unit: MorphUnit) -> f32 {
        match self {
            Species::WesternPearlshell => match unit {
                MorphUnit::PlaneBed
                | MorphUnit::Riffle
                | MorphUnit::Run
                | MorphUnit::Glide
                | MorphUnit::Chute => 1.0,
                MorphUnit::Pool | MorphUnit::DeepChannel => 0.5,
                MorphUnit::Unclassified => 0.0,
            },
            Species::CaliforniaFloater => match unit {
                MorphUnit::Pool => 1.0,
                _ => 0.5,
            },
        }
    }

    /// Prefix of the final per-survey-unit HSI raster name.
    pub fn final_prefix(self) -> &'static str {
        match self {
            Species::WesternPearlshell => "WesternPearl",
            Species::CaliforniaFloater => "CaliFloater",
        }
    }

    /// Suffix of the intermediate morph-unit HSI raster name.
    pub fn morph_hsi_suffix(self) -> &'static str {
        match self {
            Species::WesternPearlshell => "Pearlshell",
            Species::CaliforniaFloater => "CaliFloat",
        }
    }
}

/// Which species the run should produce final HSI rasters for.
/// An empty selection is rejected at the pipeline entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesSelection {
    pub western_pearlshell: bool,
    pub california_floater: bool,
}

impl SpeciesSelection {
    pub fn new(western_pearlshell: bool, california_floater: bool) -> Self {
        Self {
            western_pearlshell,
            california_floater,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.western_pearlshell && !self.california_floater
    }

    /// Selected species, always in `Species::ALL` order.
    pub fn iter(&self) -> impl Iterator<Item = Species> + '_ {
        Species::ALL.into_iter().filter(|s| match s {
            Species::WesternPearlshell => self.western_pearlshell,
            Species::CaliforniaFloater => self.california_floater,
        })
    }
}

/// Score a morph-unit raster for one species, cell-wise. Codes outside 0-7
/// (possible only through hand-edited inputs) count as Unclassified.
pub fn morph_hsi_raster(species: Species, units: &Raster) -> Raster {
    units.map(|code| {
        if code.is_nan() {
            f32::NAN
        } else {
            let unit = MorphUnit::from_code(code as u8).unwrap_or(MorphUnit::Unclassified);
            species.morph_suitability(unit)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pearlshell_scores_match_lookup_table() {
        use MorphUnit::*;
        let s = Species::WesternPearlshell;
        for unit in [PlaneBed, Riffle, Run, Glide, Chute] {
            assert_eq!(s.morph_suitability(unit), 1.0, "{}", unit.name());
        }
        for unit in [Pool, DeepChannel] {
            assert_eq!(s.morph_suitability(unit), 0.5, "{}", unit.name());
        }
        assert_eq!(s.morph_suitability(Unclassified), 0.0);
    }

    #[test]
    fn floater_scores_pool_one_everything_else_half() {
        let s = Species::CaliforniaFloater;
        for unit in MorphUnit::ALL {
            let expected = if unit == MorphUnit::Pool { 1.0 } else { 0.5 };
            assert_eq!(s.morph_suitability(unit), expected, "{}", unit.name());
        }
    }

    #[test]
    fn all_scores_are_valid_suitabilities() {
        for species in Species::ALL {
            for unit in MorphUnit::ALL {
                let v = species.morph_suitability(unit);
                assert!([0.0, 0.5, 1.0].contains(&v));
            }
        }
    }

    #[test]
    fn empty_selection_detected() {
        assert!(SpeciesSelection::default().is_empty());
        assert!(!SpeciesSelection::new(true, false).is_empty());
    }

    #[test]
    fn selection_iterates_in_fixed_order() {
        let both: Vec<Species> = SpeciesSelection::new(true, true).iter().collect();
        assert_eq!(both, vec![Species::WesternPearlshell, Species::CaliforniaFloater]);
        let floater: Vec<Species> = SpeciesSelection::new(false, true).iter().collect();
        assert_eq!(floater, vec![Species::CaliforniaFloater]);
    }

    #[test]
    fn morph_hsi_raster_scores_cells_and_keeps_missing() {
        let units = Raster::from_values(2, 2, vec![1.0, 4.0, 0.0, f32::NAN]);
        let hsi = morph_hsi_raster(Species::WesternPearlshell, &units);
        assert_eq!(hsi.get(0, 0), 1.0);
        assert_eq!(hsi.get(0, 1), 0.5);
        assert_eq!(hsi.get(1, 0), 0.0);
        assert!(hsi.get(1, 1).is_nan());
    }
}
