//! Pipeline orchestrator: runs the HSI stages strictly in order.
//!
//! Stage order: entry validation -> seasonal high-flow layer -> pairing ->
//! morphological classification -> per-species morph HSI -> final HSI
//! combination -> zone aggregation. Later stages receive typed context (pair
//! map, in-memory morph HSI rasters, final raster names) from earlier ones;
//! `resume_zonal` is the explicit re-scan entry point for a workspace that
//! already holds final rasters.
use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::combine::{combine_floater, combine_pearlshell, AuxLayers};
use crate::error::{HsiError, Result};
use crate::morphology::morph_unit_raster;
use crate::pairing::{classify_names, pair_rasters};
use crate::raster::Raster;
use crate::species::{morph_hsi_raster, Species, SpeciesSelection};
use crate::store::RasterStore;
use crate::suitability::{cv_score, parse_cv, seasonal_high_flow_hsi, SEASONAL_HSI_NAME};
use crate::zones::{zonal_statistics, ZoneGrid, ZoneSource};

/// Caller-supplied run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunParams {
    /// Coefficient of variation as entered by the caller; parsed at entry.
    pub coefficient_of_variation: String,
    /// Names of the three auxiliary suitability rasters in the input store.
    pub fish_cover_hsi: String,
    pub substrate_hsi: String,
    pub percent_silt_hsi: String,
    pub species: SpeciesSelection,
    /// Zone source: exactly one of these must be set.
    pub zone_grid: Option<String>,
    pub zone_shapefile: Option<PathBuf>,
    pub zone_field: String,
    /// Name of the seasonal high-flow velocity raster in the input store.
    pub seasonal_high_flow_velocity: String,
}

impl RunParams {
    fn zone_source(&self) -> Result<ZoneSource> {
        ZoneSource::resolve(self.zone_grid.clone(), self.zone_shapefile.clone())
    }
}

/// Artifacts written by a run, in write order.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub unique_ids: Vec<String>,
    pub rasters_written: Vec<String>,
    pub tables_written: Vec<String>,
}

/// Run the full pipeline: read survey rasters from `input`, write every
/// artifact into `output`. Fails fast on configuration errors, before any
/// raster is written.
pub fn run(
    input: &dyn RasterStore,
    output: &mut dyn RasterStore,
    params: &RunParams,
) -> Result<RunSummary> {
    if params.species.is_empty() {
        return Err(HsiError::config("choose at least one species to generate HSI"));
    }
    let zone_source = params.zone_source()?;
    let cv = parse_cv(&params.coefficient_of_variation)?;
    let cv_hsi = cv_score(cv);
    info!(cv, cv_hsi, "coefficient of variation scored");

    let names = input.list()?;
    let (depth_names, velocity_names) = classify_names(names.iter().map(String::as_str));
    info!(depth = ?depth_names, velocity = ?velocity_names, "classified survey rasters");
    let pairs = pair_rasters(&depth_names, &velocity_names)?;
    if pairs.is_empty() {
        return Err(HsiError::config(
            "no depth and velocity raster pairings found; confirm the naming schema",
        ));
    }

    let mut summary = RunSummary {
        unique_ids: pairs.keys().cloned().collect(),
        ..RunSummary::default()
    };

    // Seasonal high-flow layer: derived once per run, not per survey unit.
    let seasonal_velocity = input.load(&params.seasonal_high_flow_velocity)?;
    let seasonal = seasonal_high_flow_hsi(&seasonal_velocity);
    save_raster(output, SEASONAL_HSI_NAME, &seasonal, &mut summary)?;

    // Morphological units and per-species morph HSI. Both species'
    // intermediates are always produced; the selection gates finals only.
    let mut morph_hsi: BTreeMap<(String, Species), Raster> = BTreeMap::new();
    for (id, pair) in &pairs {
        let depth = input.load(&pair.depth)?;
        let velocity = input.load(&pair.velocity)?;
        let units = morph_unit_raster(&depth, &velocity)?;
        save_raster(output, &format!("MorphUnit_{id}"), &units, &mut summary)?;

        for species in Species::ALL {
            let hsi = morph_hsi_raster(species, &units);
            let name = format!("MorphUnit_{id}_HSI_{}", species.morph_hsi_suffix());
            save_raster(output, &name, &hsi, &mut summary)?;
            morph_hsi.insert((id.clone(), species), hsi);
        }
    }

    // Auxiliary layers participate in the Pearlshell formula only.
    let aux_rasters = if params.species.western_pearlshell {
        Some((
            input.load(&params.fish_cover_hsi)?,
            input.load(&params.substrate_hsi)?,
            input.load(&params.percent_silt_hsi)?,
        ))
    } else {
        None
    };

    // Final per-species HSI rasters.
    let ids = summary.unique_ids.clone();
    let mut finals = Vec::new();
    for id in &ids {
        for species in params.species.iter() {
            let morph = &morph_hsi[&(id.clone(), species)];
            let final_raster = match species {
                Species::WesternPearlshell => {
                    let (fish, substrate, silt) = aux_rasters.as_ref().ok_or_else(|| {
                        HsiError::computation("auxiliary layers missing for Pearlshell")
                    })?;
                    let aux = AuxLayers {
                        fish_cover: fish,
                        seasonal_high_flow: &seasonal,
                        substrate,
                        percent_silt: silt,
                    };
                    combine_pearlshell(cv_hsi, morph, &aux)?
                }
                Species::CaliforniaFloater => combine_floater(cv_hsi, morph),
            };
            let name = format!("{}_HSI_{}", species.final_prefix(), id);
            save_raster(output, &name, &final_raster, &mut summary)?;
            finals.push(name);
        }
    }

    aggregate_zones(input, output, &finals, &zone_source, &params.zone_field, &mut summary)?;
    Ok(summary)
}

/// Resume entry point: discover final HSI rasters already present in the
/// output store by name pattern (`*_HSI_*`, morph-unit intermediates
/// excluded) and run only the zone aggregation stage.
pub fn resume_zonal(
    input: &dyn RasterStore,
    output: &mut dyn RasterStore,
    params: &RunParams,
) -> Result<RunSummary> {
    let zone_source = params.zone_source()?;
    let finals: Vec<String> = output
        .list()?
        .into_iter()
        .filter(|n| is_final_hsi_name(n))
        .collect();
    if finals.is_empty() {
        return Err(HsiError::config(
            "no final HSI rasters found in the output store to aggregate",
        ));
    }
    info!(count = finals.len(), "resuming zone aggregation over existing finals");

    let mut summary = RunSummary::default();
    aggregate_zones(input, output, &finals, &zone_source, &params.zone_field, &mut summary)?;
    Ok(summary)
}

/// `*_HSI_*` with the morph-unit intermediates excluded.
fn is_final_hsi_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("_hsi_") && !lower.contains("morphunit")
}

fn save_raster(
    output: &mut dyn RasterStore,
    name: &str,
    raster: &Raster,
    summary: &mut RunSummary,
) -> Result<()> {
    info!(name, "saving raster");
    output.save(name, raster)?;
    summary.rasters_written.push(name.to_string());
    Ok(())
}

fn aggregate_zones(
    input: &dyn RasterStore,
    output: &mut dyn RasterStore,
    finals: &[String],
    source: &ZoneSource,
    zone_field: &str,
    summary: &mut RunSummary,
) -> Result<()> {
    // A grid source is one shared zone raster; a shapefile is rasterized
    // against each final raster's own geometry.
    let shared_grid = match source {
        ZoneSource::Grid(name) => Some(ZoneGrid::from_raster(&input.load(name)?)),
        ZoneSource::Shapefile(_) => None,
    };

    for name in finals {
        let raster = output.load(name)?;
        let grid = match (&shared_grid, source) {
            (Some(g), _) => g.clone(),
            (None, ZoneSource::Shapefile(path)) => {
                ZoneGrid::from_shapefile(path, &raster, zone_field)?
            }
            (None, ZoneSource::Grid(_)) => unreachable!("grid source resolved above"),
        };
        let table = zonal_statistics(name, &raster, &grid, zone_field)?;
        info!(
            raster = name.as_str(),
            zones = table.rows.len(),
            total_wua = table.total_wua,
            "zonal statistics computed"
        );
        let table_name = format!("{name}_Stats");
        output.save_table(&table_name, &table)?;
        summary.tables_written.push(table_name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use approx::assert_relative_eq;

    fn base_params() -> RunParams {
        RunParams {
            coefficient_of_variation: "0.95".into(),
            fish_cover_hsi: "FishCoverHSI".into(),
            substrate_hsi: "SubstrateHSI".into(),
            percent_silt_hsi: "PercentSiltHSI".into(),
            species: SpeciesSelection::new(true, true),
            zone_grid: Some("ZoneIds".into()),
            zone_shapefile: None,
            zone_field: "Zone".into(),
            seasonal_high_flow_velocity: "SeasHighFlowVel".into(),
        }
    }

    /// Input workspace: one survey unit ("site1"), uniform depth 1 / velocity
    /// 0.5 (Plane Bed everywhere), all aux layers fully suitable.
    fn base_input() -> MemStore {
        let mut input = MemStore::new();
        input.insert("site1_dep", Raster::filled(2, 2, 1.0));
        input.insert("vel_site1", Raster::filled(2, 2, 0.5));
        input.insert("FishCoverHSI", Raster::filled(2, 2, 1.0));
        input.insert("SubstrateHSI", Raster::filled(2, 2, 1.0));
        input.insert("PercentSiltHSI", Raster::filled(2, 2, 1.0));
        input.insert("SeasHighFlowVel", Raster::filled(2, 2, 2.0));
        input.insert("ZoneIds", Raster::filled(2, 2, 1.0));
        input
    }

    #[test]
    fn full_run_produces_expected_artifact_set() {
        let input = base_input();
        let mut output = MemStore::new();
        let summary = run(&input, &mut output, &base_params()).unwrap();

        assert_eq!(summary.unique_ids, vec!["site1"]);
        for name in [
            "SeasHighFlowVelRas_HSI",
            "MorphUnit_site1",
            "MorphUnit_site1_HSI_Pearlshell",
            "MorphUnit_site1_HSI_CaliFloat",
            "WesternPearl_HSI_site1",
            "CaliFloater_HSI_site1",
        ] {
            assert!(output.raster(name).is_some(), "missing {name}");
        }
        assert_eq!(
            output.table_names(),
            vec![
                "CaliFloater_HSI_site1_Stats".to_string(),
                "WesternPearl_HSI_site1_Stats".to_string()
            ]
        );
    }

    #[test]
    fn final_values_follow_combination_formulas() {
        let input = base_input();
        let mut output = MemStore::new();
        run(&input, &mut output, &base_params()).unwrap();

        // cv 0.95 -> 0.75. Plane Bed: Pearlshell 1.0, Floater 0.5.
        let pearl = output.raster("WesternPearl_HSI_site1").unwrap();
        assert_relative_eq!(pearl.get(0, 0), (0.75 + 1.0 + 1.0 + 1.0 + 1.0 + 1.0) / 6.0);

        let floater = output.raster("CaliFloater_HSI_site1").unwrap();
        assert_relative_eq!(floater.get(0, 0), (0.75 + 0.5) / 2.0);
    }

    #[test]
    fn stats_tables_carry_per_zone_and_total_wua() {
        let input = base_input();
        let mut output = MemStore::new();
        run(&input, &mut output, &base_params()).unwrap();

        let table = output.table("CaliFloater_HSI_site1_Stats").unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].zone, "1");
        assert_eq!(table.rows[0].count, 4);
        assert_relative_eq!(table.rows[0].wua, 4.0 * 0.625);
        assert_relative_eq!(table.total_wua, 4.0 * 0.625);
    }

    #[test]
    fn no_species_selected_is_config_error_with_no_artifacts() {
        let input = base_input();
        let mut output = MemStore::new();
        let mut params = base_params();
        params.species = SpeciesSelection::default();
        let err = run(&input, &mut output, &params).unwrap_err();
        assert!(matches!(err, HsiError::Config(_)));
        assert!(output.raster_names().is_empty());
        assert!(output.table_names().is_empty());
    }

    #[test]
    fn missing_zone_source_is_config_error() {
        let input = base_input();
        let mut output = MemStore::new();
        let mut params = base_params();
        params.zone_grid = None;
        assert!(matches!(
            run(&input, &mut output, &params).unwrap_err(),
            HsiError::Config(_)
        ));
        assert!(output.raster_names().is_empty());
    }

    #[test]
    fn non_numeric_cv_is_parse_error() {
        let input = base_input();
        let mut output = MemStore::new();
        let mut params = base_params();
        params.coefficient_of_variation = "variable".into();
        assert!(matches!(
            run(&input, &mut output, &params).unwrap_err(),
            HsiError::Parse { .. }
        ));
    }

    #[test]
    fn no_pairings_is_config_error() {
        let mut input = base_input();
        // Remove the velocity raster so no pairing can form.
        let mut fresh = MemStore::new();
        for name in input.raster_names() {
            if name != "vel_site1" {
                fresh.insert(name.clone(), input.load(&name).unwrap());
            }
        }
        input = fresh;

        let mut output = MemStore::new();
        let err = run(&input, &mut output, &base_params()).unwrap_err();
        assert!(matches!(err, HsiError::Config(_)));
    }

    #[test]
    fn floater_only_run_skips_pearlshell_final_but_keeps_intermediates() {
        let mut input = base_input();
        // Aux rasters are not needed for a floater-only run.
        let mut fresh = MemStore::new();
        for name in input.raster_names() {
            if !name.contains("FishCover") && !name.contains("Substrate") && !name.contains("Silt")
            {
                fresh.insert(name.clone(), input.load(&name).unwrap());
            }
        }
        input = fresh;

        let mut output = MemStore::new();
        let mut params = base_params();
        params.species = SpeciesSelection::new(false, true);
        run(&input, &mut output, &params).unwrap();

        assert!(output.raster("CaliFloater_HSI_site1").is_some());
        assert!(output.raster("WesternPearl_HSI_site1").is_none());
        assert!(output.raster("MorphUnit_site1_HSI_Pearlshell").is_some());
        assert!(output.raster("MorphUnit_site1_HSI_CaliFloat").is_some());
    }

    #[test]
    fn two_survey_units_produce_finals_per_unit() {
        let mut input = base_input();
        input.insert("site2_dep", Raster::filled(2, 2, 5.0));
        input.insert("vel_site2", Raster::filled(2, 2, 0.5));

        let mut output = MemStore::new();
        let summary = run(&input, &mut output, &base_params()).unwrap();
        assert_eq!(summary.unique_ids, vec!["site1", "site2"]);
        for id in ["site1", "site2"] {
            assert!(output.raster(&format!("WesternPearl_HSI_{id}")).is_some());
            assert!(output.raster(&format!("CaliFloater_HSI_{id}")).is_some());
        }

        // site2 is uniform Pool (depth 5, velocity 0.5): Floater scores 1.0.
        let floater = output.raster("CaliFloater_HSI_site2").unwrap();
        assert_relative_eq!(floater.get(0, 0), (0.75 + 1.0) / 2.0);
    }

    #[test]
    fn resume_zonal_aggregates_existing_finals_only() {
        let mut input = MemStore::new();
        input.insert("ZoneIds", Raster::filled(2, 2, 3.0));

        let mut output = MemStore::new();
        output.insert("WesternPearl_HSI_site1", Raster::filled(2, 2, 0.5));
        output.insert("MorphUnit_site1_HSI_Pearlshell", Raster::filled(2, 2, 1.0));
        output.insert("SeasHighFlowVelRas_HSI", Raster::filled(2, 2, 1.0));

        let summary = resume_zonal(&input, &mut output, &base_params()).unwrap();
        assert_eq!(summary.tables_written, vec!["WesternPearl_HSI_site1_Stats"]);
        assert!(output.table("MorphUnit_site1_HSI_Pearlshell_Stats").is_none());
    }

    #[test]
    fn resume_with_no_finals_is_config_error() {
        let input = MemStore::new();
        let mut output = MemStore::new();
        assert!(matches!(
            resume_zonal(&input, &mut output, &base_params()).unwrap_err(),
            HsiError::Config(_)
        ));
    }

    #[test]
    fn final_name_pattern_excludes_intermediates_and_seasonal() {
        assert!(is_final_hsi_name("WesternPearl_HSI_site1"));
        assert!(is_final_hsi_name("CaliFloater_HSI_reach7"));
        assert!(!is_final_hsi_name("MorphUnit_site1_HSI_Pearlshell"));
        assert!(!is_final_hsi_name("SeasHighFlowVelRas_HSI"));
        assert!(!is_final_hsi_name("site1_dep"));
    }
}
