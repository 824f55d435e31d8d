//! Zone aggregation: per-zone statistics and weighted usable area for final
//! HSI rasters.
//!
//! Zones come either from an integer-coded zone raster in the input store or
//! from a polygon shapefile rasterized at cell centres. Exactly one source
//! must be supplied per run.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shapefile::dbase::FieldValue;
use shapefile::PolygonRing;

use crate::error::{HsiError, Result};
use crate::raster::Raster;

// ── Zone sources ──────────────────────────────────────────────────────────────

/// Where zone membership comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneSource {
    /// Name of an integer-coded zone raster in the input store.
    Grid(String),
    /// Path to a polygon shapefile; zone ids read from the zone field.
    Shapefile(PathBuf),
}

impl ZoneSource {
    /// Enforce the exactly-one-source rule at run entry.
    pub fn resolve(grid: Option<String>, shapefile: Option<PathBuf>) -> Result<ZoneSource> {
        match (grid, shapefile) {
            (Some(name), None) => Ok(ZoneSource::Grid(name)),
            (None, Some(path)) => Ok(ZoneSource::Shapefile(path)),
            (None, None) => Err(HsiError::config(
                "include a zone grid or shapefile to be used for zonal stats",
            )),
            (Some(_), Some(_)) => Err(HsiError::config(
                "supply either a zone grid or a zone shapefile, not both",
            )),
        }
    }
}

/// Per-cell zone membership aligned with one raster's grid.
/// `assignment[i]` indexes into `labels`; None = outside every zone.
#[derive(Debug, Clone)]
pub struct ZoneGrid {
    pub assignment: Vec<Option<usize>>,
    pub labels: Vec<String>,
    pub width: usize,
    pub height: usize,
}

impl ZoneGrid {
    /// Derive zone membership from an integer-coded raster. Missing cells
    /// belong to no zone; labels are the distinct codes in ascending order.
    pub fn from_raster(zones: &Raster) -> ZoneGrid {
        let mut codes: Vec<i64> = zones
            .valid_values()
            .map(|v| v.round() as i64)
            .collect();
        codes.sort_unstable();
        codes.dedup();
        let index: BTreeMap<i64, usize> =
            codes.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        let assignment = zones
            .data
            .iter()
            .map(|v| {
                if v.is_nan() {
                    None
                } else {
                    index.get(&(v.round() as i64)).copied()
                }
            })
            .collect();
        ZoneGrid {
            assignment,
            labels: codes.iter().map(|c| c.to_string()).collect(),
            width: zones.width,
            height: zones.height,
        }
    }

    /// Rasterize shapefile polygons onto the template grid: each cell joins
    /// the first feature (file order) whose polygon contains its centre.
    pub fn from_shapefile(path: &Path, template: &Raster, zone_field: &str) -> Result<ZoneGrid> {
        let features = read_zone_features(path, zone_field)?;
        let mut labels: Vec<String> = Vec::new();
        let mut feature_zone: Vec<usize> = Vec::with_capacity(features.len());
        for feature in &features {
            let idx = labels
                .iter()
                .position(|l| l == &feature.label)
                .unwrap_or_else(|| {
                    labels.push(feature.label.clone());
                    labels.len() - 1
                });
            feature_zone.push(idx);
        }

        let mut assignment = vec![None; template.width * template.height];
        for row in 0..template.height {
            for col in 0..template.width {
                let (x, y) = template.cell_center(row, col);
                for (fi, feature) in features.iter().enumerate() {
                    if feature.contains(x, y) {
                        assignment[row * template.width + col] = Some(feature_zone[fi]);
                        break;
                    }
                }
            }
        }
        Ok(ZoneGrid {
            assignment,
            labels,
            width: template.width,
            height: template.height,
        })
    }
}

// ── Shapefile reading ─────────────────────────────────────────────────────────

/// One polygon feature with its zone label. Rings keep shapefile order;
/// even-odd containment over all rings handles holes without classifying
/// outer vs inner.
struct ZoneFeature {
    label: String,
    rings: Vec<Vec<(f64, f64)>>,
}

impl ZoneFeature {
    /// Even-odd ray cast across every ring.
    fn contains(&self, x: f64, y: f64) -> bool {
        let mut inside = false;
        for ring in &self.rings {
            let n = ring.len();
            if n < 3 {
                continue;
            }
            let mut j = n - 1;
            for i in 0..n {
                let (xi, yi) = ring[i];
                let (xj, yj) = ring[j];
                if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                    inside = !inside;
                }
                j = i;
            }
        }
        inside
    }
}

fn read_zone_features(path: &Path, zone_field: &str) -> Result<Vec<ZoneFeature>> {
    let shapes = shapefile::read_as::<_, shapefile::Polygon, shapefile::dbase::Record>(path)
        .map_err(|e| {
            HsiError::computation(format!("reading zone shapefile {}: {}", path.display(), e))
        })?;
    let mut features = Vec::with_capacity(shapes.len());
    for (polygon, record) in shapes {
        let value = record.get(zone_field).ok_or_else(|| {
            HsiError::config(format!(
                "zone field {:?} not present in {}",
                zone_field,
                path.display()
            ))
        })?;
        let label = field_label(value).ok_or_else(|| {
            HsiError::config(format!("zone field {:?} has an empty or unusable value", zone_field))
        })?;
        let rings = polygon
            .rings()
            .iter()
            .map(|ring| {
                let points = match ring {
                    PolygonRing::Outer(pts) | PolygonRing::Inner(pts) => pts,
                };
                points.iter().map(|p| (p.x, p.y)).collect()
            })
            .collect();
        features.push(ZoneFeature { label, rings });
    }
    Ok(features)
}

fn field_label(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(Some(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        FieldValue::Numeric(Some(n)) => Some(format_zone_number(*n)),
        FieldValue::Float(Some(f)) => Some(format_zone_number(f64::from(*f))),
        FieldValue::Integer(i) => Some(i.to_string()),
        FieldValue::Double(d) => Some(format_zone_number(*d)),
        _ => None,
    }
}

fn format_zone_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// ── Statistics ────────────────────────────────────────────────────────────────

/// One zone's statistics row. `wua` is the per-zone weighted usable area:
/// Σ(cell value × cell area) over the zone's non-missing cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneStatsRow {
    pub zone: String,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub mean: f64,
    pub std: f64,
    pub sum: f64,
    pub median: f64,
    pub pct90: f64,
    pub wua: f64,
}

/// Zonal-statistics table for one final HSI raster. `total_wua` is the
/// whole-raster weighted usable area, kept alongside the per-zone figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneStatsTable {
    pub raster: String,
    pub zone_field: String,
    pub cell_area: f64,
    pub total_wua: f64,
    pub rows: Vec<ZoneStatsRow>,
}

/// Whole-raster weighted usable area: Σ(value × cell area), missing cells
/// excluded (not treated as zero).
pub fn weighted_usable_area(raster: &Raster) -> f64 {
    let area = raster.cell_area();
    raster.valid_values().map(|v| f64::from(v) * area).sum()
}

/// Compute per-zone statistics for a raster against an aligned zone grid.
/// Zones with no valid cells produce no row.
pub fn zonal_statistics(
    raster_name: &str,
    raster: &Raster,
    zones: &ZoneGrid,
    zone_field: &str,
) -> Result<ZoneStatsTable> {
    if raster.width != zones.width || raster.height != zones.height {
        return Err(HsiError::computation(format!(
            "zone grid shape {}x{} does not match raster {:?} ({}x{})",
            zones.width, zones.height, raster_name, raster.width, raster.height
        )));
    }

    let mut by_zone: Vec<Vec<f64>> = vec![Vec::new(); zones.labels.len()];
    for (i, &v) in raster.data.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        if let Some(zone) = zones.assignment[i] {
            by_zone[zone].push(f64::from(v));
        }
    }

    let area = raster.cell_area();
    let mut rows = Vec::new();
    for (zone, values) in by_zone.iter_mut().enumerate() {
        if values.is_empty() {
            continue;
        }
        values.sort_by(|a, b| a.total_cmp(b));
        let count = values.len();
        let min = values[0];
        let max = values[count - 1];
        let sum: f64 = values.iter().sum();
        let mean = sum / count as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
        rows.push(ZoneStatsRow {
            zone: zones.labels[zone].clone(),
            count,
            min,
            max,
            range: max - min,
            mean,
            std: variance.sqrt(),
            sum,
            median: percentile(values, 50.0),
            pct90: percentile(values, 90.0),
            wua: sum * area,
        });
    }

    Ok(ZoneStatsTable {
        raster: raster_name.to_string(),
        zone_field: zone_field.to_string(),
        cell_area: area,
        total_wua: weighted_usable_area(raster),
        rows,
    })
}

/// Linear-interpolation percentile over sorted values.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn resolve_requires_exactly_one_source() {
        assert!(matches!(
            ZoneSource::resolve(Some("zones".into()), None),
            Ok(ZoneSource::Grid(_))
        ));
        assert!(matches!(
            ZoneSource::resolve(None, Some("zones.shp".into())),
            Ok(ZoneSource::Shapefile(_))
        ));
        assert!(ZoneSource::resolve(None, None).is_err());
        assert!(ZoneSource::resolve(Some("zones".into()), Some("zones.shp".into())).is_err());
    }

    #[test]
    fn wua_excludes_missing_cells() {
        let mut r = Raster::new(2, 2, 0.0, 0.0, 2.0, 2.0, 0.0);
        r.data = vec![1.0, 2.0, f32::NAN, 3.0];
        assert_relative_eq!(weighted_usable_area(&r), 24.0);
    }

    #[test]
    fn zone_grid_from_raster_orders_codes() {
        let zones = Raster::from_values(2, 2, vec![7.0, 3.0, f32::NAN, 3.0]);
        let grid = ZoneGrid::from_raster(&zones);
        assert_eq!(grid.labels, vec!["3", "7"]);
        assert_eq!(grid.assignment, vec![Some(1), Some(0), None, Some(0)]);
    }

    #[test]
    fn zonal_stats_groups_by_zone() {
        let raster = Raster::from_values(2, 2, vec![1.0, 2.0, 3.0, f32::NAN]);
        let zones = ZoneGrid::from_raster(&Raster::from_values(2, 2, vec![1.0, 1.0, 2.0, 2.0]));
        let table = zonal_statistics("test", &raster, &zones, "Zone").unwrap();
        assert_eq!(table.rows.len(), 2);

        let z1 = &table.rows[0];
        assert_eq!(z1.zone, "1");
        assert_eq!(z1.count, 2);
        assert_relative_eq!(z1.mean, 1.5);
        assert_relative_eq!(z1.sum, 3.0);
        assert_relative_eq!(z1.wua, 3.0); // unit cells

        let z2 = &table.rows[1];
        assert_eq!(z2.zone, "2");
        assert_eq!(z2.count, 1);
        assert_relative_eq!(z2.sum, 3.0);

        assert_relative_eq!(table.total_wua, 6.0);
    }

    #[test]
    fn zonal_stats_rejects_mismatched_grids() {
        let raster = Raster::filled(2, 2, 1.0);
        let zones = ZoneGrid::from_raster(&Raster::filled(3, 3, 1.0));
        assert!(zonal_statistics("test", &raster, &zones, "Zone").is_err());
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(percentile(&values, 50.0), 3.0);
        assert_relative_eq!(percentile(&values, 90.0), 4.6);
        assert_relative_eq!(percentile(&values, 0.0), 1.0);
        assert_relative_eq!(percentile(&values, 100.0), 5.0);
    }

    #[test]
    fn feature_containment_even_odd_with_hole() {
        let feature = ZoneFeature {
            label: "z".into(),
            rings: vec![
                vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)],
                vec![(4.0, 4.0), (6.0, 4.0), (6.0, 6.0), (4.0, 6.0), (4.0, 4.0)],
            ],
        };
        assert!(feature.contains(2.0, 2.0));
        assert!(!feature.contains(5.0, 5.0)); // inside the hole
        assert!(!feature.contains(11.0, 5.0));
    }
}
