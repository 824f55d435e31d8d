//! Depth/velocity raster pairing.
//!
//! Survey rasters follow the naming schema `RasterNameText_UNIQUEID` or
//! `UNIQUEID_RasterNameText`: depth and velocity rasters for the same survey
//! unit share exactly one underscore-delimited token, which becomes the
//! pair's unique id.
use std::collections::BTreeMap;

use crate::error::{HsiError, Result};

/// One survey unit's depth and velocity raster names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterPair {
    pub depth: String,
    pub velocity: String,
}

/// Map of lower-cased unique id -> raster pair. BTreeMap keeps stage output
/// ordering deterministic across runs.
pub type PairMap = BTreeMap<String, RasterPair>;

/// Split workspace raster names into depth and velocity candidates by
/// case-insensitive substring. "dep" wins over "vel" when a name somehow
/// contains both, mirroring the classification order rasters were named for.
pub fn classify_names<'a, I>(names: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut depth = Vec::new();
    let mut velocity = Vec::new();
    for name in names {
        let lower = name.to_lowercase();
        if lower.contains("dep") {
            depth.push(name.to_string());
        } else if lower.contains("vel") {
            velocity.push(name.to_string());
        }
    }
    (depth, velocity)
}

/// Pair every depth raster with the velocity raster sharing a name token.
///
/// The unique id is the first shared token scanning the depth raster's tokens
/// in order, so a given depth/velocity pairing always produces the same id.
/// A unique id that would map to two *different* pairs is ambiguous naming and
/// is rejected outright rather than silently resolved by insertion order.
///
/// An empty result is not an error here; the pipeline entry treats it as a
/// configuration failure.
pub fn pair_rasters(depth: &[String], velocity: &[String]) -> Result<PairMap> {
    let mut pairs = PairMap::new();
    for dep in depth {
        for vel in velocity {
            let Some(id) = shared_token(dep, vel) else {
                continue;
            };
            let candidate = RasterPair {
                depth: dep.clone(),
                velocity: vel.clone(),
            };
            match pairs.get(&id) {
                None => {
                    pairs.insert(id, candidate);
                }
                Some(existing) if *existing == candidate => {}
                Some(existing) => {
                    return Err(HsiError::config(format!(
                        "ambiguous pairing for id {:?}: ({}, {}) vs ({}, {})",
                        id, existing.depth, existing.velocity, candidate.depth, candidate.velocity
                    )));
                }
            }
        }
    }
    Ok(pairs)
}

/// First token of `dep` (split on '_') that also appears among the tokens of
/// `vel`, compared case-insensitively. Returned lower-cased.
fn shared_token(dep: &str, vel: &str) -> Option<String> {
    let vel_tokens: Vec<&str> = vel.split('_').collect();
    dep.split('_')
        .find(|dep_tok| {
            vel_tokens
                .iter()
                .any(|vel_tok| dep_tok.eq_ignore_ascii_case(vel_tok))
        })
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn classify_splits_on_dep_vel_substrings() {
        let (dep, vel) = classify_names(["site1_Dep", "VEL_site1", "substrate"]);
        assert_eq!(dep, vec!["site1_Dep"]);
        assert_eq!(vel, vec!["VEL_site1"]);
    }

    #[test]
    fn pairs_by_shared_token_regardless_of_position() {
        let dep = names(&["site1_dep", "site2_dep"]);
        let vel = names(&["vel_site1", "vel_site2"]);
        let pairs = pair_rasters(&dep, &vel).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(
            pairs["site1"],
            RasterPair {
                depth: "site1_dep".into(),
                velocity: "vel_site1".into()
            }
        );
        assert_eq!(
            pairs["site2"],
            RasterPair {
                depth: "site2_dep".into(),
                velocity: "vel_site2".into()
            }
        );
    }

    #[test]
    fn matching_is_case_insensitive() {
        let pairs = pair_rasters(&names(&["Reach7_DEP"]), &names(&["vel_reach7"])).unwrap();
        assert!(pairs.contains_key("reach7"));
    }

    #[test]
    fn no_shared_tokens_yields_empty_map() {
        let pairs = pair_rasters(&names(&["site1_dep"]), &names(&["vel_site2"])).unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn conflicting_pairs_for_one_id_are_rejected() {
        let dep = names(&["site1_dep", "dep_site1_old"]);
        let vel = names(&["vel_site1"]);
        let err = pair_rasters(&dep, &vel).unwrap_err();
        assert!(matches!(err, HsiError::Config(_)));
    }

    #[test]
    fn multiple_shared_tokens_resolve_to_first_depth_token() {
        let pairs = pair_rasters(&names(&["a_b_dep"]), &names(&["a_b_vel"])).unwrap();
        assert_eq!(pairs.len(), 1);
        assert!(pairs.contains_key("a"));
    }
}
