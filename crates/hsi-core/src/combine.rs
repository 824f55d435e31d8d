//! Final HSI combination: per-species arithmetic mean over the suitability
//! layers relevant to that species.
use crate::error::Result;
use crate::raster::Raster;

/// Run-wide auxiliary suitability layers used by the Pearlshell formula.
pub struct AuxLayers<'a> {
    pub fish_cover: &'a Raster,
    pub seasonal_high_flow: &'a Raster,
    pub substrate: &'a Raster,
    pub percent_silt: &'a Raster,
}

/// Western Pearlshell: six-layer mean of the cv constant, the morph-unit HSI
/// and the four auxiliary layers. A missing cell in any layer is missing in
/// the output.
pub fn combine_pearlshell(cv_score: f64, morph_hsi: &Raster, aux: &AuxLayers) -> Result<Raster> {
    let cv = cv_score as f32;
    morph_hsi.zip_map5(
        aux.fish_cover,
        aux.seasonal_high_flow,
        aux.substrate,
        aux.percent_silt,
        |morph, fish, seasonal, substrate, silt| {
            (cv + morph + fish + seasonal + substrate + silt) / 6.0
        },
    )
}

/// California Floater: two-term mean of the cv constant and the morph-unit
/// HSI. The auxiliary layers do not participate.
pub fn combine_floater(cv_score: f64, morph_hsi: &Raster) -> Raster {
    let cv = cv_score as f32;
    morph_hsi.map(|morph| (cv + morph) / 2.0)
}
