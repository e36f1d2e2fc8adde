//! Land cover sub-indicator: start/end snapshots, transition coding
//! and the matrix reclassification into degraded/stable/improved.

use crate::config::{RunConfig, WaterMaskPolicy};
use crate::engine::Image;
use crate::io::DataCatalog;
use crate::params::tables::{
    ESA_CLASS_CODES, ESA_TO_IPCC, ESA_WATER_CODE, JRC_WATER_ASSET, LAND_COVER_ASSET,
    LAND_COVER_FIRST_YEAR, LAND_COVER_MAX_YEAR,
};
use crate::types::{DegradError, DegradResult};

/// Multiplier packing a (start, end) class pair into one transition
/// code: two digits per side.
pub const TRANSITION_MULTIPLIER: i64 = 100;

/// The five output layers of the land cover engine.
#[derive(Debug, Clone)]
pub struct LandCoverMaps {
    /// Start-year working classes.
    pub start: Image,
    /// End-year working classes.
    pub end: Image,
    /// Raw transition code `start * 100 + end`.
    pub transition: Image,
    /// 3-class degradation layer, nodata 0 for unmapped transitions.
    pub degradation: Image,
    /// Water bodies as an unmasked 0/1 layer.
    pub water: Image,
}

/// Aggregate the default product's native classes into the working
/// class set.
pub(crate) fn reclassify_to_ipcc(image: &Image) -> Image {
    let values: Vec<f64> = ESA_TO_IPCC.iter().map(|&v| v as f64).collect();
    image.remap(&ESA_CLASS_CODES, &values)
}

/// One year of the default land cover product, nodata-masked, clamped
/// into the product's availability window.
pub(crate) fn default_snapshot<C: DataCatalog>(catalog: &C, year: i32) -> DegradResult<Image> {
    let clamped = year.clamp(LAND_COVER_FIRST_YEAR, LAND_COVER_MAX_YEAR);
    if clamped != year {
        log::debug!("land cover year {} clamped to {}", year, clamped);
    }
    let stack = catalog.annual_stack(LAND_COVER_ASSET, clamped, clamped)?;
    let (_, image) = stack
        .into_iter()
        .next()
        .ok_or_else(|| DegradError::AssetNotFound(LAND_COVER_ASSET.to_string()))?;
    Ok(image.update_mask(image.neq(9999.0)))
}

/// Compute the land cover sub-indicator. Custom rasters, when
/// configured, are taken as already classified in the transition
/// matrix's codes; consistency is the validation layer's concern.
pub fn land_cover<C: DataCatalog>(cfg: &RunConfig, catalog: &C) -> DegradResult<LandCoverMaps> {
    let period = cfg.land_cover_period();
    log::info!("Computing land cover transitions for {}-{}", period.start, period.end);

    let (start, end) = match &cfg.custom_land_cover {
        Some(custom) => (
            catalog.raster_band(&custom.start_asset, &custom.start_band)?,
            catalog.raster_band(&custom.end_asset, &custom.end_band)?,
        ),
        None => (
            reclassify_to_ipcc(&default_snapshot(catalog, period.start)?),
            reclassify_to_ipcc(&default_snapshot(catalog, period.end)?),
        ),
    };

    let water = resolve_water_mask(cfg, catalog, &end, period.end)?;

    let transition = start.multiply(TRANSITION_MULTIPLIER as f64).add(&end);

    // matrix cells first ({-1, 0, +1}), then the byte convention;
    // transitions outside the matrix fall through to nodata 0
    let codes = cfg.transition_matrix.transition_codes(TRANSITION_MULTIPLIER);
    let cells = cfg.transition_matrix.degradation_values();
    let degradation = transition
        .remap(&codes, &cells)
        .remap(&[-1, 0, 1], &[1.0, 2.0, 3.0])
        .unmask(0.0);

    Ok(LandCoverMaps { start, end, transition, degradation, water })
}

fn resolve_water_mask<C: DataCatalog>(
    cfg: &RunConfig,
    catalog: &C,
    end_classes: &Image,
    end_year: i32,
) -> DegradResult<Image> {
    let water = match &cfg.water_mask {
        WaterMaskPolicy::CustomClassValue { value } => end_classes.eq(*value as f64),
        WaterMaskPolicy::DefaultProductWater => {
            default_snapshot(catalog, end_year)?.eq(ESA_WATER_CODE as f64)
        }
        WaterMaskPolicy::Asset { asset, band } => catalog.raster_band(asset, band)?.neq(0.0),
        WaterMaskPolicy::JrcSeasonality { months } => catalog
            .raster_band(JRC_WATER_ASSET, "seasonality")?
            .gte(*months as f64),
    };
    // 0/1 everywhere so the final indicator mask never inherits holes
    Ok(water.unmask(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransitionMatrix;
    use crate::engine::{Evaluator, Grid};
    use ndarray::array;

    #[test]
    fn test_transition_matrix_round_trip() {
        // every (start, end) pair encodes and decodes to its own cell
        let matrix = TransitionMatrix::default_ipcc();
        let codes = matrix.transition_codes(TRANSITION_MULTIPLIER);
        let cells = matrix.degradation_values();

        let eval = Evaluator::new((1, 1));
        for &start in matrix.classes() {
            for &end in matrix.classes() {
                let code = start * TRANSITION_MULTIPLIER + end;
                let image = Image::constant(code as f64).remap(&codes, &cells);
                let value = eval.materialize(&image).unwrap().get(0, 0);
                assert_eq!(
                    value,
                    Some(matrix.get(start, end).unwrap() as f64),
                    "transition {}",
                    code
                );
            }
        }

        // unmapped codes yield nodata, never a default class
        let image = Image::constant(9901.0).remap(&codes, &cells);
        assert_eq!(eval.materialize(&image).unwrap().get(0, 0), None);
    }

    #[test]
    fn test_degradation_classes_from_classified_rasters() {
        // forest->forest stable, forest->cropland degraded,
        // bare->grassland improved, unmapped class 9 nodata
        let start = Image::from_grid(Grid::from_values(array![[1.0, 1.0, 6.0, 9.0]]));
        let end = Image::from_grid(Grid::from_values(array![[1.0, 3.0, 2.0, 9.0]]));

        let matrix = TransitionMatrix::default_ipcc();
        let transition = start.multiply(100.0).add(&end);
        let degradation = transition
            .remap(&matrix.transition_codes(100), &matrix.degradation_values())
            .remap(&[-1, 0, 1], &[1.0, 2.0, 3.0])
            .unmask(0.0);

        let eval = Evaluator::new((1, 4));
        let grid = eval.materialize(&degradation).unwrap();
        assert_eq!(grid.get(0, 0), Some(2.0));
        assert_eq!(grid.get(0, 1), Some(1.0));
        assert_eq!(grid.get(0, 2), Some(3.0));
        assert_eq!(grid.get(0, 3), Some(0.0));
    }

    #[test]
    fn test_reclassify_to_ipcc() {
        let esa = Image::from_grid(Grid::from_values(array![[50.0, 10.0, 210.0, 130.0]]));
        let eval = Evaluator::new((1, 4));
        let grid = eval.materialize(&reclassify_to_ipcc(&esa)).unwrap();
        assert_eq!(grid.get(0, 0), Some(1.0)); // tree cover -> forest
        assert_eq!(grid.get(0, 1), Some(3.0)); // rainfed cropland -> cropland
        assert_eq!(grid.get(0, 2), Some(7.0)); // water
        assert_eq!(grid.get(0, 3), Some(2.0)); // grassland
    }
}
