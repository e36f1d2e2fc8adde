//! Final indicator 15.3.1: the fixed combination of the three
//! sub-indicators, and the pipeline driver that produces every output
//! of a run.

use crate::config::RunConfig;
use crate::engine::{Aoi, Evaluator, Image};
use crate::io::DataCatalog;
use crate::params::tables::{Signal, INDICATOR_TABLE};
use crate::types::DegradResult;

use super::integration::{integrate_climate, integrate_vi};
use super::land_cover::{land_cover, LandCoverMaps};
use super::productivity::{productivity, ProductivityMaps};
use super::soc::soil_organic_carbon;

/// Every raster of a completed run. Returned as one value; the input
/// configuration is never written to.
#[derive(Debug, Clone)]
pub struct IndicatorMaps {
    pub land_cover: LandCoverMaps,
    pub soc: Image,
    pub productivity: ProductivityMaps,
    pub indicator_15_3_1: Image,
}

fn signal_test(image: &Image, signal: Signal) -> Image {
    match signal {
        Signal::Class(class) => image.eq(class as f64),
        Signal::Missing => image.lt(1.0),
    }
}

/// Combine the three 3-class layers through the decision table and
/// exclude water bodies from the assessment.
pub fn indicator_15_3_1(productivity: &Image, land_cover: &LandCoverMaps, soc: &Image) -> Image {
    let degradation = &land_cover.degradation;

    let mut out = Image::constant(0.0);
    for ((p, l, s), class) in &INDICATOR_TABLE {
        let test = signal_test(productivity, *p)
            .and(signal_test(degradation, *l))
            .and(signal_test(soc, *s));
        out = out.where_(test, *class as f64);
    }

    out.update_mask(land_cover.water.not())
}

/// Run the full pipeline: integration, the three sub-indicators and
/// the final combination. Configuration errors surface before any
/// engine call; a failure in any stage fails the whole run.
pub fn compute_indicator_maps<C: DataCatalog>(
    cfg: &RunConfig,
    aoi: &Aoi,
    catalog: &C,
    evaluator: &Evaluator,
) -> DegradResult<IndicatorMaps> {
    cfg.validate()?;
    log::info!("Starting indicator run {} over {}", cfg.run_label(), aoi.name());

    let vi = integrate_vi(cfg, catalog)?;
    let clim = integrate_climate(cfg, catalog)?;

    let productivity = productivity(cfg, aoi, catalog, evaluator, &vi, &clim)?;
    let land_cover = land_cover(cfg, catalog)?;
    let soc = soil_organic_carbon(cfg, catalog)?;

    let indicator_15_3_1 = indicator_15_3_1(&productivity.productivity, &land_cover, &soc);

    log::info!("Indicator run {} complete", cfg.run_label());

    Ok(IndicatorMaps { land_cover, soc, productivity, indicator_15_3_1 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Grid;
    use ndarray::array;

    fn maps_with(degradation: Image, water: Image) -> LandCoverMaps {
        LandCoverMaps {
            start: Image::constant(1.0),
            end: Image::constant(1.0),
            transition: Image::constant(101.0),
            degradation,
            water,
        }
    }

    fn combine(p: f64, l: f64, s: f64) -> Option<f64> {
        let maps = maps_with(Image::constant(l), Image::constant(0.0));
        let out = indicator_15_3_1(&Image::constant(p), &maps, &Image::constant(s));
        let eval = Evaluator::new((1, 1));
        eval.materialize(&out).unwrap().get(0, 0)
    }

    #[test]
    fn test_every_valid_triple_is_mapped() {
        for p in 1..=3 {
            for l in 1..=3 {
                for s in 1..=3 {
                    let out = combine(p as f64, l as f64, s as f64).unwrap();
                    assert!(
                        (1.0..=3.0).contains(&out),
                        "triple ({},{},{}) -> {}",
                        p,
                        l,
                        s,
                        out
                    );
                }
            }
        }
    }

    #[test]
    fn test_any_degraded_signal_degrades() {
        assert_eq!(combine(1.0, 3.0, 3.0), Some(1.0));
        assert_eq!(combine(3.0, 1.0, 3.0), Some(1.0));
        assert_eq!(combine(3.0, 3.0, 1.0), Some(1.0));
    }

    #[test]
    fn test_single_valid_signal_carries_the_decision() {
        assert_eq!(combine(0.0, 0.0, 3.0), Some(3.0));
        assert_eq!(combine(2.0, 0.0, 0.0), Some(2.0));
        assert_eq!(combine(0.0, 1.0, 0.0), Some(1.0));
        // two valid inputs with one missing stay nodata
        assert_eq!(combine(2.0, 3.0, 0.0), Some(0.0));
    }

    #[test]
    fn test_water_pixels_are_nodata() {
        let degradation = Image::from_grid(Grid::from_values(array![[2.0, 2.0]]));
        let water = Image::from_grid(Grid::from_values(array![[0.0, 1.0]]));
        let maps = maps_with(degradation, water);

        let out = indicator_15_3_1(&Image::constant(2.0), &maps, &Image::constant(2.0));
        let eval = Evaluator::new((1, 2));
        let grid = eval.materialize(&out).unwrap();
        assert_eq!(grid.get(0, 0), Some(2.0));
        assert_eq!(grid.get(0, 1), None);
    }
}
