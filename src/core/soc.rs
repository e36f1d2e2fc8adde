//! Soil organic carbon sub-indicator: IPCC Tier-1 stock propagation
//! driven by annual land cover transitions.

use crate::config::{ClimateRegime, RunConfig};
use crate::engine::Image;
use crate::io::DataCatalog;
use crate::params::tables::{
    CLIMATE_COEF_RECIPROCAL_SENTINEL, CLIMATE_COEF_SENTINEL, CLIMATE_ZONE_CODES,
    CLIMATE_ZONE_COEFFICIENTS, INT16_MIN, IPCC_CLIMATE_ZONES_ASSET, LAND_COVER_ASSET,
    LAND_COVER_FIRST_YEAR, LAND_COVER_MAX_YEAR, SOC_ASSET, SOC_CHANGE_THRESHOLD_PERCENT,
    SOC_CLIMATE_FACTOR, SOC_EQUILIBRIUM_YEARS, SOC_INPUT_FACTOR, SOC_MANAGEMENT_FACTOR,
    SOC_TRANSITION_CODES,
};
use crate::types::{DegradError, DegradResult};

use super::land_cover::reclassify_to_ipcc;

/// Multiplier packing a (start, end) class pair into a SOC transition
/// code: one digit per side, the working classes being 1..7.
pub const SOC_TRANSITION_MULTIPLIER: f64 = 10.0;

/// Combined stock-change factor for the current transition raster. The
/// climate table's sentinels are substituted by the conversion
/// coefficient or its reciprocal.
fn stock_change_factor(transition: &Image, climate_coef: &Image) -> Image {
    let climate_raw = transition.remap(&SOC_TRANSITION_CODES, &SOC_CLIMATE_FACTOR);
    let climate = climate_raw
        .where_(climate_raw.eq(CLIMATE_COEF_SENTINEL), climate_coef)
        .where_(
            climate_raw.eq(CLIMATE_COEF_RECIPROCAL_SENTINEL),
            Image::constant(1.0).divide(climate_coef),
        );
    let management = transition.remap(&SOC_TRANSITION_CODES, &SOC_MANAGEMENT_FACTOR);
    let input = transition.remap(&SOC_TRANSITION_CODES, &SOC_INPUT_FACTOR);
    climate.multiply(management).multiply(input)
}

/// Annual carbon loss (or gain) towards the new equilibrium, linear
/// over the 20-year horizon.
fn carbon_change(soc: &Image, factor: &Image) -> Image {
    soc.subtract(soc.multiply(factor)).divide(SOC_EQUILIBRIUM_YEARS)
}

fn climate_coefficient<C: DataCatalog>(cfg: &RunConfig, catalog: &C) -> DegradResult<Image> {
    match cfg.climate_regime {
        ClimateRegime::PerPixel => {
            let zones = catalog.raster(IPCC_CLIMATE_ZONES_ASSET)?;
            Ok(zones.remap(&CLIMATE_ZONE_CODES, &CLIMATE_ZONE_COEFFICIENTS))
        }
        ClimateRegime::Preset(preset) => Ok(Image::constant(preset.coefficient())),
        ClimateRegime::Custom(coef) => Ok(Image::constant(coef)),
    }
}

/// Percent-change classification: beyond +10 % improved, beyond -10 %
/// degraded, the closed band in between stable.
pub(crate) fn classify_soc_change(percent_change: &Image) -> Image {
    Image::constant(0.0)
        .where_(percent_change.gt(SOC_CHANGE_THRESHOLD_PERCENT), 3.0)
        .where_(
            percent_change
                .gte(-SOC_CHANGE_THRESHOLD_PERCENT)
                .and(percent_change.lte(SOC_CHANGE_THRESHOLD_PERCENT)),
            2.0,
        )
        .where_(percent_change.lt(-SOC_CHANGE_THRESHOLD_PERCENT), 1.0)
}

/// Compute the SOC sub-indicator over the configured period, clamped
/// to the land cover product's availability.
pub fn soil_organic_carbon<C: DataCatalog>(
    cfg: &RunConfig,
    catalog: &C,
) -> DegradResult<Image> {
    let period = cfg
        .soc_period()
        .clamp(LAND_COVER_FIRST_YEAR, LAND_COVER_MAX_YEAR);
    if period.start >= period.end {
        return Err(DegradError::Config(format!(
            "soc period collapses to {}-{} inside the land cover window",
            period.start, period.end
        )));
    }
    log::info!(
        "Propagating soil organic carbon over {}-{} ({} annual steps)",
        period.start,
        period.end,
        period.len_years() - 1
    );

    let baseline = catalog.raster(SOC_ASSET)?;
    let baseline = baseline.update_mask(baseline.neq(INT16_MIN as f64));

    let stack = catalog.annual_stack(LAND_COVER_ASSET, period.start, period.end)?;
    if stack.len() != period.len_years() {
        return Err(DegradError::Engine(format!(
            "land cover stack covers {} of {} requested years",
            stack.len(),
            period.len_years()
        )));
    }
    let classes: Vec<Image> = stack
        .iter()
        .map(|(_, image)| reclassify_to_ipcc(&image.update_mask(image.neq(9999.0))))
        .collect();

    let climate_coef = climate_coefficient(cfg, catalog)?;
    let stocks = propagate_stocks(&classes, &baseline, &climate_coef);

    let first = &stocks[0];
    let last = &stocks[stocks.len() - 1];
    let percent_change = last.subtract(first).divide(first).multiply(100.0);

    Ok(classify_soc_change(&percent_change))
}

/// Year-by-year stock propagation: one stock image per land cover
/// year, the first being the baseline itself. `classes` must hold at
/// least two years.
pub(crate) fn propagate_stocks(
    classes: &[Image],
    baseline: &Image,
    climate_coef: &Image,
) -> Vec<Image> {
    // first annual step
    let (lc_start, lc_next) = (&classes[0], &classes[1]);
    let mut transition = lc_start.multiply(SOC_TRANSITION_MULTIPLIER).add(lc_next);
    let mut transition_time = Image::constant(2.0).where_(lc_start.neq(lc_next), 1.0);
    let mut change = carbon_change(baseline, &stock_change_factor(&transition, climate_coef));
    let mut stocks = vec![baseline.clone(), baseline.subtract(&change)];

    // remaining steps: factors are refreshed only where a transition
    // occurred this year, and frozen once a pixel has been stable past
    // the equilibrium horizon
    for index in 1..classes.len() - 1 {
        let (lc_t0, lc_t1) = (&classes[index], &classes[index + 1]);
        let changed = lc_t0.neq(lc_t1);

        transition_time = transition_time
            .where_(lc_t0.eq(lc_t1), transition_time.add(1.0))
            .where_(&changed, 1.0);
        transition =
            transition.where_(&changed, lc_t0.multiply(SOC_TRANSITION_MULTIPLIER).add(lc_t1));

        let factor = stock_change_factor(&transition, climate_coef);
        let current = &stocks[index];
        change = change
            .where_(&changed, carbon_change(current, &factor))
            .where_(transition_time.gt(SOC_EQUILIBRIUM_YEARS), 0.0);

        let next = current.subtract(&change);
        stocks.push(next);
    }

    stocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Evaluator, Grid};
    use ndarray::array;

    #[test]
    fn test_stock_change_factor_sentinels() {
        let eval = Evaluator::new((1, 3));
        // forest->cropland carries the coefficient, cropland->forest its
        // reciprocal, persistence stays at 1
        let transition = Image::from_grid(Grid::from_values(array![[13.0, 31.0, 11.0]]));
        let coef = Image::constant(0.69);
        let factor = stock_change_factor(&transition, &coef);

        let grid = eval.materialize(&factor).unwrap();
        approx::assert_relative_eq!(grid.get(0, 0).unwrap(), 0.69, max_relative = 1e-12);
        approx::assert_relative_eq!(grid.get(0, 1).unwrap(), 1.0 / 0.69, max_relative = 1e-12);
        approx::assert_relative_eq!(grid.get(0, 2).unwrap(), 1.0, max_relative = 1e-12);
    }

    #[test]
    fn test_classify_soc_change_boundaries() {
        let eval = Evaluator::new((1, 5));
        let percent = Image::from_grid(Grid::from_values(array![[
            -20.0, -10.0, 0.0, 10.0, 20.0
        ]]));
        let grid = eval.materialize(&classify_soc_change(&percent)).unwrap();
        assert_eq!(grid.get(0, 0), Some(1.0));
        // exactly ±10 is stable
        assert_eq!(grid.get(0, 1), Some(2.0));
        assert_eq!(grid.get(0, 2), Some(2.0));
        assert_eq!(grid.get(0, 3), Some(2.0));
        assert_eq!(grid.get(0, 4), Some(3.0));
    }

    #[test]
    fn test_carbon_change_is_twentieth_of_gap() {
        let eval = Evaluator::new((1, 1));
        let soc = Image::constant(50.0);
        let factor = Image::constant(0.5);
        let grid = eval.materialize(&carbon_change(&soc, &factor)).unwrap();
        // (50 - 25) / 20
        approx::assert_relative_eq!(grid.get(0, 0).unwrap(), 1.25, max_relative = 1e-12);
    }

    #[test]
    fn test_propagation_idempotent_without_transitions() {
        // 28 years of unchanged forest: every stock equals the baseline
        let classes: Vec<Image> = (0..28).map(|_| Image::constant(1.0)).collect();
        let baseline = Image::constant(50.0);
        let stocks = propagate_stocks(&classes, &baseline, &Image::constant(0.69));

        let eval = Evaluator::new((1, 1));
        assert_eq!(stocks.len(), 28);
        for stock in &stocks {
            assert_eq!(eval.materialize(stock).unwrap().get(0, 0), Some(50.0));
        }
    }

    #[test]
    fn test_equilibrium_freeze_after_twenty_years() {
        // one forest->cropland transition, then 26 stable years. With a
        // coefficient of 0.5 the annual loss is (50 - 25)/20 = 1.25;
        // the freeze caps the total at exactly 20 applications.
        let mut classes = vec![Image::constant(1.0)];
        classes.extend((0..27).map(|_| Image::constant(3.0)));
        let baseline = Image::constant(50.0);
        let stocks = propagate_stocks(&classes, &baseline, &Image::constant(0.5));

        let eval = Evaluator::new((1, 1));
        let last = eval.materialize(stocks.last().unwrap()).unwrap();
        assert_eq!(last.get(0, 0), Some(25.0));
        // the stock had already reached equilibrium a few years earlier
        let frozen = eval.materialize(&stocks[21]).unwrap();
        assert_eq!(frozen.get(0, 0), Some(25.0));
    }
}
