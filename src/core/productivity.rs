//! Productivity sub-indicator: trajectory, performance and state
//! classifications combined through the GPG lookup tables.

use crate::config::{LandCoverEcoUnit, Period, ProductivityLookup, RunConfig, TrajectoryMethod};
use crate::engine::{AnnualCollection, Aoi, Evaluator, Image, LinearFit};
use crate::io::DataCatalog;
use crate::params::tables::{
    z_coefficient, ECO_UNIT_FILL, PERFORMANCE_EPSILON, PERFORMANCE_PERCENTILE,
    PERFORMANCE_RATIO_THRESHOLD, PRODUCTIVITY_TABLE_GPGV1, PRODUCTIVITY_TABLE_GPGV2, Z_STRONG,
    Z_WEAK,
};
use crate::params::tables::{AEZ_ASSET, GAES_ASSET, HRU_ASSET, SOIL_TAXONOMY_ASSET, WTE_ASSET};
use crate::types::{DegradError, DegradResult};

/// All productivity rasters of a run: the intermediate classifications
/// and the combined 3-class layer.
#[derive(Debug, Clone)]
pub struct ProductivityMaps {
    pub trajectory_5_levels: Image,
    pub trajectory: Image,
    pub performance: Image,
    pub state_5_levels: Image,
    pub state: Image,
    pub productivity: Image,
}

/// Trajectory of productivity change over the trend period, classified
/// from the Kendall z-score of the configured trend statistic.
pub fn productivity_trajectory(
    cfg: &RunConfig,
    vi: &AnnualCollection,
    clim: &AnnualCollection,
) -> DegradResult<(Image, Image)> {
    let period = cfg.trend_period();
    log::info!("Computing {} trajectory for {}-{}", cfg.trajectory, period.start, period.end);

    let z_score = match cfg.trajectory {
        TrajectoryMethod::NdviTrend => vi_trend(period, vi),
        TrajectoryMethod::PRestrend => restrend(period, vi, clim),
        TrajectoryMethod::SRestrend => {
            return Err(DegradError::NotSupported(
                "s_restrend trajectory is not implemented".into(),
            ))
        }
        TrajectoryMethod::RainUseEfficiencyTrend => rain_use_efficiency_trend(period, vi, clim),
    };

    Ok(classify_z(&z_score))
}

/// Kendall z of the annual VI series against time.
fn vi_trend(period: Period, vi: &AnnualCollection) -> Image {
    let series = vi.filter_years(period.start, period.end);
    series.kendall_tau().multiply(z_coefficient(period.len_years()))
}

/// Residual trend: the VI trend left over after removing the part a
/// linear precipitation model explains.
fn restrend(period: Period, vi: &AnnualCollection, clim: &AnnualCollection) -> Image {
    let vi_series = vi.filter_years(period.start, period.end);
    let clim_series = clim.filter_years(period.start, period.end);
    let joined = clim_series.inner_join(&vi_series);

    let pairs: Vec<(Image, Image)> = joined
        .iter()
        .map(|(_, clim, vi)| (clim.clone(), vi.clone()))
        .collect();
    let model = LinearFit::fit(&pairs);

    let residuals: AnnualCollection = joined
        .iter()
        .map(|(year, clim, vi)| (*year, vi.subtract(model.predict(clim))))
        .collect();

    residuals.kendall_tau().multiply(z_coefficient(period.len_years()))
}

/// Kendall z of annual rain use efficiency (VI per meter of rainfall).
fn rain_use_efficiency_trend(
    period: Period,
    vi: &AnnualCollection,
    clim: &AnnualCollection,
) -> Image {
    let vi_series = vi.filter_years(period.start, period.end);
    let clim_series = clim.filter_years(period.start, period.end);

    let ratios: AnnualCollection = clim_series
        .inner_join(&vi_series)
        .iter()
        .map(|(year, clim, vi)| (*year, vi.divide(clim.divide(1000.0))))
        .collect();

    ratios.kendall_tau().multiply(z_coefficient(period.len_years()))
}

/// Significance bands of a z-score: the 5-level classification and its
/// 3-class collapse. Pixels with no z value stay at nodata 0.
pub(crate) fn classify_z(z_score: &Image) -> (Image, Image) {
    let five_levels = Image::constant(0.0)
        .where_(z_score.lt(-Z_STRONG), 1.0)
        .where_(z_score.lt(-Z_WEAK).and(z_score.gte(-Z_STRONG)), 2.0)
        .where_(z_score.gte(-Z_WEAK).and(z_score.lte(Z_WEAK)), 3.0)
        .where_(z_score.gt(Z_WEAK).and(z_score.lte(Z_STRONG)), 4.0)
        .where_(z_score.gt(Z_STRONG), 5.0);

    let three_levels = five_levels.remap(&[0, 1, 2, 3, 4, 5], &[0.0, 1.0, 2.0, 2.0, 2.0, 3.0]);

    (five_levels, three_levels)
}

/// Local productivity relative to the 90th percentile of its
/// ecologically similar unit. 2 where the ratio clears the threshold,
/// 1 below it.
pub fn productivity_performance<C: DataCatalog>(
    cfg: &RunConfig,
    aoi: &Aoi,
    catalog: &C,
    vi: &AnnualCollection,
    evaluator: &Evaluator,
) -> DegradResult<Image> {
    let period = cfg.performance_period();
    log::info!("Computing performance for {}-{}", period.start, period.end);

    let eco_unit = resolve_eco_unit(cfg, catalog)?;
    let vi_mean = vi.filter_years(period.start, period.end).mean();

    // keep pixels outside every unit alive under a sentinel unit
    let unit_filled = Image::constant(ECO_UNIT_FILL).where_(&eco_unit, &eco_unit);

    let groups =
        evaluator.grouped_percentile(&vi_mean, &unit_filled, aoi, PERFORMANCE_PERCENTILE)?;
    if groups.is_empty() {
        log::warn!("no ecological units intersect the area of interest");
    }
    let (codes, percentiles): (Vec<i64>, Vec<f64>) = groups.into_iter().unzip();

    let unit_percentile = unit_filled.remap(&codes, &percentiles);
    let unit_percentile = unit_percentile.where_(unit_percentile.eq(0.0), PERFORMANCE_EPSILON);

    let ratio = vi_mean.divide(&unit_percentile);

    Ok(Image::constant(0.0)
        .where_(ratio.gte(PERFORMANCE_RATIO_THRESHOLD), 2.0)
        .where_(ratio.lt(PERFORMANCE_RATIO_THRESHOLD), 1.0))
}

fn resolve_eco_unit<C: DataCatalog>(cfg: &RunConfig, catalog: &C) -> DegradResult<Image> {
    match cfg.lceu {
        LandCoverEcoUnit::Gaes => catalog.raster(GAES_ASSET),
        LandCoverEcoUnit::Aez => catalog.raster(AEZ_ASSET),
        LandCoverEcoUnit::Hru => catalog.raster(HRU_ASSET),
        LandCoverEcoUnit::Wte => catalog.raster(WTE_ASSET),
        LandCoverEcoUnit::Calculate => {
            // soil taxonomy class in the hundreds, start-year working
            // class in the units
            let soil = catalog.raster_band(SOIL_TAXONOMY_ASSET, "b0")?;
            let snapshot = super::land_cover::default_snapshot(catalog, cfg.start)?;
            let reclassified = super::land_cover::reclassify_to_ipcc(&snapshot);
            Ok(soil.multiply(100.0).add(reclassified))
        }
    }
}

/// Level of recent productivity against the pixel's own history:
/// z-score of the last three years against the baseline.
pub fn productivity_state(cfg: &RunConfig, vi: &AnnualCollection) -> DegradResult<(Image, Image)> {
    let period = cfg.state_period();
    if period.end - 3 < period.start {
        return Err(DegradError::Config(format!(
            "state period {}-{} leaves no baseline before the last 3 years",
            period.start, period.end
        )));
    }
    log::info!("Computing state for {}-{}", period.start, period.end);

    let recent = vi.filter_years(period.end - 2, period.end);
    let baseline = vi.filter_years(period.start, period.end - 3);

    let z_score = recent
        .mean()
        .subtract(baseline.mean())
        .divide(baseline.std_dev().divide(3.0_f64.sqrt()));

    Ok(classify_z(&z_score))
}

/// Combine the three classifications through the selected GPG table.
pub fn productivity_final(
    trajectory: &Image,
    state: &Image,
    performance: &Image,
    lookup: ProductivityLookup,
) -> Image {
    let table = match lookup {
        ProductivityLookup::GpgV1 => &PRODUCTIVITY_TABLE_GPGV1,
        ProductivityLookup::GpgV2 => &PRODUCTIVITY_TABLE_GPGV2,
    };

    let mut out = Image::constant(0.0);
    for ((t, s, p), class) in table {
        let test = trajectory
            .eq(*t as f64)
            .and(state.eq(*s as f64))
            .and(performance.eq(*p as f64));
        out = out.where_(test, *class as f64);
    }
    out
}

/// Run the three classifications and their combination.
pub fn productivity<C: DataCatalog>(
    cfg: &RunConfig,
    aoi: &Aoi,
    catalog: &C,
    evaluator: &Evaluator,
    vi: &AnnualCollection,
    clim: &AnnualCollection,
) -> DegradResult<ProductivityMaps> {
    let (trajectory_5_levels, trajectory) = productivity_trajectory(cfg, vi, clim)?;
    let performance = productivity_performance(cfg, aoi, catalog, vi, evaluator)?;
    let (state_5_levels, state) = productivity_state(cfg, vi)?;
    let productivity =
        productivity_final(&trajectory, &state, &performance, cfg.productivity_lookup);

    Ok(ProductivityMaps {
        trajectory_5_levels,
        trajectory,
        performance,
        state_5_levels,
        state,
        productivity,
    })
}
