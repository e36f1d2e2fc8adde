use ndarray::Array2;

use terradeg::core::{productivity_performance, productivity_state, productivity_trajectory};
use terradeg::params::tables::WTE_ASSET;
use terradeg::{
    AnnualCollection, Aoi, DegradError, Evaluator, Grid, Image, MemoryCatalog, Period, RunConfig,
    Sensor, TrajectoryMethod,
};

fn uniform(shape: (usize, usize), value: f64) -> Image {
    Image::from_grid(Grid::from_values(Array2::from_elem(shape, value)))
}

fn annual_series(values: &[(i32, f64)]) -> AnnualCollection {
    values
        .iter()
        .map(|&(year, value)| (year, uniform((1, 1), value)))
        .collect()
}

fn class_at(eval: &Evaluator, image: &Image, row: usize, col: usize) -> Option<f64> {
    eval.materialize(image).unwrap().get(row, col)
}

#[test]
fn test_ndvi_trend_classifies_monotonic_series() {
    let cfg = RunConfig::new(2001, 2010, vec![Sensor::Landsat8]);
    let eval = Evaluator::new((1, 1));

    let rising: AnnualCollection = annual_series(
        &(2001..=2010).map(|y| (y, 0.2 + 0.02 * (y - 2001) as f64)).collect::<Vec<_>>(),
    );
    let falling: AnnualCollection = annual_series(
        &(2001..=2010).map(|y| (y, 0.5 - 0.02 * (y - 2001) as f64)).collect::<Vec<_>>(),
    );
    let clim = annual_series(&(2001..=2010).map(|y| (y, 800.0)).collect::<Vec<_>>());

    let (_, rising_class) = productivity_trajectory(&cfg, &rising, &clim).unwrap();
    let (_, falling_class) = productivity_trajectory(&cfg, &falling, &clim).unwrap();

    assert_eq!(class_at(&eval, &rising_class, 0, 0), Some(3.0));
    assert_eq!(class_at(&eval, &falling_class, 0, 0), Some(1.0));
}

#[test]
fn test_trajectory_honors_custom_trend_period() {
    // rising until 2010, then strongly falling: the restricted trend
    // window only sees the rise
    let mut values: Vec<(i32, f64)> =
        (2001..=2010).map(|y| (y, 0.2 + 0.02 * (y - 2001) as f64)).collect();
    values.extend((2011..=2019).map(|y| (y, 0.6 - 0.05 * (y - 2010) as f64)));
    let vi = annual_series(&values);
    let clim = annual_series(&(2001..=2019).map(|y| (y, 800.0)).collect::<Vec<_>>());

    let mut cfg = RunConfig::new(2001, 2019, vec![Sensor::Landsat8]);
    cfg.trend_period = Some(Period::new(2001, 2010));

    let eval = Evaluator::new((1, 1));
    let (_, class) = productivity_trajectory(&cfg, &vi, &clim).unwrap();
    assert_eq!(class_at(&eval, &class, 0, 0), Some(3.0));
}

#[test]
fn test_rain_use_efficiency_trend() {
    // constant VI under rising rainfall: efficiency declines
    let vi = annual_series(&(2001..=2010).map(|y| (y, 0.4)).collect::<Vec<_>>());
    let clim = annual_series(
        &(2001..=2010).map(|y| (y, 500.0 + 50.0 * (y - 2001) as f64)).collect::<Vec<_>>(),
    );

    let mut cfg = RunConfig::new(2001, 2010, vec![Sensor::Landsat8]);
    cfg.trajectory = TrajectoryMethod::RainUseEfficiencyTrend;

    let eval = Evaluator::new((1, 1));
    let (_, class) = productivity_trajectory(&cfg, &vi, &clim).unwrap();
    assert_eq!(class_at(&eval, &class, 0, 0), Some(1.0));
}

#[test]
fn test_srestrend_fails_with_not_supported() {
    let vi = annual_series(&[(2001, 0.4), (2002, 0.4)]);
    let clim = annual_series(&[(2001, 800.0), (2002, 800.0)]);

    let mut cfg = RunConfig::new(2001, 2010, vec![Sensor::Landsat8]);
    cfg.trajectory = TrajectoryMethod::SRestrend;

    assert!(matches!(
        productivity_trajectory(&cfg, &vi, &clim),
        Err(DegradError::NotSupported(_))
    ));
}

#[test]
fn test_performance_flags_weak_pixels_within_their_unit() {
    let shape = (1, 4);
    let cfg = RunConfig::new(2001, 2005, vec![Sensor::Landsat8]);

    // two ecological units: pixels 0-1 in unit 1, pixels 2-3 in unit 2
    let units = Image::from_grid(Grid::from_values(
        Array2::from_shape_vec(shape, vec![1.0, 1.0, 2.0, 2.0]).unwrap(),
    ));
    let mut catalog = MemoryCatalog::new();
    catalog.insert_raster(WTE_ASSET, units);

    // pixel 1 underperforms its unit; unit 2 is uniformly low but
    // consistent, so it stays unflagged
    let vi_values = Array2::from_shape_vec(shape, vec![1.0, 0.4, 0.2, 0.2]).unwrap();
    let vi: AnnualCollection = (2001..=2005)
        .map(|y| (y, Image::from_grid(Grid::from_values(vi_values.clone()))))
        .collect();

    let eval = Evaluator::new(shape);
    let performance =
        productivity_performance(&cfg, &Aoi::full("unit-test"), &catalog, &vi, &eval).unwrap();

    assert_eq!(class_at(&eval, &performance, 0, 0), Some(2.0));
    assert_eq!(class_at(&eval, &performance, 0, 1), Some(1.0));
    assert_eq!(class_at(&eval, &performance, 0, 2), Some(2.0));
    assert_eq!(class_at(&eval, &performance, 0, 3), Some(2.0));
}

#[test]
fn test_state_detects_recent_collapse() {
    // alternating but stationary baseline, collapsed final three years
    let mut values: Vec<(i32, f64)> = (2001..=2016)
        .map(|y| (y, if y % 2 == 0 { 0.6 } else { 0.4 }))
        .collect();
    values.extend([(2017, 0.1), (2018, 0.1), (2019, 0.1)]);
    let vi = annual_series(&values);

    let cfg = RunConfig::new(2001, 2019, vec![Sensor::Landsat8]);
    let eval = Evaluator::new((1, 1));

    let (_, state) = productivity_state(&cfg, &vi).unwrap();
    assert_eq!(class_at(&eval, &state, 0, 0), Some(1.0));
}

#[test]
fn test_state_stable_when_nothing_changes() {
    let mut values: Vec<(i32, f64)> = (2001..=2016)
        .map(|y| (y, if y % 2 == 0 { 0.6 } else { 0.4 }))
        .collect();
    values.extend([(2017, 0.4), (2018, 0.6), (2019, 0.5)]);
    let vi = annual_series(&values);

    let cfg = RunConfig::new(2001, 2019, vec![Sensor::Landsat8]);
    let eval = Evaluator::new((1, 1));

    let (_, state) = productivity_state(&cfg, &vi).unwrap();
    assert_eq!(class_at(&eval, &state, 0, 0), Some(2.0));
}
