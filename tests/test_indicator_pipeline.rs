use chrono::NaiveDate;
use ndarray::Array2;

use terradeg::core::{indicator_class_areas, land_cover};
use terradeg::params::tables::{
    JRC_WATER_ASSET, LAND_COVER_ASSET, PRECIPITATION_ASSET, SOC_ASSET, WTE_ASSET,
};
use terradeg::{
    compute_indicator_maps, Aoi, ClimateRegime, CustomLandCover, ClassMatchPolicy, DegradError,
    Evaluator, Grid, Image, MemoryCatalog, RunConfig, Sensor, TransitionMatrix,
};

const SHAPE: (usize, usize) = (4, 4);

fn uniform(value: f64) -> Image {
    Image::from_grid(Grid::from_values(Array2::from_elem(SHAPE, value)))
}

fn grid_with(base: f64, overrides: &[((usize, usize), f64)]) -> Image {
    let mut values = Array2::from_elem(SHAPE, base);
    for &(index, value) in overrides {
        values[index] = value;
    }
    Image::from_grid(Grid::from_values(values))
}

/// A small synthetic world: rising NDVI everywhere, water at (0,0),
/// a forest-to-cropland conversion at (1,1) starting in 2010.
fn pipeline_catalog() -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new();

    // landsat 8 surface reflectance, two scenes per year, NIR rising
    for year in 2001..=2019 {
        for month in [6u32, 7] {
            let nir = 20000.0 + 100.0 * (year - 2001) as f64;
            let scene =
                terradeg::Scene::new(NaiveDate::from_ymd_opt(year, month, 15).unwrap())
                    .with_cloud_cover(5.0)
                    .with_band("SR_B2", uniform(4000.0))
                    .with_band("SR_B4", uniform(8000.0))
                    .with_band("SR_B5", uniform(nir))
                    .with_band("QA_PIXEL", uniform(0.0));
            catalog.insert_scene("LANDSAT/LC08/C02/T1_L2", scene);
        }
    }

    // annual precipitation
    for year in 2001..=2019 {
        let scene = terradeg::Scene::new(NaiveDate::from_ymd_opt(year, 6, 1).unwrap())
            .with_band("precipitation", uniform(900.0));
        catalog.insert_scene(PRECIPITATION_ASSET, scene);
    }

    // ESA land cover: forest everywhere, water at (0,0), cropland at
    // (1,1) from 2010 onward
    for year in 2001..=2019 {
        let cropland = if year >= 2010 { 10.0 } else { 50.0 };
        let lc = grid_with(50.0, &[((0, 0), 210.0), ((1, 1), cropland)]);
        catalog.insert_annual(LAND_COVER_ASSET, year, lc);
    }

    // ecological units, soil carbon stock, JRC water seasonality
    catalog.insert_raster(WTE_ASSET, uniform(1.0));
    catalog.insert_raster(SOC_ASSET, uniform(50.0));
    catalog.insert_raster_band(
        JRC_WATER_ASSET,
        "seasonality",
        grid_with(0.0, &[((0, 0), 12.0)]),
    );

    catalog
}

fn pipeline_config() -> RunConfig {
    let mut cfg = RunConfig::new(2001, 2019, vec![Sensor::Landsat8]);
    cfg.climate_regime = ClimateRegime::Custom(0.69);
    cfg
}

#[test]
fn test_full_landsat_run_populates_every_output() -> anyhow::Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let catalog = pipeline_catalog();
    let cfg = pipeline_config();
    let aoi = Aoi::full("synthetic");
    let eval = Evaluator::new(SHAPE);

    let maps = compute_indicator_maps(&cfg, &aoi, &catalog, &eval)?;

    // every output materializes over the same extent
    for image in [
        &maps.land_cover.degradation,
        &maps.soc,
        &maps.productivity.productivity,
        &maps.indicator_15_3_1,
    ] {
        assert_eq!(eval.materialize(image).unwrap().shape(), SHAPE);
    }

    let indicator = eval.materialize(&maps.indicator_15_3_1)?;

    // water is excluded from the assessment
    assert_eq!(indicator.get(0, 0), None);
    // the converted pixel is degraded through land cover and carbon
    assert_eq!(indicator.get(1, 1), Some(1.0));
    // rising productivity on stable forest with stable carbon improves
    assert_eq!(indicator.get(2, 2), Some(3.0));

    // intermediate productivity layers agree with the final class
    let productivity = eval.materialize(&maps.productivity.productivity)?;
    assert_eq!(productivity.get(2, 2), Some(3.0));
    let trajectory = eval.materialize(&maps.productivity.trajectory)?;
    assert_eq!(trajectory.get(2, 2), Some(3.0));

    Ok(())
}

#[test]
fn test_indicator_area_report_excludes_water() {
    let catalog = pipeline_catalog();
    let cfg = pipeline_config();
    let aoi = Aoi::full("synthetic");
    let eval = Evaluator::new(SHAPE);

    let maps = compute_indicator_maps(&cfg, &aoi, &catalog, &eval).unwrap();
    let rows =
        indicator_class_areas(&eval, &maps.indicator_15_3_1, &aoi, cfg.export_scale()).unwrap();

    // 16 pixels minus the water pixel, 0.09 ha per 30 m pixel
    let total: f64 = rows.iter().map(|row| row.hectares).sum();
    approx::assert_relative_eq!(total, 15.0 * 0.09, max_relative = 1e-9);
    assert!(rows.iter().any(|row| row.class == "degraded"));

    // the export contract serializes to CSV
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(format!("{}_indicator_15_3_1.csv", cfg.run_label()));
    terradeg::core::write_area_csv(&path, &rows).unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("degraded"));
}

#[test]
fn test_wrong_year_order_fails_before_any_engine_work() {
    // the catalog is empty: the configuration check must fire first
    let catalog = MemoryCatalog::new();
    let cfg = RunConfig::new(2019, 2001, vec![Sensor::Landsat8]);
    let eval = Evaluator::new(SHAPE);

    let result = compute_indicator_maps(&cfg, &Aoi::full("empty"), &catalog, &eval);
    assert!(matches!(result, Err(DegradError::WrongYearOrder { start: 2019, end: 2001 })));
}

#[test]
fn test_all_stable_custom_matrix_forces_stable_land_cover() {
    let mut catalog = MemoryCatalog::new();
    // arbitrary custom classes with plenty of transitions
    catalog.insert_raster_band(
        "users/test/lc_2001",
        "class",
        grid_with(1.0, &[((0, 1), 2.0), ((1, 0), 3.0), ((2, 3), 2.0)]),
    );
    catalog.insert_raster_band(
        "users/test/lc_2019",
        "class",
        grid_with(3.0, &[((0, 1), 1.0), ((3, 3), 2.0)]),
    );
    catalog.insert_raster_band(JRC_WATER_ASSET, "seasonality", uniform(0.0));

    let mut cfg = pipeline_config();
    cfg.transition_matrix = TransitionMatrix::all_stable(vec![1, 2, 3]).unwrap();
    cfg.custom_land_cover = Some(CustomLandCover {
        start_asset: "users/test/lc_2001".into(),
        start_band: "class".into(),
        end_asset: "users/test/lc_2019".into(),
        end_band: "class".into(),
        match_policy: ClassMatchPolicy::Subset,
    });

    let maps = land_cover(&cfg, &catalog).unwrap();
    let eval = Evaluator::new(SHAPE);
    let degradation = eval.materialize(&maps.degradation).unwrap();

    for row in 0..SHAPE.0 {
        for col in 0..SHAPE.1 {
            assert_eq!(degradation.get(row, col), Some(2.0), "pixel ({}, {})", row, col);
        }
    }
}
