//! Annual vegetation-index and precipitation integration.
//!
//! Produces one composite per year carrying the chosen index as band
//! `vi`, plus the parallel precipitation collection (band `clim`).
//! Multi-scene optical sensors are aggregated in two stages (monthly
//! means, then the mean of the monthly means) to dampen uneven
//! sampling density within a year; MODIS and pre-derived composites
//! reduce straight to annual means.

use std::collections::BTreeMap;

use crate::config::{RunConfig, VegetationIndex};
use crate::engine::image::SeriesReducer;
use crate::engine::{AnnualCollection, Image};
use crate::io::{DataCatalog, Scene};
use crate::params::sensor::{DERIVED_EVI_ASSET, DERIVED_NDVI_ASSET};
use crate::params::tables::{PRECIPITATION_ASSET, SCENE_CLOUD_COVER_MAX};
use crate::params::{Sensor, SensorFamily};
use crate::types::{DegradError, DegradResult};

/// Build the annual VI collection over the widest period any
/// sub-indicator needs.
pub fn integrate_vi<C: DataCatalog>(
    cfg: &RunConfig,
    catalog: &C,
) -> DegradResult<AnnualCollection> {
    let period = cfg.vi_series_period();
    let family = cfg
        .sensors
        .first()
        .ok_or_else(|| DegradError::UnrecognizedSensor("no sensor selected".into()))?
        .family();

    log::info!(
        "Integrating {} for {}-{} from {} sensor(s)",
        cfg.vegetation_index,
        period.start,
        period.end,
        cfg.sensors.len()
    );

    match family {
        SensorFamily::ModisVi => process_modis(cfg, catalog, period.start, period.end),
        SensorFamily::ModisNpp => process_npp(cfg, catalog, period.start, period.end),
        SensorFamily::LandsatSr | SensorFamily::Sentinel2 => {
            process_optical(cfg, catalog, period.start, period.end)
        }
        SensorFamily::DerivedVi => process_derived(cfg, catalog, period.start, period.end),
        SensorFamily::Precomputed => {
            let asset = cfg.precomputed_vi_asset.as_deref().ok_or_else(|| {
                DegradError::Config("precomputed VI sensor selected without an asset id".into())
            })?;
            let stack = catalog.annual_stack(asset, period.start, period.end)?;
            Ok(stack.into_iter().collect())
        }
    }
}

/// Build the annual precipitation collection for the same window.
pub fn integrate_climate<C: DataCatalog>(
    cfg: &RunConfig,
    catalog: &C,
) -> DegradResult<AnnualCollection> {
    let period = cfg.vi_series_period();
    let scenes = catalog.scenes(PRECIPITATION_ASSET, period.start, period.end)?;

    log::info!(
        "Integrating precipitation for {}-{} ({} scenes)",
        period.start,
        period.end,
        scenes.len()
    );

    let mut by_year: BTreeMap<i32, Vec<Image>> = BTreeMap::new();
    for scene in &scenes {
        by_year
            .entry(scene.year())
            .or_default()
            .push(scene.band("precipitation")?.clone());
    }

    Ok((period.start..=period.end)
        .map(|year| (year, annual_mean(by_year.remove(&year).unwrap_or_default())))
        .collect())
}

fn process_optical<C: DataCatalog>(
    cfg: &RunConfig,
    catalog: &C,
    start: i32,
    end: i32,
) -> DegradResult<AnnualCollection> {
    let mut per_scene: Vec<(i32, u32, Image)> = Vec::new();

    for &sensor in &cfg.sensors {
        let asset = sensor
            .asset()
            .ok_or_else(|| DegradError::UnrecognizedSensor(sensor.to_string()))?;
        let scenes = catalog.scenes(asset, start, end)?;
        log::debug!("{}: {} scenes before cloud filtering", sensor, scenes.len());

        for scene in scenes {
            if scene.cloud_cover.map_or(false, |c| c >= SCENE_CLOUD_COVER_MAX) {
                continue;
            }
            let vi = scene_vi(&scene, sensor, cfg.vegetation_index)?;
            per_scene.push((scene.year(), scene.month(), apply_threshold(vi, cfg.vi_threshold)));
        }
    }

    Ok(two_stage_annual(per_scene, start, end))
}

fn process_modis<C: DataCatalog>(
    cfg: &RunConfig,
    catalog: &C,
    start: i32,
    end: i32,
) -> DegradResult<AnnualCollection> {
    let mut by_year: BTreeMap<i32, Vec<Image>> = BTreeMap::new();

    for &sensor in &cfg.sensors {
        let asset = sensor
            .asset()
            .ok_or_else(|| DegradError::UnrecognizedSensor(sensor.to_string()))?;
        for scene in catalog.scenes(asset, start, end)? {
            let mask = modis_quality_mask(&scene)?;
            let vi = match cfg.vegetation_index {
                VegetationIndex::Ndvi => scene.band("NDVI")?.multiply(0.0001),
                VegetationIndex::Evi => scene.band("EVI")?.multiply(0.0001),
                VegetationIndex::Msvi => {
                    msvi2(scene.band("sur_refl_b01")?, scene.band("sur_refl_b02")?)
                }
            };
            let vi = apply_threshold(vi.update_mask(mask), cfg.vi_threshold);
            by_year.entry(scene.year()).or_default().push(vi);
        }
    }

    Ok((start..=end)
        .map(|year| (year, annual_mean(by_year.remove(&year).unwrap_or_default())))
        .collect())
}

fn process_npp<C: DataCatalog>(
    cfg: &RunConfig,
    catalog: &C,
    start: i32,
    end: i32,
) -> DegradResult<AnnualCollection> {
    let sensor = cfg.sensors[0];
    let asset = sensor
        .asset()
        .ok_or_else(|| DegradError::UnrecognizedSensor(sensor.to_string()))?;
    let scenes = catalog.scenes(asset, start, end)?;

    let mut collection = AnnualCollection::default();
    for year in start..=end {
        let image = match scenes.iter().find(|s| s.year() == year) {
            Some(scene) => scene.band("Npp")?.multiply(0.0001),
            None => Image::fully_masked(),
        };
        collection.push(year, image);
    }
    Ok(collection)
}

fn process_derived<C: DataCatalog>(
    cfg: &RunConfig,
    catalog: &C,
    start: i32,
    end: i32,
) -> DegradResult<AnnualCollection> {
    let asset = match cfg.vegetation_index {
        VegetationIndex::Ndvi => DERIVED_NDVI_ASSET,
        VegetationIndex::Evi => DERIVED_EVI_ASSET,
        VegetationIndex::Msvi => {
            return Err(DegradError::UnsupportedIndex {
                index: cfg.vegetation_index.to_string(),
                sensor: Sensor::LandsatDerivedVi.to_string(),
            })
        }
    };

    let scenes = catalog.scenes(asset, start, end)?;
    let mut by_year: BTreeMap<i32, Vec<Image>> = BTreeMap::new();
    for scene in &scenes {
        let vi = apply_threshold(scene.band("vi")?.clone(), cfg.vi_threshold);
        by_year.entry(scene.year()).or_default().push(vi);
    }

    Ok((start..=end)
        .map(|year| (year, annual_mean(by_year.remove(&year).unwrap_or_default())))
        .collect())
}

/// Cloud-masked, scaled vegetation index of one reflectance scene.
fn scene_vi(scene: &Scene, sensor: Sensor, index: VegetationIndex) -> DegradResult<Image> {
    let bands = sensor
        .band_map()
        .ok_or_else(|| DegradError::UnrecognizedSensor(sensor.to_string()))?;
    let qa = scene.band(bands.qa)?;

    let mask = match sensor.family() {
        SensorFamily::LandsatSr => {
            // cloud bit with high confidence, or the shadow bit
            let cloud = qa
                .bitwise_and(1 << 3)
                .and(qa.bitwise_and(1 << 8))
                .or(qa.bitwise_and(1 << 4));
            cloud.not()
        }
        SensorFamily::Sentinel2 => {
            // bits 10 and 11 are cloud and cirrus
            qa.bitwise_and(1 << 10).eq(0).and(qa.bitwise_and(1 << 11).eq(0))
        }
        _ => unreachable!("scene_vi is only called for reflectance sensors"),
    };

    let scale = |img: &Image| match sensor.family() {
        SensorFamily::LandsatSr => img.multiply(0.0000275).add(-0.2),
        _ => img.multiply(0.0001),
    };

    let red = scale(scene.band(bands.red)?).update_mask(&mask);
    let nir = scale(scene.band(bands.nir)?).update_mask(&mask);

    Ok(match index {
        VegetationIndex::Ndvi => ndvi(&red, &nir),
        VegetationIndex::Evi => evi(&red, &nir),
        VegetationIndex::Msvi => msvi2(&red, &nir),
    })
}

fn modis_quality_mask(scene: &Scene) -> DegradResult<Image> {
    let qa = scene.band("DetailedQA")?;
    let usable = qa.bit_range(0, 1).lte(1.0);
    let no_mixed_cloud = qa.bit_range(10, 10).eq(0);
    let no_snow = qa.bit_range(14, 14).eq(0);
    let no_shadow = qa.bit_range(15, 15).eq(0);
    Ok(usable.and(no_snow).and(no_shadow).and(no_mixed_cloud))
}

pub(crate) fn ndvi(red: &Image, nir: &Image) -> Image {
    nir.subtract(red).divide(nir.add(red))
}

pub(crate) fn evi(red: &Image, nir: &Image) -> Image {
    nir.subtract(red).divide(nir.add(red).add(1.0)).multiply(2.4)
}

pub(crate) fn msvi2(red: &Image, nir: &Image) -> Image {
    let a = nir.multiply(2.0).add(1.0);
    a.subtract(
        a.multiply(&a)
            .subtract(nir.subtract(red).multiply(8.0))
            .sqrt(),
    )
    .divide(2.0)
}

/// Zero pixels at or below the detection threshold.
fn apply_threshold(vi: Image, threshold: Option<f64>) -> Image {
    match threshold {
        Some(t) => vi.multiply(vi.gt(t)),
        None => vi,
    }
}

fn annual_mean(images: Vec<Image>) -> Image {
    if images.is_empty() {
        Image::fully_masked()
    } else {
        Image::series_reduce(images, SeriesReducer::Mean)
    }
}

/// Monthly means first, then the annual mean of the monthly means.
fn two_stage_annual(per_scene: Vec<(i32, u32, Image)>, start: i32, end: i32) -> AnnualCollection {
    let mut by_year_month: BTreeMap<i32, BTreeMap<u32, Vec<Image>>> = BTreeMap::new();
    for (year, month, image) in per_scene {
        by_year_month
            .entry(year)
            .or_default()
            .entry(month)
            .or_default()
            .push(image);
    }

    (start..=end)
        .map(|year| {
            let image = match by_year_month.remove(&year) {
                Some(months) => {
                    let monthly: Vec<Image> =
                        months.into_values().map(annual_mean).collect();
                    annual_mean(monthly)
                }
                None => Image::fully_masked(),
            };
            (year, image)
        })
        .collect()
}
