//! Zonal statistics: the area-by-class tables consumed by the export
//! collaborator, in hectares.

use std::path::Path;

use serde::Serialize;

use crate::engine::{Aoi, Evaluator, Image};
use crate::params::tables::{DEGRADATION_CLASS_NAMES, IPCC_CLASS_NAMES};
use crate::types::DegradResult;

use super::land_cover::{LandCoverMaps, TRANSITION_MULTIPLIER};

/// Area of one (start, end) land cover transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionArea {
    pub start_class: String,
    pub end_class: String,
    pub hectares: f64,
}

/// Area of one (indicator class, land cover class) combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorLandCoverArea {
    pub indicator: String,
    pub land_cover: String,
    pub hectares: f64,
}

/// Area of one indicator class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassArea {
    pub class: String,
    pub hectares: f64,
}

fn pixel_area_hectares(scale: f64) -> f64 {
    scale * scale / 10_000.0
}

fn land_cover_name(code: i64) -> String {
    match code {
        1..=7 => IPCC_CLASS_NAMES[(code - 1) as usize].to_string(),
        _ => code.to_string(),
    }
}

fn degradation_name(code: i64) -> String {
    match code {
        0 => "nodata".to_string(),
        1..=3 => DEGRADATION_CLASS_NAMES[(code - 1) as usize].to_string(),
        _ => code.to_string(),
    }
}

/// Hectares per (start, end) transition inside the AOI.
pub fn land_cover_transition_areas(
    evaluator: &Evaluator,
    maps: &LandCoverMaps,
    aoi: &Aoi,
    scale: f64,
) -> DegradResult<Vec<TransitionArea>> {
    let area = pixel_area_hectares(scale);
    let histogram = evaluator.frequency_histogram(&maps.transition, aoi)?;

    Ok(histogram
        .into_iter()
        .map(|(code, count)| TransitionArea {
            start_class: land_cover_name(code / TRANSITION_MULTIPLIER),
            end_class: land_cover_name(code % TRANSITION_MULTIPLIER),
            hectares: count as f64 * area,
        })
        .collect())
}

/// Hectares per (indicator class, end-year land cover class) pair.
pub fn indicator_areas_by_land_cover(
    evaluator: &Evaluator,
    indicator: &Image,
    maps: &LandCoverMaps,
    aoi: &Aoi,
    scale: f64,
) -> DegradResult<Vec<IndicatorLandCoverArea>> {
    let area = pixel_area_hectares(scale);
    let combined = indicator.multiply(100.0).add(&maps.end);
    let histogram = evaluator.frequency_histogram(&combined, aoi)?;

    Ok(histogram
        .into_iter()
        .map(|(code, count)| IndicatorLandCoverArea {
            indicator: degradation_name(code / 100),
            land_cover: land_cover_name(code % 100),
            hectares: count as f64 * area,
        })
        .collect())
}

/// Hectares per indicator class. Water pixels are masked in the
/// indicator and therefore excluded.
pub fn indicator_class_areas(
    evaluator: &Evaluator,
    indicator: &Image,
    aoi: &Aoi,
    scale: f64,
) -> DegradResult<Vec<ClassArea>> {
    let area = pixel_area_hectares(scale);
    let histogram = evaluator.frequency_histogram(indicator, aoi)?;

    Ok(histogram
        .into_iter()
        .map(|(code, count)| ClassArea {
            class: degradation_name(code),
            hectares: count as f64 * area,
        })
        .collect())
}

/// Serialize area rows to CSV for the export collaborator.
pub fn write_area_csv<T: Serialize>(path: &Path, rows: &[T]) -> DegradResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    log::info!("wrote {} statistics rows to {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Grid;
    use ndarray::array;

    #[test]
    fn test_indicator_class_areas_in_hectares() {
        let eval = Evaluator::new((2, 2));
        let indicator = Image::from_grid(Grid::from_values(array![[1.0, 2.0], [2.0, 3.0]]));

        let rows = indicator_class_areas(&eval, &indicator, &Aoi::full("test"), 300.0).unwrap();
        // 300 m pixels are 9 ha each
        assert_eq!(
            rows,
            vec![
                ClassArea { class: "degraded".into(), hectares: 9.0 },
                ClassArea { class: "stable".into(), hectares: 18.0 },
                ClassArea { class: "improved".into(), hectares: 9.0 },
            ]
        );
    }

    #[test]
    fn test_transition_area_decoding() {
        let eval = Evaluator::new((1, 2));
        let maps = LandCoverMaps {
            start: Image::constant(1.0),
            end: Image::constant(3.0),
            transition: Image::from_grid(Grid::from_values(array![[103.0, 103.0]])),
            degradation: Image::constant(1.0),
            water: Image::constant(0.0),
        };

        let rows = land_cover_transition_areas(&eval, &maps, &Aoi::full("test"), 100.0).unwrap();
        assert_eq!(
            rows,
            vec![TransitionArea {
                start_class: "forest".into(),
                end_class: "cropland".into(),
                hectares: 2.0,
            }]
        );
    }
}
