//! Region-restricted reductions: the materializing entry points that
//! return small aggregate tables instead of rasters.

use std::collections::{BTreeMap, BTreeSet};

use num_traits::{Float, FromPrimitive};

use crate::types::DegradResult;

use super::eval::Evaluator;
use super::image::Image;

/// Area of interest restricting every regional reduction. A `None`
/// mask means the full analysis extent.
#[derive(Debug, Clone)]
pub struct Aoi {
    name: String,
    mask: Option<Image>,
}

impl Aoi {
    /// AOI covering the whole evaluation extent.
    pub fn full(name: &str) -> Aoi {
        Aoi { name: name.to_string(), mask: None }
    }

    /// AOI restricted to pixels where `mask` is valid and nonzero.
    pub fn with_mask(name: &str, mask: Image) -> Aoi {
        Aoi { name: name.to_string(), mask: Some(mask) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mask(&self) -> Option<&Image> {
        self.mask.as_ref()
    }
}

/// Percentile by linear interpolation between order statistics.
/// `sorted` must be ascending and non-empty.
fn percentile<T: Float + FromPrimitive>(sorted: &[T], pct: T) -> T {
    let last = sorted.len() - 1;
    let hundred = T::from_f64(100.0).unwrap();
    let rank = pct / hundred * T::from_usize(last).unwrap();
    let lo = rank.floor().to_usize().unwrap_or(0).min(last);
    let hi = rank.ceil().to_usize().unwrap_or(last).min(last);
    if lo == hi {
        sorted[lo]
    } else {
        let weight = rank - rank.floor();
        sorted[lo] * (T::one() - weight) + sorted[hi] * weight
    }
}

impl Evaluator {
    fn region_values(&self, image: &Image, aoi: &Aoi) -> DegradResult<Vec<f64>> {
        let grid = self.materialize(image)?;
        let aoi_mask = aoi.mask().map(|m| self.materialize(m)).transpose()?;

        let (rows, cols) = grid.shape();
        let mut out = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                if let Some(mask) = &aoi_mask {
                    if mask.get(r, c).map_or(true, |v| v == 0.0) {
                        continue;
                    }
                }
                if let Some(v) = grid.get(r, c) {
                    out.push(v);
                }
            }
        }
        Ok(out)
    }

    /// Sum of valid pixels inside the AOI.
    pub fn reduce_region_sum(&self, image: &Image, aoi: &Aoi) -> DegradResult<f64> {
        Ok(self.region_values(image, aoi)?.iter().sum())
    }

    /// Mean of valid pixels inside the AOI; `None` when every pixel is
    /// masked.
    pub fn reduce_region_mean(&self, image: &Image, aoi: &Aoi) -> DegradResult<Option<f64>> {
        let values = self.region_values(image, aoi)?;
        if values.is_empty() {
            Ok(None)
        } else {
            Ok(Some(values.iter().sum::<f64>() / values.len() as f64))
        }
    }

    /// Count of valid pixels per rounded pixel value inside the AOI.
    pub fn frequency_histogram(
        &self,
        image: &Image,
        aoi: &Aoi,
    ) -> DegradResult<BTreeMap<i64, u64>> {
        let mut histogram = BTreeMap::new();
        for v in self.region_values(image, aoi)? {
            *histogram.entry(v.round() as i64).or_insert(0) += 1;
        }
        Ok(histogram)
    }

    /// Distinct rounded pixel values inside the AOI.
    pub fn class_codes(&self, image: &Image, aoi: &Aoi) -> DegradResult<BTreeSet<i64>> {
        Ok(self.frequency_histogram(image, aoi)?.into_keys().collect())
    }

    /// Grouped percentile reduction: percentile of `value` per rounded
    /// `group` code, restricted to the AOI. Pixels where either band is
    /// invalid are skipped.
    pub fn grouped_percentile(
        &self,
        value: &Image,
        group: &Image,
        aoi: &Aoi,
        pct: f64,
    ) -> DegradResult<Vec<(i64, f64)>> {
        let value_grid = self.materialize(value)?;
        let group_grid = self.materialize(group)?;
        let aoi_mask = aoi.mask().map(|m| self.materialize(m)).transpose()?;

        let (rows, cols) = value_grid.shape();
        let mut groups: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
        for r in 0..rows {
            for c in 0..cols {
                if let Some(mask) = &aoi_mask {
                    if mask.get(r, c).map_or(true, |v| v == 0.0) {
                        continue;
                    }
                }
                if let (Some(v), Some(g)) = (value_grid.get(r, c), group_grid.get(r, c)) {
                    groups.entry(g.round() as i64).or_default().push(v);
                }
            }
        }

        log::debug!("grouped percentile over {} units in {}", groups.len(), aoi.name());

        Ok(groups
            .into_iter()
            .map(|(code, mut values)| {
                values.sort_by(|a, b| a.total_cmp(b));
                (code, percentile(&values, pct))
            })
            .collect())
    }
}
