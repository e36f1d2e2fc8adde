//! Data-access boundary: the pipeline reads every raster through a
//! [`DataCatalog`], keyed by the asset identifiers in
//! [`params::tables`](crate::params::tables). The catalog is expected
//! to deliver data already clipped to the analysis extent.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};

use crate::engine::Image;
use crate::types::{DegradError, DegradResult};

/// One acquisition of a scene-based collection: banded pixel data plus
/// the metadata the integrator filters on.
#[derive(Debug, Clone)]
pub struct Scene {
    pub time: NaiveDate,
    /// Scene-level cloud cover percentage, when the product carries one.
    pub cloud_cover: Option<f64>,
    bands: HashMap<String, Image>,
}

impl Scene {
    pub fn new(time: NaiveDate) -> Scene {
        Scene { time, cloud_cover: None, bands: HashMap::new() }
    }

    pub fn with_cloud_cover(mut self, percent: f64) -> Scene {
        self.cloud_cover = Some(percent);
        self
    }

    pub fn with_band(mut self, name: &str, image: Image) -> Scene {
        self.bands.insert(name.to_string(), image);
        self
    }

    pub fn band(&self, name: &str) -> DegradResult<&Image> {
        self.bands
            .get(name)
            .ok_or_else(|| DegradError::MissingBand(name.to_string()))
    }

    pub fn has_band(&self, name: &str) -> bool {
        self.bands.contains_key(name)
    }

    pub fn year(&self) -> i32 {
        self.time.year()
    }

    pub fn month(&self) -> u32 {
        self.time.month()
    }
}

/// Collaborator interface to the raster archive.
pub trait DataCatalog {
    /// Scenes of a collection asset acquired in `start_year..=end_year`,
    /// in chronological order.
    fn scenes(&self, asset: &str, start_year: i32, end_year: i32) -> DegradResult<Vec<Scene>>;

    /// Single raster asset, default band.
    fn raster(&self, asset: &str) -> DegradResult<Image>;

    /// Single raster asset with explicit band selection.
    fn raster_band(&self, asset: &str, band: &str) -> DegradResult<Image>;

    /// Per-year slices of an annual stack asset for
    /// `start_year..=end_year`, in year order. Years outside the stack
    /// are omitted.
    fn annual_stack(
        &self,
        asset: &str,
        start_year: i32,
        end_year: i32,
    ) -> DegradResult<Vec<(i32, Image)>>;
}
