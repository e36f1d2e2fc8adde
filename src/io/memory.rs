//! In-memory catalog used by local runs and the test suite.

use std::collections::{BTreeMap, HashMap};

use crate::engine::Image;
use crate::types::{DegradError, DegradResult};

use super::catalog::{DataCatalog, Scene};

/// Default band name for single-band rasters inserted without an
/// explicit band.
pub const DEFAULT_BAND: &str = "b1";

#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    scenes: HashMap<String, Vec<Scene>>,
    rasters: HashMap<String, HashMap<String, Image>>,
    stacks: HashMap<String, BTreeMap<i32, Image>>,
}

impl MemoryCatalog {
    pub fn new() -> MemoryCatalog {
        MemoryCatalog::default()
    }

    pub fn insert_scene(&mut self, asset: &str, scene: Scene) {
        let scenes = self.scenes.entry(asset.to_string()).or_default();
        scenes.push(scene);
        scenes.sort_by_key(|s| s.time);
    }

    pub fn insert_raster(&mut self, asset: &str, image: Image) {
        self.insert_raster_band(asset, DEFAULT_BAND, image);
    }

    pub fn insert_raster_band(&mut self, asset: &str, band: &str, image: Image) {
        self.rasters
            .entry(asset.to_string())
            .or_default()
            .insert(band.to_string(), image);
    }

    pub fn insert_annual(&mut self, asset: &str, year: i32, image: Image) {
        self.stacks
            .entry(asset.to_string())
            .or_default()
            .insert(year, image);
    }
}

impl DataCatalog for MemoryCatalog {
    fn scenes(&self, asset: &str, start_year: i32, end_year: i32) -> DegradResult<Vec<Scene>> {
        let scenes = self
            .scenes
            .get(asset)
            .ok_or_else(|| DegradError::AssetNotFound(asset.to_string()))?;
        Ok(scenes
            .iter()
            .filter(|s| s.year() >= start_year && s.year() <= end_year)
            .cloned()
            .collect())
    }

    fn raster(&self, asset: &str) -> DegradResult<Image> {
        self.raster_band(asset, DEFAULT_BAND)
    }

    fn raster_band(&self, asset: &str, band: &str) -> DegradResult<Image> {
        let bands = self
            .rasters
            .get(asset)
            .ok_or_else(|| DegradError::AssetNotFound(asset.to_string()))?;
        bands
            .get(band)
            .cloned()
            .ok_or_else(|| DegradError::MissingBand(format!("{}:{}", asset, band)))
    }

    fn annual_stack(
        &self,
        asset: &str,
        start_year: i32,
        end_year: i32,
    ) -> DegradResult<Vec<(i32, Image)>> {
        let stack = self
            .stacks
            .get(asset)
            .ok_or_else(|| DegradError::AssetNotFound(asset.to_string()))?;
        Ok(stack
            .range(start_year..=end_year)
            .map(|(year, image)| (*year, image.clone()))
            .collect())
    }
}
