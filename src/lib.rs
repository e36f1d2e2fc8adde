//! TerraDeg: A fast, modular SDG 15.3.1 land degradation processor
//!
//! This library computes the UN SDG indicator 15.3.1 (proportion of
//! degraded land) over an area of interest by combining three
//! sub-indicators — land cover change, soil organic carbon change and
//! vegetation productivity dynamics — into a single three-class
//! (degraded/stable/improved) raster, plus zonal statistics.
//!
//! Every intermediate is a lazy [`engine::Image`] expression handle;
//! pixel data only materializes inside an [`engine::Evaluator`] at
//! reduction or export time.

pub mod config;
pub mod core;
pub mod engine;
pub mod io;
pub mod params;
pub mod types;

// Re-export main types and functions for easier access
pub use types::{DegradError, DegradResult, DegradationClass};

pub use config::{
    ClassMatchPolicy, ClimateRegime, ClimateRegimePreset, CustomLandCover, LandCoverEcoUnit,
    Period, ProductivityLookup, RunConfig, TrajectoryMethod, TransitionMatrix, VegetationIndex,
    WaterMaskPolicy,
};

pub use engine::{AnnualCollection, Aoi, Evaluator, Grid, Image};

pub use io::{DataCatalog, MemoryCatalog, Scene};

pub use params::{Sensor, SensorFamily};

pub use crate::core::{compute_indicator_maps, IndicatorMaps};
