//! Sensor registry: every supported earth-observation source with its
//! collection asset, native resolution and band layout.

use serde::{Deserialize, Serialize};

use crate::config::VegetationIndex;

/// Canonical band names the integrator renames every optical scene to.
#[derive(Debug, Clone, Copy)]
pub struct BandMap {
    pub blue: &'static str,
    pub red: &'static str,
    pub nir: &'static str,
    pub qa: &'static str,
}

/// Processing family a sensor belongs to. Sensors of the same family
/// can be merged into one collection; families cannot be mixed in a
/// single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorFamily {
    /// Landsat collection-2 surface reflectance.
    LandsatSr,
    /// Sentinel-2 level-2 reflectance.
    Sentinel2,
    /// MODIS 16-day vegetation index products.
    ModisVi,
    /// MODIS annual net primary productivity.
    ModisNpp,
    /// Pre-derived annual Landsat VI composites.
    DerivedVi,
    /// User-supplied, already-integrated annual VI collection.
    Precomputed,
}

/// Supported sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sensor {
    Landsat4,
    Landsat5,
    Landsat7,
    Landsat8,
    Landsat9,
    Sentinel2,
    ModisMod13q1,
    ModisMyd13q1,
    ModisNpp,
    LandsatDerivedVi,
    /// Annual VI collection supplied as a catalog asset; the asset id
    /// lives on the run configuration.
    PrecomputedVi,
}

/// Asset ids of the pre-derived annual Landsat composites, one per
/// supported index.
pub const DERIVED_NDVI_ASSET: &str = "LANDSAT/COMPOSITES/C02/T1_L2_ANNUAL_NDVI";
pub const DERIVED_EVI_ASSET: &str = "LANDSAT/COMPOSITES/C02/T1_L2_ANNUAL_EVI";

impl Sensor {
    /// Collection asset id on the data catalog. `None` for the
    /// precomputed path, whose asset comes from the configuration.
    pub fn asset(&self) -> Option<&'static str> {
        match self {
            Sensor::Landsat4 => Some("LANDSAT/LT04/C02/T1_L2"),
            Sensor::Landsat5 => Some("LANDSAT/LT05/C02/T1_L2"),
            Sensor::Landsat7 => Some("LANDSAT/LE07/C02/T1_L2"),
            Sensor::Landsat8 => Some("LANDSAT/LC08/C02/T1_L2"),
            Sensor::Landsat9 => Some("LANDSAT/LC09/C02/T1_L2"),
            Sensor::Sentinel2 => Some("COPERNICUS/S2"),
            Sensor::ModisMod13q1 => Some("MODIS/006/MOD13Q1"),
            Sensor::ModisMyd13q1 => Some("MODIS/006/MYD13Q1"),
            Sensor::ModisNpp => Some("MODIS/006/MOD17A3HGF"),
            Sensor::LandsatDerivedVi | Sensor::PrecomputedVi => None,
        }
    }

    /// Native resolution in meters, also the default export scale.
    pub fn resolution(&self) -> f64 {
        match self {
            Sensor::Landsat4
            | Sensor::Landsat5
            | Sensor::Landsat7
            | Sensor::Landsat8
            | Sensor::Landsat9
            | Sensor::LandsatDerivedVi => 30.0,
            Sensor::Sentinel2 => 10.0,
            Sensor::ModisMod13q1 | Sensor::ModisMyd13q1 | Sensor::ModisNpp => 250.0,
            Sensor::PrecomputedVi => 300.0,
        }
    }

    /// Short code used in run labels and file names.
    pub fn short_code(&self) -> &'static str {
        match self {
            Sensor::Landsat4 => "l4",
            Sensor::Landsat5 => "l5",
            Sensor::Landsat7 => "l7",
            Sensor::Landsat8 => "l8",
            Sensor::Landsat9 => "l9",
            Sensor::Sentinel2 => "s2",
            Sensor::ModisMod13q1 => "mod",
            Sensor::ModisMyd13q1 => "myd",
            Sensor::ModisNpp => "npp",
            Sensor::LandsatDerivedVi => "dvi",
            Sensor::PrecomputedVi => "asset",
        }
    }

    pub fn family(&self) -> SensorFamily {
        match self {
            Sensor::Landsat4
            | Sensor::Landsat5
            | Sensor::Landsat7
            | Sensor::Landsat8
            | Sensor::Landsat9 => SensorFamily::LandsatSr,
            Sensor::Sentinel2 => SensorFamily::Sentinel2,
            Sensor::ModisMod13q1 | Sensor::ModisMyd13q1 => SensorFamily::ModisVi,
            Sensor::ModisNpp => SensorFamily::ModisNpp,
            Sensor::LandsatDerivedVi => SensorFamily::DerivedVi,
            Sensor::PrecomputedVi => SensorFamily::Precomputed,
        }
    }

    /// Native-to-canonical band renaming for reflectance sensors.
    pub fn band_map(&self) -> Option<BandMap> {
        match self {
            Sensor::Landsat4 | Sensor::Landsat5 | Sensor::Landsat7 => Some(BandMap {
                blue: "SR_B1",
                red: "SR_B3",
                nir: "SR_B4",
                qa: "QA_PIXEL",
            }),
            Sensor::Landsat8 | Sensor::Landsat9 => Some(BandMap {
                blue: "SR_B2",
                red: "SR_B4",
                nir: "SR_B5",
                qa: "QA_PIXEL",
            }),
            Sensor::Sentinel2 => Some(BandMap {
                blue: "B2",
                red: "B4",
                nir: "B8",
                qa: "QA60",
            }),
            _ => None,
        }
    }

    pub fn supports_index(&self, index: VegetationIndex) -> bool {
        match self.family() {
            SensorFamily::LandsatSr | SensorFamily::Sentinel2 | SensorFamily::ModisVi => true,
            // NPP is a fixed productivity metric, no index choice applies.
            SensorFamily::ModisNpp => false,
            SensorFamily::DerivedVi => {
                matches!(index, VegetationIndex::Ndvi | VegetationIndex::Evi)
            }
            SensorFamily::Precomputed => true,
        }
    }
}

impl std::fmt::Display for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Sensor::Landsat4 => "Landsat 4",
            Sensor::Landsat5 => "Landsat 5",
            Sensor::Landsat7 => "Landsat 7",
            Sensor::Landsat8 => "Landsat 8",
            Sensor::Landsat9 => "Landsat 9",
            Sensor::Sentinel2 => "Sentinel 2",
            Sensor::ModisMod13q1 => "MODIS MOD13Q1",
            Sensor::ModisMyd13q1 => "MODIS MYD13Q1",
            Sensor::ModisNpp => "MODIS NPP",
            Sensor::LandsatDerivedVi => "Derived VI Landsat",
            Sensor::PrecomputedVi => "Precomputed VI asset",
        };
        write!(f, "{}", name)
    }
}
