//! Static lookup data: reclassification tables, IPCC stock-change
//! factors, decision tables and classification thresholds.
//!
//! Everything in this module is codified policy (UNCCD Good Practice
//! Guidance / IPCC Tier-1); none of it is derivable from a formula, so
//! the tables are kept as plain constants that can be audited against
//! the published methodology.

/// Nodata value used by the 16-bit source products.
pub const INT16_MIN: i64 = -32768;

/// Normal-approximation coefficient turning a Kendall tau into a
/// z-score for a series of `n` annual observations.
pub fn z_coefficient(n: usize) -> f64 {
    let n = n as f64;
    (3.0 * (n * (n - 1.0)).sqrt()) / (2.0 * (2.0 * n + 5.0)).sqrt()
}

/// 95 % significance threshold on the z-score.
pub const Z_STRONG: f64 = 1.96;
/// 90 % significance threshold on the z-score.
pub const Z_WEAK: f64 = 1.28;

/// Working land cover classes, in matrix row/column order.
pub const IPCC_CLASS_CODES: [i64; 7] = [1, 2, 3, 4, 5, 6, 7];

pub const IPCC_CLASS_NAMES: [&str; 7] = [
    "forest",
    "grassland",
    "cropland",
    "wetland",
    "artificial",
    "bareland",
    "water",
];

pub const DEGRADATION_CLASS_NAMES: [&str; 3] = ["degraded", "stable", "improved"];

/// ESA-CCI land cover codes and their aggregation into the 7 working
/// classes. The two arrays are parallel: `ESA_CLASS_CODES[i]` remaps to
/// `ESA_TO_IPCC[i]`.
pub const ESA_CLASS_CODES: [i64; 37] = [
    10, 11, 12, 20, 30, 40, 50, 60, 61, 62, 70, 71, 72, 80, 81, 82, 90, 100, 110, 120, 121, 122,
    130, 140, 150, 151, 152, 153, 160, 170, 180, 190, 200, 201, 202, 210, 220,
];

pub const ESA_TO_IPCC: [i64; 37] = [
    3, 3, 3, 3, 3, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 4, 4, 4,
    5, 6, 6, 6, 7, 6,
];

/// ESA-CCI code for permanent water bodies, used by the default water
/// mask policy.
pub const ESA_WATER_CODE: i64 = 210;

/// Default transition matrix: rows are the start class, columns the end
/// class, both in [`IPCC_CLASS_CODES`] order. -1 degradation, 0 stable,
/// +1 improvement.
pub const DEFAULT_TRANSITION_MATRIX: [[i8; 7]; 7] = [
    [0, -1, -1, -1, -1, -1, 0],
    [1, 0, 1, -1, -1, -1, 0],
    [1, -1, 0, -1, -1, -1, 0],
    [-1, -1, -1, 0, -1, -1, 0],
    [1, 1, 1, 1, 0, 1, 0],
    [1, 1, 1, 1, -1, 0, 0],
    [0, 0, 0, 0, 0, 0, 0],
];

/// Land cover transition codes `start * 10 + end` for the 49 possible
/// transitions between the 7 working classes, row-major.
pub const SOC_TRANSITION_CODES: [i64; 49] = [
    11, 12, 13, 14, 15, 16, 17, //
    21, 22, 23, 24, 25, 26, 27, //
    31, 32, 33, 34, 35, 36, 37, //
    41, 42, 43, 44, 45, 46, 47, //
    51, 52, 53, 54, 55, 56, 57, //
    61, 62, 63, 64, 65, 66, 67, //
    71, 72, 73, 74, 75, 76, 77,
];

/// Sentinel value in [`SOC_CLIMATE_FACTOR`]: substitute the climate
/// conversion coefficient.
pub const CLIMATE_COEF_SENTINEL: f64 = 333.0;
/// Sentinel value in [`SOC_CLIMATE_FACTOR`]: substitute the reciprocal
/// of the climate conversion coefficient.
pub const CLIMATE_COEF_RECIPROCAL_SENTINEL: f64 = -333.0;

/// IPCC Tier-1 land-use stock-change factor per transition, parallel to
/// [`SOC_TRANSITION_CODES`]. The 333/-333 sentinels are recoded with
/// the chosen climate coefficient at run time.
pub const SOC_CLIMATE_FACTOR: [f64; 49] = [
    1.0, 1.0, 333.0, 1.0, 0.1, 0.1, 1.0, //
    1.0, 1.0, 333.0, 1.0, 0.1, 0.1, 1.0, //
    -333.0, -333.0, 1.0, 1.0 / 0.71, 0.1, 0.1, 1.0, //
    1.0, 1.0, 0.71, 1.0, 0.1, 0.1, 1.0, //
    2.0, 2.0, 2.0, 2.0, 1.0, 1.0, 1.0, //
    2.0, 2.0, 2.0, 2.0, 1.0, 1.0, 1.0, //
    1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0,
];

/// Tier-1 management-regime factor: no management information is
/// assumed, every transition keeps factor 1.
pub const SOC_MANAGEMENT_FACTOR: [f64; 49] = [1.0; 49];

/// Tier-1 organic-input factor: same assumption as management.
pub const SOC_INPUT_FACTOR: [f64; 49] = [1.0; 49];

/// IPCC equilibrium horizon: carbon change is frozen once a pixel has
/// been transition-free for more than this many years.
pub const SOC_EQUILIBRIUM_YEARS: f64 = 20.0;

/// Percent SOC change beyond which a pixel leaves the stable class.
pub const SOC_CHANGE_THRESHOLD_PERCENT: f64 = 10.0;

/// IPCC climate zone raster codes (0 = nodata) and their stock-change
/// conversion coefficients.
pub const CLIMATE_ZONE_CODES: [i64; 13] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];

pub const CLIMATE_ZONE_COEFFICIENTS: [f64; 13] = [
    0.0, 0.69, 0.80, 0.69, 0.80, 0.69, 0.80, 0.69, 0.80, 0.64, 0.48, 0.48, 0.58,
];

/// Performance sub-indicator parameters.
pub const PERFORMANCE_PERCENTILE: f64 = 90.0;
pub const PERFORMANCE_RATIO_THRESHOLD: f64 = 0.5;
/// Replacement for a zero-valued unit percentile before the ratio
/// division.
pub const PERFORMANCE_EPSILON: f64 = 0.001;
/// Fill value for pixels outside every ecological unit, so they survive
/// the grouped reduction instead of being masked.
pub const ECO_UNIT_FILL: f64 = -1.0;

/// Availability window of the default annual land cover product.
pub const LAND_COVER_FIRST_YEAR: i32 = 1992;
pub const LAND_COVER_MAX_YEAR: i32 = 2019;

/// Scene-level cloud cover ceiling for optical collections, percent.
pub const SCENE_CLOUD_COVER_MAX: f64 = 20.0;

// Collaborator asset identifiers.
pub const PRECIPITATION_ASSET: &str = "NOAA/PERSIANN-CDR";
pub const LAND_COVER_ASSET: &str = "users/amitghosh/sdg_module/esa_cci_lc_1992_2019";
pub const SOIL_TAXONOMY_ASSET: &str = "OpenLandMap/SOL/SOL_TEXTURE-CLASS_USDA-TT_M/v02";
pub const SOC_ASSET: &str = "users/geflanddegradation/toolbox_datasets/soc_sgrid_30cm";
pub const IPCC_CLIMATE_ZONES_ASSET: &str =
    "users/geflanddegradation/toolbox_datasets/ipcc_climate_zones";
pub const WTE_ASSET: &str = "users/amitghosh/sdg_module/wte_2020";
pub const GAES_ASSET: &str = "users/amitghosh/sdg_module/gaes";
pub const AEZ_ASSET: &str = "users/amitghosh/sdg_module/aez";
pub const HRU_ASSET: &str = "users/amitghosh/sdg_module/hru";
pub const JRC_WATER_ASSET: &str = "JRC/GSW1_4/GlobalSurfaceWater";

/// One row of a 3-way decision table:
/// `((trajectory, state, performance), output class)`.
pub type ProductivityRule = ((u8, u8, u8), u8);

/// Good Practice Guidance v2 productivity combination. Degrading
/// trajectory dominates unless both state and performance are
/// favorable; a stable trajectory is demoted when state or performance
/// disagree; an improving trajectory is only demoted when both
/// disagree.
pub const PRODUCTIVITY_TABLE_GPGV2: [ProductivityRule; 18] = [
    ((1, 1, 1), 1),
    ((1, 1, 2), 1),
    ((1, 2, 1), 1),
    ((1, 2, 2), 2),
    ((1, 3, 1), 1),
    ((1, 3, 2), 1),
    ((2, 1, 1), 1),
    ((2, 1, 2), 2),
    ((2, 2, 1), 1),
    ((2, 2, 2), 2),
    ((2, 3, 1), 2),
    ((2, 3, 2), 2),
    ((3, 1, 1), 1),
    ((3, 1, 2), 3),
    ((3, 2, 1), 3),
    ((3, 2, 2), 3),
    ((3, 3, 1), 3),
    ((3, 3, 2), 3),
];

/// Good Practice Guidance v1 productivity combination. Stricter than
/// v2 for a degrading trajectory, more permissive for a stable one.
pub const PRODUCTIVITY_TABLE_GPGV1: [ProductivityRule; 18] = [
    ((1, 1, 1), 1),
    ((1, 1, 2), 1),
    ((1, 2, 1), 1),
    ((1, 2, 2), 1),
    ((1, 3, 1), 1),
    ((1, 3, 2), 1),
    ((2, 1, 1), 1),
    ((2, 1, 2), 2),
    ((2, 2, 1), 2),
    ((2, 2, 2), 2),
    ((2, 3, 1), 2),
    ((2, 3, 2), 2),
    ((3, 1, 1), 1),
    ((3, 1, 2), 3),
    ((3, 2, 1), 3),
    ((3, 2, 2), 3),
    ((3, 3, 1), 3),
    ((3, 3, 2), 3),
];

/// One sub-indicator input of the final combination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Sub-indicator carries this class (1, 2 or 3).
    Class(u8),
    /// Sub-indicator is nodata (pixel value below 1).
    Missing,
}

/// One row of the final combination table:
/// `((productivity, land cover, soc), indicator class)`.
pub type IndicatorRule = ((Signal, Signal, Signal), u8);

use Signal::{Class, Missing};

/// Final 15.3.1 combination over (productivity, land cover, soc).
///
/// 27 rows enumerate the fully-populated triples; the 9 trailing rows
/// let a single valid sub-indicator carry the decision when the other
/// two are nodata. Any other mix of valid and nodata inputs stays
/// nodata.
pub const INDICATOR_TABLE: [IndicatorRule; 36] = [
    ((Class(3), Class(3), Class(3)), 3),
    ((Class(3), Class(3), Class(2)), 3),
    ((Class(3), Class(3), Class(1)), 1),
    ((Class(3), Class(2), Class(3)), 3),
    ((Class(3), Class(2), Class(2)), 3),
    ((Class(3), Class(2), Class(1)), 1),
    ((Class(3), Class(1), Class(3)), 1),
    ((Class(3), Class(1), Class(2)), 1),
    ((Class(3), Class(1), Class(1)), 1),
    ((Class(2), Class(3), Class(3)), 3),
    ((Class(2), Class(3), Class(2)), 3),
    ((Class(2), Class(3), Class(1)), 1),
    ((Class(2), Class(2), Class(3)), 3),
    ((Class(2), Class(2), Class(2)), 2),
    ((Class(2), Class(2), Class(1)), 1),
    ((Class(2), Class(1), Class(3)), 1),
    ((Class(2), Class(1), Class(2)), 1),
    ((Class(2), Class(1), Class(1)), 1),
    ((Class(1), Class(3), Class(3)), 1),
    ((Class(1), Class(3), Class(2)), 1),
    ((Class(1), Class(3), Class(1)), 1),
    ((Class(1), Class(2), Class(3)), 1),
    ((Class(1), Class(2), Class(2)), 1),
    ((Class(1), Class(2), Class(1)), 1),
    ((Class(1), Class(1), Class(3)), 1),
    ((Class(1), Class(1), Class(2)), 1),
    ((Class(1), Class(1), Class(1)), 1),
    ((Class(1), Missing, Missing), 1),
    ((Missing, Class(1), Missing), 1),
    ((Missing, Missing, Class(1)), 1),
    ((Class(2), Missing, Missing), 2),
    ((Missing, Class(2), Missing), 2),
    ((Missing, Missing, Class(2)), 2),
    ((Class(3), Missing, Missing), 3),
    ((Missing, Class(3), Missing), 3),
    ((Missing, Missing, Class(3)), 3),
];
