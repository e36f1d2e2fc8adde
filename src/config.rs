//! Run configuration: the immutable parameter bundle every pipeline
//! stage reads, validated in full before any engine call is issued.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::params::tables::{DEFAULT_TRANSITION_MATRIX, IPCC_CLASS_CODES};
use crate::params::{Sensor, SensorFamily};
use crate::types::{DegradError, DegradResult};

/// Inclusive year range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: i32,
    pub end: i32,
}

impl Period {
    pub fn new(start: i32, end: i32) -> Period {
        Period { start, end }
    }

    pub fn len_years(&self) -> usize {
        (self.end - self.start + 1).max(0) as usize
    }

    /// Clamp both bounds into an availability window.
    pub fn clamp(&self, min: i32, max: i32) -> Period {
        Period {
            start: self.start.clamp(min, max),
            end: self.end.clamp(min, max),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VegetationIndex {
    Ndvi,
    Evi,
    Msvi,
}

impl std::fmt::Display for VegetationIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VegetationIndex::Ndvi => write!(f, "ndvi"),
            VegetationIndex::Evi => write!(f, "evi"),
            VegetationIndex::Msvi => write!(f, "msvi"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrajectoryMethod {
    NdviTrend,
    /// Precipitation residual trend.
    PRestrend,
    /// Soil-moisture residual trend; recognized but not implemented.
    SRestrend,
    RainUseEfficiencyTrend,
}

impl std::fmt::Display for TrajectoryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrajectoryMethod::NdviTrend => write!(f, "ndvi_trend"),
            TrajectoryMethod::PRestrend => write!(f, "p_restrend"),
            TrajectoryMethod::SRestrend => write!(f, "s_restrend"),
            TrajectoryMethod::RainUseEfficiencyTrend => write!(f, "ue_trend"),
        }
    }
}

/// Ecologically-similar-unit layer for the performance sub-indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LandCoverEcoUnit {
    /// Global agro-environmental stratification.
    Gaes,
    /// Agro-ecological zones.
    Aez,
    /// Homogeneous response units.
    Hru,
    /// World ecosystems.
    Wte,
    /// Computed from soil taxonomy and the start-year land cover.
    Calculate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductivityLookup {
    GpgV1,
    GpgV2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClimateRegimePreset {
    TemperateDry,
    TemperateMoist,
    TropicalDry,
    TropicalMoist,
    TropicalMontane,
}

impl ClimateRegimePreset {
    pub fn coefficient(self) -> f64 {
        match self {
            ClimateRegimePreset::TemperateDry => 0.80,
            ClimateRegimePreset::TemperateMoist => 0.69,
            ClimateRegimePreset::TropicalDry => 0.58,
            ClimateRegimePreset::TropicalMoist => 0.48,
            ClimateRegimePreset::TropicalMontane => 0.64,
        }
    }
}

/// Climate conversion coefficient source for the SOC engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ClimateRegime {
    /// Per-pixel lookup of the IPCC climate zone raster.
    PerPixel,
    Preset(ClimateRegimePreset),
    /// User coefficient, must lie in [0, 1].
    Custom(f64),
}

/// Water-body resolution policy for the land cover engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WaterMaskPolicy {
    /// JRC surface water: seasonality of at least this many months.
    JrcSeasonality { months: u8 },
    /// Class value on the (custom) end land cover raster.
    CustomClassValue { value: i64 },
    /// Water code of the default land cover product.
    DefaultProductWater,
    /// User asset band, nonzero where water.
    Asset { asset: String, band: String },
}

/// Strictness of the custom land-cover / transition-matrix class check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassMatchPolicy {
    /// Raster codes and matrix codes must be identical sets.
    Exact,
    /// Raster codes must be a subset of the matrix codes.
    Subset,
}

/// User-supplied classified start/end land cover rasters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomLandCover {
    pub start_asset: String,
    pub start_band: String,
    pub end_asset: String,
    pub end_band: String,
    pub match_policy: ClassMatchPolicy,
}

/// Transition matrix: degradation meaning of every (start, end) class
/// pair. Cells hold -1 (degradation), 0 (stable) or +1 (improvement).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionMatrix {
    classes: Vec<i64>,
    /// Row-major, indexed [start][end].
    cells: Vec<i8>,
}

impl TransitionMatrix {
    pub fn new(classes: Vec<i64>, cells: Vec<i8>) -> DegradResult<TransitionMatrix> {
        if classes.is_empty() {
            return Err(DegradError::Config("transition matrix has no classes".into()));
        }
        if cells.len() != classes.len() * classes.len() {
            return Err(DegradError::Config(format!(
                "transition matrix needs {} cells for {} classes, got {}",
                classes.len() * classes.len(),
                classes.len(),
                cells.len()
            )));
        }
        if cells.iter().any(|c| !(-1..=1).contains(c)) {
            return Err(DegradError::Config(
                "transition matrix cells must be -1, 0 or +1".into(),
            ));
        }
        let distinct: BTreeSet<i64> = classes.iter().copied().collect();
        if distinct.len() != classes.len() {
            return Err(DegradError::Config("duplicate class codes in transition matrix".into()));
        }
        Ok(TransitionMatrix { classes, cells })
    }

    /// The default UNCCD matrix over the 7 working classes.
    pub fn default_ipcc() -> TransitionMatrix {
        let cells = DEFAULT_TRANSITION_MATRIX.iter().flatten().copied().collect();
        TransitionMatrix { classes: IPCC_CLASS_CODES.to_vec(), cells }
    }

    /// Matrix where every transition is stable.
    pub fn all_stable(classes: Vec<i64>) -> DegradResult<TransitionMatrix> {
        let cells = vec![0; classes.len() * classes.len()];
        TransitionMatrix::new(classes, cells)
    }

    pub fn size(&self) -> usize {
        self.classes.len()
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn index_of(&self, class: i64) -> Option<usize> {
        self.classes.iter().position(|&c| c == class)
    }

    /// Cell for a (start, end) class pair; `None` when either class is
    /// not part of the matrix.
    pub fn get(&self, start: i64, end: i64) -> Option<i8> {
        let row = self.index_of(start)?;
        let col = self.index_of(end)?;
        Some(self.cells[row * self.classes.len() + col])
    }

    pub fn set(&mut self, start: i64, end: i64, value: i8) -> DegradResult<()> {
        if !(-1..=1).contains(&value) {
            return Err(DegradError::Config("matrix cells must be -1, 0 or +1".into()));
        }
        let row = self
            .index_of(start)
            .ok_or(DegradError::ClassMismatch { missing: vec![start] })?;
        let col = self
            .index_of(end)
            .ok_or(DegradError::ClassMismatch { missing: vec![end] })?;
        let n = self.classes.len();
        self.cells[row * n + col] = value;
        Ok(())
    }

    /// Packed transition codes `start * multiplier + end`, row-major in
    /// class order.
    pub fn transition_codes(&self, multiplier: i64) -> Vec<i64> {
        self.classes
            .iter()
            .flat_map(|&s| self.classes.iter().map(move |&e| s * multiplier + e))
            .collect()
    }

    /// Matrix cells in the same row-major order as
    /// [`transition_codes`](Self::transition_codes), as remap values.
    pub fn degradation_values(&self) -> Vec<f64> {
        self.cells.iter().map(|&c| c as f64).collect()
    }

    /// Load from CSV: header row with the end-class codes, one row per
    /// start class, first column the start-class code.
    pub fn from_csv_path(path: &Path) -> DegradResult<TransitionMatrix> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let mut records = reader.records();
        let header = records
            .next()
            .ok_or_else(|| DegradError::Config("empty transition matrix CSV".into()))??;
        let classes: Vec<i64> = header
            .iter()
            .skip(1)
            .map(|field| {
                field
                    .parse::<i64>()
                    .map_err(|_| DegradError::Config(format!("bad class code '{}'", field)))
            })
            .collect::<DegradResult<_>>()?;

        let mut cells = Vec::with_capacity(classes.len() * classes.len());
        for record in records {
            let record = record?;
            for field in record.iter().skip(1) {
                let value = field
                    .parse::<i8>()
                    .map_err(|_| DegradError::Config(format!("bad matrix cell '{}'", field)))?;
                cells.push(value);
            }
        }
        TransitionMatrix::new(classes, cells)
    }
}

impl Default for TransitionMatrix {
    fn default() -> Self {
        TransitionMatrix::default_ipcc()
    }
}

/// Check custom land-cover raster codes against the matrix codes under
/// the configured strictness. Called by the validation layer before the
/// pipeline runs; the land cover engine assumes consistency.
pub fn validate_custom_classes(
    matrix: &TransitionMatrix,
    start_codes: &BTreeSet<i64>,
    end_codes: &BTreeSet<i64>,
    policy: ClassMatchPolicy,
) -> DegradResult<()> {
    let matrix_codes: BTreeSet<i64> = matrix.classes().iter().copied().collect();
    let raster_codes: BTreeSet<i64> = start_codes.union(end_codes).copied().collect();

    let missing: Vec<i64> = raster_codes.difference(&matrix_codes).copied().collect();
    if !missing.is_empty() {
        return Err(DegradError::ClassMismatch { missing });
    }
    if policy == ClassMatchPolicy::Exact {
        let unused: Vec<i64> = matrix_codes.difference(&raster_codes).copied().collect();
        if !unused.is_empty() {
            return Err(DegradError::Config(format!(
                "matrix classes {:?} never occur in the custom land cover rasters",
                unused
            )));
        }
    }
    Ok(())
}

/// The parameter bundle: one frozen value per run. Pipeline stages read
/// it by reference and return their outputs separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub start: i32,
    pub end: i32,
    pub trend_period: Option<Period>,
    pub state_period: Option<Period>,
    pub performance_period: Option<Period>,
    pub land_cover_period: Option<Period>,
    pub soc_period: Option<Period>,

    pub sensors: Vec<Sensor>,
    /// Asset id of the precomputed annual VI collection, required when
    /// [`Sensor::PrecomputedVi`] is selected.
    pub precomputed_vi_asset: Option<String>,
    pub vegetation_index: VegetationIndex,
    /// Pixels at or below this VI value are zeroed before integration.
    pub vi_threshold: Option<f64>,

    pub trajectory: TrajectoryMethod,
    pub lceu: LandCoverEcoUnit,
    pub productivity_lookup: ProductivityLookup,

    pub transition_matrix: TransitionMatrix,
    pub custom_land_cover: Option<CustomLandCover>,
    pub climate_regime: ClimateRegime,
    pub water_mask: WaterMaskPolicy,
}

impl RunConfig {
    /// A configuration with the defaults the UI offers: NDVI trend,
    /// world ecosystems, GPGv2 lookup, default matrix, per-pixel
    /// climate zones, JRC water with 8-month seasonality.
    pub fn new(start: i32, end: i32, sensors: Vec<Sensor>) -> RunConfig {
        RunConfig {
            start,
            end,
            trend_period: None,
            state_period: None,
            performance_period: None,
            land_cover_period: None,
            soc_period: None,
            sensors,
            precomputed_vi_asset: None,
            vegetation_index: VegetationIndex::Ndvi,
            vi_threshold: None,
            trajectory: TrajectoryMethod::NdviTrend,
            lceu: LandCoverEcoUnit::Wte,
            productivity_lookup: ProductivityLookup::GpgV2,
            transition_matrix: TransitionMatrix::default_ipcc(),
            custom_land_cover: None,
            climate_regime: ClimateRegime::PerPixel,
            water_mask: WaterMaskPolicy::JrcSeasonality { months: 8 },
        }
    }

    pub fn base_period(&self) -> Period {
        Period::new(self.start, self.end)
    }

    pub fn trend_period(&self) -> Period {
        self.trend_period.unwrap_or_else(|| self.base_period())
    }

    pub fn state_period(&self) -> Period {
        self.state_period.unwrap_or_else(|| self.base_period())
    }

    pub fn performance_period(&self) -> Period {
        self.performance_period.unwrap_or_else(|| self.base_period())
    }

    pub fn land_cover_period(&self) -> Period {
        self.land_cover_period.unwrap_or_else(|| self.base_period())
    }

    pub fn soc_period(&self) -> Period {
        self.soc_period.unwrap_or_else(|| self.base_period())
    }

    /// Widest window the VI series must span: the union of the base,
    /// trend, state and performance periods.
    pub fn vi_series_period(&self) -> Period {
        let periods = [
            self.base_period(),
            self.trend_period(),
            self.state_period(),
            self.performance_period(),
        ];
        Period {
            start: periods.iter().map(|p| p.start).min().unwrap(),
            end: periods.iter().map(|p| p.end).max().unwrap(),
        }
    }

    /// Export scale in meters, taken from the first sensor.
    pub fn export_scale(&self) -> f64 {
        self.sensors.first().map_or(300.0, |s| s.resolution())
    }

    /// Compact parameter signature used in artifact names.
    pub fn run_label(&self) -> String {
        let sensor = if self.sensors.iter().all(|s| s.family() == SensorFamily::LandsatSr) {
            let digits: String = self
                .sensors
                .iter()
                .map(|s| s.short_code().trim_start_matches('l'))
                .collect();
            format!("l{}", digits)
        } else {
            self.sensors.first().map_or("none", |s| s.short_code()).to_string()
        };
        let matrix = if self.transition_matrix == TransitionMatrix::default_ipcc()
            && self.custom_land_cover.is_none()
        {
            "default"
        } else {
            "custom"
        };
        format!(
            "{}_{}_{}_{}_{}_{}",
            self.start, self.end, sensor, self.vegetation_index, self.trajectory, matrix
        )
    }

    /// Full validation, run once before the pipeline. Configuration
    /// errors short-circuit here, before any engine work is issued.
    pub fn validate(&self) -> DegradResult<()> {
        if self.start >= self.end {
            return Err(DegradError::WrongYearOrder { start: self.start, end: self.end });
        }

        if self.sensors.is_empty() {
            return Err(DegradError::UnrecognizedSensor("no sensor selected".into()));
        }

        let family = self.sensors[0].family();
        if self.sensors.iter().any(|s| s.family() != family) {
            return Err(DegradError::Config(format!(
                "sensors {:?} mix incompatible families",
                self.sensors.iter().map(|s| s.to_string()).collect::<Vec<_>>()
            )));
        }

        for sensor in &self.sensors {
            if !sensor.supports_index(self.vegetation_index) {
                return Err(DegradError::UnsupportedIndex {
                    index: self.vegetation_index.to_string(),
                    sensor: sensor.to_string(),
                });
            }
        }

        if self.sensors.contains(&Sensor::PrecomputedVi) && self.precomputed_vi_asset.is_none() {
            return Err(DegradError::Config(
                "precomputed VI sensor selected without an asset id".into(),
            ));
        }

        if self.trajectory == TrajectoryMethod::SRestrend {
            return Err(DegradError::NotSupported(
                "s_restrend trajectory is not implemented".into(),
            ));
        }

        if let ClimateRegime::Custom(coef) = self.climate_regime {
            if !(0.0..=1.0).contains(&coef) {
                return Err(DegradError::Config(format!(
                    "climate conversion coefficient {} outside [0, 1]",
                    coef
                )));
            }
        }

        for (name, period) in [
            ("trend", self.trend_period),
            ("state", self.state_period),
            ("performance", self.performance_period),
            ("land cover", self.land_cover_period),
            ("soc", self.soc_period),
        ] {
            if let Some(p) = period {
                if p.start >= p.end {
                    return Err(DegradError::WrongYearOrder { start: p.start, end: p.end });
                }
                if p.end < self.start || p.start > self.end {
                    return Err(DegradError::Config(format!(
                        "{} period {}-{} does not overlap the analysis period {}-{}",
                        name, p.start, p.end, self.start, self.end
                    )));
                }
            }
        }

        Ok(())
    }
}
