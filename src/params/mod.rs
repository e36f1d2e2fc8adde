//! Parameter tables and the sensor registry

pub mod sensor;
pub mod tables;

pub use sensor::{BandMap, Sensor, SensorFamily};
pub use tables::z_coefficient;
