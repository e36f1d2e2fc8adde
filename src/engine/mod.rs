//! Lazy map-algebra engine: expression handles, annual collections and
//! the materializing evaluator.

pub mod collection;
pub mod eval;
pub mod image;
pub mod region;

pub use collection::{AnnualCollection, AnnualImage};
pub use eval::{Evaluator, Grid};
pub use image::{Image, LinearFit, ToImage};
pub use region::Aoi;
