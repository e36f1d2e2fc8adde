//! Core indicator pipeline modules

pub mod indicator;
pub mod integration;
pub mod land_cover;
pub mod productivity;
pub mod soc;
pub mod statistics;

// Re-export main types and entry points
pub use indicator::{compute_indicator_maps, indicator_15_3_1, IndicatorMaps};
pub use integration::{integrate_climate, integrate_vi};
pub use land_cover::{land_cover, LandCoverMaps};
pub use productivity::{
    productivity, productivity_final, productivity_performance, productivity_state,
    productivity_trajectory, ProductivityMaps,
};
pub use soc::soil_organic_carbon;
pub use statistics::{
    indicator_areas_by_land_cover, indicator_class_areas, land_cover_transition_areas,
    write_area_csv, ClassArea, IndicatorLandCoverArea, TransitionArea,
};
