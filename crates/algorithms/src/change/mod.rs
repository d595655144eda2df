//! Multi-temporal change detection
//!
//! - **Categorical**: class-transition matrix, binary change map and
//!   percent of classified area that changed
//! - **Continuous**: per-pixel index difference with thresholded
//!   increase/decrease areas

mod categorical;
mod continuous;

pub use categorical::{class_distributions, detect_class_change, ClassChange};
pub use continuous::{
    detect_index_change, detect_scene_change, AreaStatistics, ChangeParams, IndexChange,
    CHANGE_DECREASE, CHANGE_INCREASE, CHANGE_NO_CHANGE,
};
