pub mod clustering;
pub mod dataset;
pub mod environment;
pub mod error;
pub mod logging;
pub mod model;
pub mod selection;
pub mod store;

pub use error::{PolicyGroupError, Result};

pub const TARGET_ANALYSIS: &str = "group_analysis";
pub const TARGET_SELECTION: &str = "model_selection";
pub const TARGET_IO: &str = "model_io";
