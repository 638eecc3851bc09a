//! mvaplug Core
//!
//! Types shared by the classifier adapters and the plugin resolver.
//!
//! This crate provides:
//! - The host data model (datasets, variables, events)
//! - Error types and result handling

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{internal_name, AnalysisType, DataSetInfo, Event, EventClass, VariableInfo};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{DataSetInfo, Event, EventClass, VariableInfo};
}
