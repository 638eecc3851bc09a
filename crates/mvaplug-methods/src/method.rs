//! Method trait and lifecycle types

use crate::options::OptionSet;
use crate::reference::ReferenceRecord;
use mvaplug_core::{AnalysisType, DataSetInfo, Event, Result};

/// Arguments a factory receives, one variant per construction shape
#[derive(Debug, Clone)]
pub enum MethodArgs {
    /// Reload a trained method for inference
    Expert {
        dataset: DataSetInfo,
        weight_file: String,
    },

    /// Create a new method for training
    Teacher {
        job: String,
        title: String,
        dataset: DataSetInfo,
        options: String,
    },
}

impl MethodArgs {
    /// Pick the construction shape the host uses: both job and title empty
    /// means the option string is a weight file to reload.
    pub fn from_host(job: &str, title: &str, dataset: DataSetInfo, option: &str) -> Self {
        if job.is_empty() && title.is_empty() {
            Self::Expert {
                dataset,
                weight_file: option.to_string(),
            }
        } else {
            Self::Teacher {
                job: job.to_string(),
                title: title.to_string(),
                dataset,
                options: option.to_string(),
            }
        }
    }

    /// The construction mode this shape leads to
    pub fn mode(&self) -> MethodMode {
        match self {
            Self::Expert { .. } => MethodMode::Expert,
            Self::Teacher { .. } => MethodMode::Teacher,
        }
    }

    /// Dataset description carried by either shape
    pub fn dataset(&self) -> &DataSetInfo {
        match self {
            Self::Expert { dataset, .. } | Self::Teacher { dataset, .. } => dataset,
        }
    }
}

/// How a method instance was constructed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodMode {
    /// Inference only, weights come from a reference record
    Expert,
    /// Training
    Teacher,
}

/// Lifecycle position of a method instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MethodState {
    Constructed,
    OptionsDeclared,
    OptionsProcessed,
    Trained,
    Ready,
}

/// Input variables ordered by importance
#[derive(Debug, Clone, Default)]
pub struct Ranking {
    pub entries: Vec<(String, f64)>,
}

/// Uniform classifier contract driven by the host
pub trait Method: Send {
    /// Registered method name (e.g. `NeuroBayes`)
    fn name(&self) -> &str;

    /// Title the method was booked under
    fn method_title(&self) -> &str;

    /// Job the method belongs to
    fn job_name(&self) -> &str;

    /// Construction mode
    fn mode(&self) -> MethodMode;

    /// Current lifecycle state
    fn state(&self) -> MethodState;

    /// Whether this method can handle the requested analysis
    fn has_analysis_type(&self, analysis: AnalysisType, n_classes: usize, n_targets: usize)
        -> bool;

    /// Declare recognized options and their defaults
    fn declare_options(&mut self) -> Result<()>;

    /// Access the declared options (empty before `declare_options`)
    fn options(&self) -> &OptionSet;

    /// Parse the option string and configure the method
    fn process_options(&mut self) -> Result<()>;

    /// Train on the given events
    fn train(&mut self, events: &[Event]) -> Result<()>;

    /// Score one event
    fn evaluate(&self, event: &Event) -> Result<f64>;

    /// Record pointing at the trained artifact
    fn write_reference(&self) -> ReferenceRecord;

    /// Restore from a record written by `write_reference`
    fn read_reference(&mut self, record: &ReferenceRecord) -> Result<()>;

    /// Variable ranking; `None` when the method cannot provide one
    fn create_ranking(&self) -> Option<Ranking>;

    /// Short help text
    fn help_message(&self) -> String;
}
