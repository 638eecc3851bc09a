//! mvaplug Methods
//!
//! Classifier adapters for a multivariate-analysis host.
//!
//! - [`plugin`]: explicit plugin registration table and the resolver that
//!   finds a method by name (or infers the name from a weight file) and
//!   constructs it.
//! - [`neurobayes`]: adapter driving the external NeuroBayes engine through
//!   the host's method lifecycle.
//!
//! The external engine is reached only through the traits in [`engine`].

pub mod analysis;
pub mod engine;
pub mod factory;
pub mod log_sink;
pub mod method;
pub mod neurobayes;
pub mod options;
pub mod ordinal;
pub mod plugin;
pub mod preprocessing;
pub mod reference;

pub use analysis::{AnalysisOutcome, CommandRunner, PostTrainingAnalysis, ShellRunner};
pub use engine::{
    Expert, ExpertLoader, LossFunction, Regularisation, ShapeTreatment, SharedEngine,
    TeacherEngine, Topology, TrainingMethod, TrainingSettings,
};
pub use factory::{MethodCreator, MethodFactory};
pub use log_sink::{FileLogSink, LogSink};
pub use method::{Method, MethodArgs, MethodMode, MethodState, Ranking};
pub use neurobayes::{BackendConfig, NeuroBayesBackend, NeuroBayesMethod};
pub use options::{OptionSet, OptionSpec, OptionValue};
pub use ordinal::OrdinalAllocator;
pub use plugin::{infer_method_name, PluginHandler, PluginRegistry, PluginResolver};
pub use preprocessing::{Directive, PreprocessingPlan};
pub use reference::ReferenceRecord;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::method::{Method, MethodArgs, MethodMode, MethodState};
    pub use crate::neurobayes::{NeuroBayesBackend, NeuroBayesMethod};
    pub use crate::plugin::{PluginRegistry, PluginResolver};
    pub use crate::reference::ReferenceRecord;
}
