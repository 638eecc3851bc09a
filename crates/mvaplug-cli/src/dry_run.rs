//! Engine stand-in for validating jobs without the NeuroBayes library

use mvaplug_core::{Error, Result};
use mvaplug_methods::engine::{
    Expert, ExpertLoader, LossFunction, Regularisation, ShapeTreatment, TeacherEngine, Topology,
    TrainingMethod,
};
use mvaplug_methods::log_sink::LogSink;
use std::path::Path;
use tracing::debug;

/// Accepts configuration calls and logs them; cannot train
#[derive(Debug, Default)]
pub struct DryRunEngine {
    calls: usize,
}

impl DryRunEngine {
    fn record(&mut self, call: &str) {
        self.calls += 1;
        debug!("dry run engine call #{}: {}", self.calls, call);
    }
}

impl TeacherEngine for DryRunEngine {
    fn set_output_file(&mut self, path: &Path) {
        self.record(&format!("output file {}", path.display()));
    }

    fn define_topology(&mut self, topology: Topology) {
        self.record(&format!("topology {:?}", topology));
    }

    fn define_task(&mut self, task: &str) {
        self.record(&format!("task {}", task));
    }

    fn seed(&mut self, seed: (i32, i32)) {
        self.record(&format!("seed {:?}", seed));
    }

    fn set_global_preprocessing(&mut self, flag: i32) {
        self.record(&format!("global preprocessing {}", flag));
    }

    fn set_regularisation(&mut self, value: Regularisation) {
        self.record(&format!("regularisation {}", value));
    }

    fn set_loss_function(&mut self, value: LossFunction) {
        self.record(&format!("loss function {}", value));
    }

    fn set_shape_treatment(&mut self, value: ShapeTreatment) {
        self.record(&format!("shape treatment {}", value));
    }

    fn set_weight_update_interval(&mut self, events: i32) {
        self.record(&format!("weight update interval {}", events));
    }

    fn set_momentum(&mut self, momentum: f32) {
        self.record(&format!("momentum {}", momentum));
    }

    fn set_learning_speed(&mut self, speed: f32) {
        self.record(&format!("learning speed {}", speed));
    }

    fn set_max_learning_speed(&mut self, speed: f32) {
        self.record(&format!("max learning speed {}", speed));
    }

    fn set_iterations(&mut self, iterations: i32) {
        self.record(&format!("iterations {}", iterations));
    }

    fn set_training_method(&mut self, method: TrainingMethod) {
        self.record(&format!("training method {}", method));
    }

    fn set_individual_preprocessing(&mut self, variable: usize, flag: i32) {
        self.record(&format!("variable {} preprocessing {}", variable, flag));
    }

    fn set_individual_parameter(&mut self, variable: usize, index: usize, value: i32) {
        self.record(&format!("variable {} parameter {} = {}", variable, index, value));
    }

    fn set_weight(&mut self, _weight: f32) {}

    fn set_target(&mut self, _target: f32) {}

    fn push_input(&mut self, _values: &[f32]) {}

    fn train(&mut self, _sink: &mut dyn LogSink) -> Result<()> {
        Err(Error::engine("dry run engine cannot train"))
    }

    fn correlation_significance(&mut self, _labels: &[String], _txt: &Path, _html: &Path) -> Result<()> {
        Err(Error::engine("dry run engine has no correlation analysis"))
    }
}

/// Loader that never finds an expert
#[derive(Debug, Default)]
pub struct NoExperts;

impl ExpertLoader for NoExperts {
    fn load(&self, artifact: &Path) -> Result<Box<dyn Expert>> {
        Err(Error::engine(format!(
            "cannot load {} without the NeuroBayes library",
            artifact.display()
        )))
    }
}
