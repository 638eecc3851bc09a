//! Extension points for the external training engine.
//!
//! The engine is a process-wide singleton owned by a third-party library.
//! [`SharedEngine`] holds the one instance and hands it out only to the
//! method ordinal that claimed it first.

use crate::log_sink::LogSink;
use mvaplug_core::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

macro_rules! keyword_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            /// Keyword understood by the engine
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            /// All keywords, in declaration order
            pub fn keywords() -> &'static [&'static str] {
                &[$($text),+]
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s.to_ascii_uppercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(Error::config(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

keyword_enum!(
    /// Regularisation scheme
    Regularisation {
        Off => "OFF",
        Reg => "REG",
        Ard => "ARD",
        Asr => "ASR",
        All => "ALL",
    }
);

keyword_enum!(
    /// Training loss
    LossFunction {
        Entropy => "ENTROPY",
        Quadratic => "QUADRATIC",
        Combined => "COMBINED",
    }
);

keyword_enum!(
    /// Shape treatment flag
    ShapeTreatment {
        Off => "OFF",
        Incl => "INCL",
        Diag => "DIAG",
        Tol => "TOL",
    }
);

keyword_enum!(
    /// Optimizer selection
    TrainingMethod {
        Bfgs => "BFGS",
        NoBfgs => "NOBFGS",
    }
);

/// Global settings pushed to the engine once per configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSettings {
    pub run_analysis: bool,
    pub regularisation: Regularisation,
    pub preprocessing: i32,
    pub loss_function: LossFunction,
    pub shape_treatment: ShapeTreatment,
    pub momentum: f32,
    pub weight_update_interval: i32,
    pub iterations: i32,
    pub learning_speed: f32,
    pub max_learning_speed: f32,
    pub training_method: TrainingMethod,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            run_analysis: true,
            regularisation: Regularisation::Reg,
            preprocessing: 112,
            loss_function: LossFunction::Entropy,
            shape_treatment: ShapeTreatment::Off,
            momentum: 0.0,
            weight_update_interval: 200,
            iterations: 100,
            learning_speed: 1.0,
            max_learning_speed: 1.0,
            training_method: TrainingMethod::NoBfgs,
        }
    }
}

impl TrainingSettings {
    /// Push the global settings to the engine
    pub fn apply(&self, engine: &mut dyn TeacherEngine) {
        engine.set_global_preprocessing(self.preprocessing);
        engine.set_regularisation(self.regularisation);
        engine.set_loss_function(self.loss_function);
        engine.set_shape_treatment(self.shape_treatment);
        engine.set_weight_update_interval(self.weight_update_interval);
        engine.set_momentum(self.momentum);
        engine.set_learning_speed(self.learning_speed);
        engine.set_max_learning_speed(self.max_learning_speed);
        engine.set_iterations(self.iterations);
        engine.set_training_method(self.training_method);
    }
}

/// Network layout: input, hidden and output node counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topology {
    pub input: usize,
    pub hidden: usize,
    pub output: usize,
}

impl Topology {
    /// Layout used for binary classification over `n_variables` inputs
    pub fn for_classification(n_variables: usize) -> Self {
        Self {
            input: n_variables + 1,
            hidden: n_variables + 2,
            output: 1,
        }
    }
}

/// Task keyword for binomial classification
pub const CLASSIFICATION_TASK: &str = "CLA";

/// Random seed pair handed to the engine before training
pub const RANDOM_SEED: (i32, i32) = (4701, 21);

/// Training side of the external engine
pub trait TeacherEngine: Send {
    /// Where the trained artifact is written
    fn set_output_file(&mut self, path: &Path);

    fn define_topology(&mut self, topology: Topology);

    fn define_task(&mut self, task: &str);

    /// Seed the engine's random generator
    fn seed(&mut self, seed: (i32, i32));

    fn set_global_preprocessing(&mut self, flag: i32);

    fn set_regularisation(&mut self, value: Regularisation);

    fn set_loss_function(&mut self, value: LossFunction);

    fn set_shape_treatment(&mut self, value: ShapeTreatment);

    fn set_weight_update_interval(&mut self, events: i32);

    fn set_momentum(&mut self, momentum: f32);

    fn set_learning_speed(&mut self, speed: f32);

    fn set_max_learning_speed(&mut self, speed: f32);

    fn set_iterations(&mut self, iterations: i32);

    fn set_training_method(&mut self, method: TrainingMethod);

    fn set_individual_preprocessing(&mut self, variable: usize, flag: i32);

    fn set_individual_parameter(&mut self, variable: usize, index: usize, value: i32);

    /// Weight of the next event
    fn set_weight(&mut self, weight: f32);

    /// Target of the next event: 1 for signal, 0 for background
    fn set_target(&mut self, target: f32);

    /// Input values of the next event; completes the event
    fn push_input(&mut self, values: &[f32]);

    /// Run training over every pushed event, writing progress to `sink`
    fn train(&mut self, sink: &mut dyn LogSink) -> Result<()>;

    /// Write the correlation/significance tables for the given variable labels
    fn correlation_significance(&mut self, labels: &[String], txt: &Path, html: &Path)
        -> Result<()>;
}

/// Inference side of the external engine
pub trait Expert: Send + Sync {
    /// Score one input vector
    fn evaluate(&self, inputs: &[f64]) -> f64;
}

/// Opens a trained artifact for inference
pub trait ExpertLoader: Send + Sync {
    fn load(&self, artifact: &Path) -> Result<Box<dyn Expert>>;
}

/// The single engine instance plus the ordinal that owns it
pub struct SharedEngine {
    engine: Mutex<Box<dyn TeacherEngine>>,
    owner: Mutex<Option<u32>>,
}

impl SharedEngine {
    /// Wrap the process' engine instance
    pub fn new(engine: Box<dyn TeacherEngine>) -> Self {
        Self {
            engine: Mutex::new(engine),
            owner: Mutex::new(None),
        }
    }

    /// Claim sole ownership for `ordinal`.
    ///
    /// Claiming again with the owning ordinal succeeds; any other ordinal
    /// gets [`Error::ResourceClaimed`].
    pub fn claim(&self, ordinal: u32) -> Result<()> {
        let mut owner = self.owner.lock();
        match *owner {
            Some(current) if current != ordinal => Err(Error::ResourceClaimed {
                owner: current,
                requested: ordinal,
            }),
            Some(_) => Ok(()),
            None => {
                tracing::debug!("Training engine claimed by instance {}", ordinal);
                *owner = Some(ordinal);
                Ok(())
            }
        }
    }

    /// Ordinal currently holding the engine
    pub fn owner(&self) -> Option<u32> {
        *self.owner.lock()
    }

    /// Run `f` against the engine on behalf of `ordinal`
    pub fn with<R>(&self, ordinal: u32, f: impl FnOnce(&mut dyn TeacherEngine) -> R) -> Result<R> {
        self.claim(ordinal)?;
        let mut engine = self.engine.lock();
        Ok(f(&mut **engine))
    }
}

impl fmt::Debug for SharedEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedEngine")
            .field("owner", &self.owner())
            .finish_non_exhaustive()
    }
}
