//! NeuroBayes classifier adapter
//!
//! Drives the external NeuroBayes engine through the [`Method`] lifecycle.
//! The engine's teacher is a process-wide singleton, so only the first
//! training instance built from a backend (ordinal 0) may configure and
//! train it. Later instances are still constructed, flagged at construction,
//! and refuse to train.

use crate::analysis::{AnalysisOutcome, CommandRunner, PostTrainingAnalysis, ShellRunner};
use crate::engine::{
    Expert, ExpertLoader, LossFunction, Regularisation, ShapeTreatment, SharedEngine,
    TeacherEngine, Topology, TrainingMethod, TrainingSettings, CLASSIFICATION_TASK, RANDOM_SEED,
};
use crate::factory::{MethodCreator, MethodFactory};
use crate::log_sink::{FileLogSink, LogSink};
use crate::method::{Method, MethodArgs, MethodMode, MethodState, Ranking};
use crate::options::OptionSet;
use crate::ordinal::{is_trusted, OrdinalAllocator};
use crate::plugin::{infer_method_name, PluginHandler, PluginRegistry, METHOD_FAMILY};
use crate::preprocessing::PreprocessingPlan;
use crate::reference::{ReferenceRecord, ARTIFACT_EXTENSION, UNTRAINED_ARTIFACT};
use mvaplug_core::{AnalysisType, DataSetInfo, Error, Event, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name the adapter registers under
pub const METHOD_NAME: &str = "NeuroBayes";

/// Option keys
pub mod keys {
    pub const RUN_ANALYSIS: &str = "RunAnalysis";
    pub const REGULARISATION: &str = "Regularisation";
    pub const PREPROCESSING: &str = "Preprocessing";
    pub const LOSS_FUNCTION: &str = "LossFunction";
    pub const SHAPE_TREATMENT: &str = "ShapeTreatment";
    pub const MOMENTUM: &str = "Momentum";
    pub const WEIGHT_UPDATE_INTERVAL: &str = "WeightUpdateInterval";
    pub const TRAINING_ITERATIONS: &str = "TrainingIterations";
    pub const LEARNING_SPEED: &str = "LearningSpeed";
    pub const MAX_LEARNING_SPEED: &str = "MaxLearningSpeed";
    pub const TRAINING_METHOD: &str = "TrainingMethod";
    pub const PREPROCESSING_BY_INDEX: &str = "IndividualPreprocessingByIndex";
    pub const PREPROCESSING_BY_NAME: &str = "IndividualPreprocessingByName";
}

/// File locations used by the adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Directory receiving engine artifacts
    pub weights_dir: PathBuf,

    /// Training log written while the engine trains
    pub log_file: PathBuf,

    /// Environment variable naming the toolset root
    pub toolset_env: String,

    /// Directory receiving analysis tables
    pub analysis_dir: PathBuf,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            weights_dir: PathBuf::from("weights"),
            log_file: PathBuf::from("nb_teacher.log"),
            toolset_env: "NEUROBAYES".to_string(),
            analysis_dir: PathBuf::from("."),
        }
    }
}

/// Everything the adapter needs from the outside world, shared by all
/// instances of one process run.
#[derive(Clone)]
pub struct NeuroBayesBackend {
    engine: Arc<SharedEngine>,
    experts: Arc<dyn ExpertLoader>,
    ordinals: Arc<OrdinalAllocator>,
    runner: Arc<dyn CommandRunner>,
    config: BackendConfig,
}

impl NeuroBayesBackend {
    /// Wrap the process' engine and an expert loader
    pub fn new(engine: Box<dyn TeacherEngine>, experts: Arc<dyn ExpertLoader>) -> Self {
        Self {
            engine: Arc::new(SharedEngine::new(engine)),
            experts,
            ordinals: Arc::new(OrdinalAllocator::new()),
            runner: Arc::new(ShellRunner),
            config: BackendConfig::default(),
        }
    }

    /// Replace the file locations
    pub fn with_config(mut self, config: BackendConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the command runner used by the analysis step
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// The shared engine
    pub fn engine(&self) -> &Arc<SharedEngine> {
        &self.engine
    }

    /// The ordinal allocator
    pub fn ordinals(&self) -> &OrdinalAllocator {
        &self.ordinals
    }

    /// File locations
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Construct an adapter for the given shape
    pub fn create(&self, args: MethodArgs) -> NeuroBayesMethod {
        NeuroBayesMethod::new(self.clone(), args)
    }

    fn creator(&self) -> MethodCreator {
        let backend = self.clone();
        Box::new(move |args| Ok(Box::new(backend.create(args)) as Box<dyn Method>))
    }

    /// Register the adapter as plugin `MethodBase::NeuroBayes` and as host
    /// method `NeuroBayes`.
    pub fn register(&self, plugins: &mut PluginRegistry, factory: &mut MethodFactory) -> Result<()> {
        plugins.register(PluginHandler::new(METHOD_FAMILY, METHOD_NAME, self.creator()))?;
        factory.register(METHOD_NAME, self.creator())
    }
}

/// Adapter instance
pub struct NeuroBayesMethod {
    backend: NeuroBayesBackend,
    mode: MethodMode,
    state: MethodState,
    job: String,
    title: String,
    dataset: DataSetInfo,
    option_string: String,
    options: OptionSet,
    settings: TrainingSettings,
    plan: PreprocessingPlan,
    ordinal: Option<u32>,
    configured: bool,
    artifact: PathBuf,
    expert: Option<Box<dyn Expert>>,
}

impl NeuroBayesMethod {
    fn new(backend: NeuroBayesBackend, args: MethodArgs) -> Self {
        match args {
            MethodArgs::Expert {
                dataset,
                weight_file,
            } => {
                let title = infer_method_name(&weight_file).unwrap_or_else(|_| METHOD_NAME.to_string());
                info!("Expert constructor was called for {}", weight_file);
                Self::with_parts(backend, MethodMode::Expert, String::new(), title, dataset, String::new(), None)
            }
            MethodArgs::Teacher {
                job,
                title,
                dataset,
                options,
            } => {
                let ordinal = backend.ordinals.allocate();
                if !is_trusted(ordinal) {
                    warn!("This NeuroBayes instance ({}, ordinal {}) was not created as first one", title, ordinal);
                    warn!("Because the teacher is a singleton you won't get useful results from this method");
                    warn!("Use only one teacher at a time");
                }
                info!("Teacher constructor was called for {} (ordinal {})", title, ordinal);
                Self::with_parts(backend, MethodMode::Teacher, job, title, dataset, options, Some(ordinal))
            }
        }
    }

    fn with_parts(
        backend: NeuroBayesBackend,
        mode: MethodMode,
        job: String,
        title: String,
        dataset: DataSetInfo,
        option_string: String,
        ordinal: Option<u32>,
    ) -> Self {
        let artifact = match ordinal {
            Some(o) if is_trusted(o) => artifact_path(&backend.config.weights_dir, &job, &title),
            _ => PathBuf::from(UNTRAINED_ARTIFACT),
        };
        let plan = PreprocessingPlan::empty(dataset.n_variables());
        Self {
            backend,
            mode,
            state: MethodState::Constructed,
            job,
            title,
            dataset,
            option_string,
            options: OptionSet::new(),
            settings: TrainingSettings::default(),
            plan,
            ordinal,
            configured: false,
            artifact,
            expert: None,
        }
    }

    /// Construction ordinal, `None` for reloaded instances
    pub fn ordinal(&self) -> Option<u32> {
        self.ordinal
    }

    /// Whether this instance may train the singleton engine
    pub fn is_trusted(&self) -> bool {
        self.ordinal.map(is_trusted).unwrap_or(false)
    }

    /// Settings resolved by `process_options`
    pub fn settings(&self) -> &TrainingSettings {
        &self.settings
    }

    /// Preprocessing directives resolved by `process_options`
    pub fn preprocessing(&self) -> &PreprocessingPlan {
        &self.plan
    }

    /// Path of the engine artifact this instance writes or reads
    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    /// Write the variable set description used by the engine's code generator
    pub fn dump_pseudo_codegen(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut out = String::from("VARSET 1\n");
        for label in self.plan.labels(&self.dataset) {
            let _ = writeln!(out, "{}", label);
        }
        out.push_str("ENDVARSET\nNETWORK classify 1\n");
        std::fs::write(path, out)?;
        Ok(())
    }

    fn settings_from_options(&self) -> Result<TrainingSettings> {
        let o = &self.options;
        Ok(TrainingSettings {
            run_analysis: o.get_bool(keys::RUN_ANALYSIS)?,
            regularisation: o.get_str(keys::REGULARISATION)?.parse()?,
            preprocessing: to_i32(keys::PREPROCESSING, o.get_int(keys::PREPROCESSING)?)?,
            loss_function: o.get_str(keys::LOSS_FUNCTION)?.parse()?,
            shape_treatment: o.get_str(keys::SHAPE_TREATMENT)?.parse()?,
            momentum: o.get_float(keys::MOMENTUM)? as f32,
            weight_update_interval: to_i32(
                keys::WEIGHT_UPDATE_INTERVAL,
                o.get_int(keys::WEIGHT_UPDATE_INTERVAL)?,
            )?,
            iterations: to_i32(keys::TRAINING_ITERATIONS, o.get_int(keys::TRAINING_ITERATIONS)?)?,
            learning_speed: o.get_float(keys::LEARNING_SPEED)? as f32,
            max_learning_speed: o.get_float(keys::MAX_LEARNING_SPEED)? as f32,
            training_method: o.get_str(keys::TRAINING_METHOD)?.parse()?,
        })
    }

    fn teacher_ordinal(&self) -> Result<u32> {
        self.ordinal
            .filter(|_| self.mode == MethodMode::Teacher)
            .ok_or_else(|| Error::invalid_state(format!("{} was not constructed for training", self.title)))
    }

    /// Feed every event to the engine and run training with output going
    /// to the training log.
    fn run_training(&self, ordinal: u32, events: &[Event]) -> Result<()> {
        let n_variables = self.dataset.n_variables();
        let log_file = self.backend.config.log_file.clone();
        let artifact = self.artifact.clone();

        if let Some(parent) = artifact.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        self.backend.engine.with(ordinal, |engine| {
            engine.set_output_file(&artifact);
            engine.define_topology(Topology::for_classification(n_variables));
            engine.define_task(CLASSIFICATION_TASK);
            engine.seed(RANDOM_SEED);

            let mut inputs = vec![0.0f32; n_variables];
            let mut n_signal = 0usize;
            for event in events {
                engine.set_weight(event.weight as f32);
                let target = if self.dataset.is_signal(event) {
                    n_signal += 1;
                    1.0
                } else {
                    0.0
                };
                engine.set_target(target);
                inputs.copy_from_slice(&event.values[..n_variables]);
                engine.push_input(&inputs);
            }
            info!(
                "Found {} signal events and {} background events",
                n_signal,
                events.len() - n_signal
            );

            info!("To see NeuroBayes output have a look at {}", log_file.display());
            let mut sink = FileLogSink::create(&log_file)?;
            let trained = engine.train(&mut sink);
            let flushed = sink.flush();
            trained.and(flushed)
        })?
    }
}

fn to_i32(key: &str, value: i64) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::config(format!("option '{}' is out of range: {}", key, value)))
}

/// `<weights_dir>/<job>_<title>.NB_weights.nb`
pub fn artifact_path(weights_dir: &Path, job: &str, title: &str) -> PathBuf {
    weights_dir.join(format!("{}_{}.NB_weights.{}", job, title, ARTIFACT_EXTENSION))
}

impl Method for NeuroBayesMethod {
    fn name(&self) -> &str {
        METHOD_NAME
    }

    fn method_title(&self) -> &str {
        &self.title
    }

    fn job_name(&self) -> &str {
        &self.job
    }

    fn mode(&self) -> MethodMode {
        self.mode
    }

    fn state(&self) -> MethodState {
        self.state
    }

    fn has_analysis_type(&self, analysis: AnalysisType, n_classes: usize, _n_targets: usize) -> bool {
        analysis == AnalysisType::Classification && n_classes == 2
    }

    fn declare_options(&mut self) -> Result<()> {
        debug!("Declare NeuroBayes options");
        let mut set = OptionSet::new();
        set.declare(keys::RUN_ANALYSIS, true, "Run the NeuroBayes analysis macro after training")
            .declare_with_values(
                keys::REGULARISATION,
                "REG",
                "Type of regularisation",
                Regularisation::keywords(),
            )
            .declare(keys::PREPROCESSING, 112i64, "Global preprocessing flag")
            .declare_with_values(
                keys::LOSS_FUNCTION,
                "ENTROPY",
                "Type of loss function",
                LossFunction::keywords(),
            )
            .declare_with_values(
                keys::SHAPE_TREATMENT,
                "OFF",
                "Shape treatment",
                ShapeTreatment::keywords(),
            )
            .declare(keys::MOMENTUM, 0.0f64, "Momentum for the training")
            .declare(
                keys::WEIGHT_UPDATE_INTERVAL,
                200i64,
                "Number of events between weight updates",
            )
            .declare(keys::TRAINING_ITERATIONS, 100i64, "Number of training iterations")
            .declare(keys::LEARNING_SPEED, 1.0f64, "Multiplicative learning speed factor")
            .declare(keys::MAX_LEARNING_SPEED, 1.0f64, "Limit on the learning speed")
            .declare_with_values(
                keys::TRAINING_METHOD,
                "NOBFGS",
                "Training method",
                TrainingMethod::keywords(),
            )
            .declare(
                keys::PREPROCESSING_BY_INDEX,
                "",
                "Comma separated individual preprocessing flags, one per variable, e.g. 12,0,14.2",
            )
            .declare(
                keys::PREPROCESSING_BY_NAME,
                "",
                "Comma separated <variable>=<flag>.<param>... pairs",
            );
        self.options = set;
        if self.state < MethodState::OptionsDeclared {
            self.state = MethodState::OptionsDeclared;
        }
        Ok(())
    }

    fn options(&self) -> &OptionSet {
        &self.options
    }

    fn process_options(&mut self) -> Result<()> {
        if self.mode != MethodMode::Teacher || self.configured {
            warn!("Teacher already configured or not in training mode, no configuration done");
            return Ok(());
        }
        let ordinal = self.teacher_ordinal()?;

        if self.options.is_empty() {
            self.declare_options()?;
        }
        self.options.parse(&self.option_string)?;
        let settings = self.settings_from_options()?;
        let plan = PreprocessingPlan::from_options(
            self.options.get_str(keys::PREPROCESSING_BY_INDEX)?,
            self.options.get_str(keys::PREPROCESSING_BY_NAME)?,
            &self.dataset,
        )?;

        if is_trusted(ordinal) {
            self.backend.engine.with(ordinal, |engine| {
                settings.apply(engine);
                plan.apply(engine);
            })?;
            info!(
                "Configured NeuroBayes teacher ({} individual preprocessing directives)",
                plan.count()
            );
        } else {
            warn!(
                "{} (ordinal {}) does not own the teacher; options validated but not applied",
                self.title, ordinal
            );
        }

        self.settings = settings;
        self.plan = plan;
        self.configured = true;
        self.state = MethodState::OptionsProcessed;
        Ok(())
    }

    fn train(&mut self, events: &[Event]) -> Result<()> {
        let ordinal = self.teacher_ordinal()?;
        if !self.configured {
            return Err(Error::invalid_state("options must be processed before training"));
        }

        if !is_trusted(ordinal) {
            self.artifact = PathBuf::from(UNTRAINED_ARTIFACT);
            warn!("{} is not the first teacher instance, training skipped", self.title);
            return Err(Error::ResourceClaimed {
                owner: self.backend.engine.owner().unwrap_or(0),
                requested: ordinal,
            });
        }

        if events.is_empty() {
            return Err(Error::config("no training events available"));
        }
        let n_variables = self.dataset.n_variables();
        if let Some(short) = events.iter().position(|e| e.values.len() < n_variables) {
            return Err(Error::config(format!(
                "training event {} has {} values, expected {}",
                short,
                events[short].values.len(),
                n_variables
            )));
        }

        self.run_training(ordinal, events)?;
        self.state = MethodState::Trained;

        if self.settings.run_analysis {
            let analysis = PostTrainingAnalysis {
                job: self.job.clone(),
                method: self.title.clone(),
                log_file: self.backend.config.log_file.clone(),
                toolset_env: self.backend.config.toolset_env.clone(),
                output_dir: self.backend.config.analysis_dir.clone(),
            };
            let labels = self.plan.labels(&self.dataset);
            let outcome = analysis.run(&self.backend.engine, ordinal, &labels, self.backend.runner.as_ref())?;
            if outcome == AnalysisOutcome::Skipped {
                self.settings.run_analysis = false;
            }
        }

        // Set up the expert right away so the method can evaluate
        self.expert = Some(self.backend.experts.load(&self.artifact)?);
        self.state = MethodState::Ready;
        Ok(())
    }

    fn evaluate(&self, event: &Event) -> Result<f64> {
        let expert = match (&self.expert, self.state) {
            (Some(expert), MethodState::Ready) => expert,
            _ => {
                return Err(Error::invalid_state(format!(
                    "{} has no trained expert to evaluate with",
                    self.title
                )))
            }
        };

        let n_variables = self.dataset.n_variables();
        if event.values.len() < n_variables {
            return Err(Error::config(format!(
                "event has {} values, expected {}",
                event.values.len(),
                n_variables
            )));
        }
        let inputs: Vec<f64> = event.values[..n_variables].iter().map(|v| f64::from(*v)).collect();
        Ok(expert.evaluate(&inputs))
    }

    fn write_reference(&self) -> ReferenceRecord {
        ReferenceRecord::new(self.dataset.n_variables(), self.artifact.clone())
    }

    fn read_reference(&mut self, record: &ReferenceRecord) -> Result<()> {
        if record.n_variables != self.dataset.n_variables() {
            return Err(Error::config(format!(
                "reference was written for {} variables, dataset declares {}",
                record.n_variables,
                self.dataset.n_variables()
            )));
        }

        info!("Setting up NB expert {}", record.artifact.display());
        if record.is_untrained() {
            warn!(
                "{} is not trained because it was not the first booked NeuroBayes teacher. Please repeat training.",
                self.title
            );
            self.artifact = record.artifact.clone();
            self.expert = None;
            return Ok(());
        }

        self.expert = Some(self.backend.experts.load(&record.artifact)?);
        self.artifact = record.artifact.clone();
        self.state = MethodState::Ready;
        info!("Set up NB expert done");
        Ok(())
    }

    fn create_ranking(&self) -> Option<Ranking> {
        None
    }

    fn help_message(&self) -> String {
        "NeuroBayes help can be found at www.neurobayes.de".to_string()
    }
}
