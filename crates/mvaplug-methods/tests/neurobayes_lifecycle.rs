//! NeuroBayes adapter lifecycle tests
//!
//! Drives the adapter through construct / declare / process / train /
//! persist / reload / evaluate against the recording mock engine.


use mock_engine::{MockExpertLoader, MockTeacher, RecordedEvent, Recording, RecordingRunner};
use mvaplug_core::{AnalysisType, DataSetInfo, Error, Event, EventClass};
use mvaplug_methods::engine::{Regularisation, TeacherEngine, Topology, TrainingMethod};
use mvaplug_methods::method::{Method, MethodArgs, MethodMode, MethodState};
use mvaplug_methods::neurobayes::{BackendConfig, NeuroBayesBackend, NeuroBayesMethod};
use mvaplug_methods::reference::ReferenceRecord;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

struct Harness {
    backend: NeuroBayesBackend,
    recording: Arc<Mutex<Recording>>,
    experts: Arc<MockExpertLoader>,
    runner: Arc<RecordingRunner>,
    dir: TempDir,
}

fn harness_with(teacher: MockTeacher, recording: Arc<Mutex<Recording>>, toolset_env: &str) -> Harness {
    let dir = TempDir::new().unwrap();
    let experts = Arc::new(MockExpertLoader::default());
    let runner = Arc::new(RecordingRunner::default());

    let config = BackendConfig {
        weights_dir: dir.path().join("weights"),
        log_file: dir.path().join("nb_teacher.log"),
        toolset_env: toolset_env.to_string(),
        analysis_dir: dir.path().to_path_buf(),
    };

    let backend = NeuroBayesBackend::new(Box::new(teacher), experts.clone())
        .with_config(config)
        .with_runner(runner.clone());

    Harness {
        backend,
        recording,
        experts,
        runner,
        dir,
    }
}

fn harness() -> Harness {
    let (teacher, recording) = MockTeacher::new();
    harness_with(teacher, recording, "MVAPLUG_TEST_TOOLSET_NEVER_SET")
}

fn three_vars() -> DataSetInfo {
    DataSetInfo::new("ds", ["a", "b", "c"])
}

fn teacher(backend: &NeuroBayesBackend, title: &str, dataset: DataSetInfo, options: &str) -> NeuroBayesMethod {
    backend.create(MethodArgs::Teacher {
        job: "Job".to_string(),
        title: title.to_string(),
        dataset,
        options: options.to_string(),
    })
}

fn sample_events() -> Vec<Event> {
    vec![
        Event::new(vec![1.0, 2.0, 3.0], EventClass::Signal).with_weight(2.0),
        Event::new(vec![4.0, 5.0, 6.0], EventClass::Background),
        Event::new(vec![7.0, 8.0, 9.0], EventClass::Signal),
        Event::new(vec![0.5, 0.5, 0.5], EventClass::Background).with_weight(0.5),
    ]
}

fn configured(method: &mut NeuroBayesMethod) {
    method.declare_options().unwrap();
    method.process_options().unwrap();
}

#[test]
fn test_ordinals_follow_construction_order() {
    let h = harness();

    let methods: Vec<NeuroBayesMethod> = (0..4)
        .map(|i| teacher(&h.backend, &format!("NB{}", i), three_vars(), ""))
        .collect();

    let ordinals: Vec<Option<u32>> = methods.iter().map(|m| m.ordinal()).collect();
    assert_eq!(ordinals, vec![Some(0), Some(1), Some(2), Some(3)]);

    let trusted: Vec<bool> = methods.iter().map(|m| m.is_trusted()).collect();
    assert_eq!(trusted, vec![true, false, false, false]);

    // Reloaded instances take no ordinal
    let expert = h.backend.create(MethodArgs::Expert {
        dataset: three_vars(),
        weight_file: "weights/Job_NB0.weights".to_string(),
    });
    assert_eq!(expert.ordinal(), None);
    assert_eq!(h.backend.ordinals().issued(), 4);
}

#[test]
fn test_declared_options_and_defaults() {
    let h = harness();
    let mut method = teacher(&h.backend, "NeuroBayes", three_vars(), "");
    method.declare_options().unwrap();
    assert_eq!(method.state(), MethodState::OptionsDeclared);

    let names: Vec<&str> = method.options().specs().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names.len(), 13);
    assert!(names.contains(&"IndividualPreprocessingByName"));

    method.process_options().unwrap();
    let settings = method.settings();
    assert!(settings.run_analysis);
    assert_eq!(settings.regularisation, Regularisation::Reg);
    assert_eq!(settings.preprocessing, 112);
    assert_eq!(settings.weight_update_interval, 200);
    assert_eq!(settings.iterations, 100);
    assert_eq!(settings.training_method, TrainingMethod::NoBfgs);
}

#[test]
fn test_process_options_configures_once() {
    let h = harness();
    let mut method = teacher(
        &h.backend,
        "NeuroBayes",
        three_vars(),
        "TrainingIterations=50:Regularisation=ARD:IndividualPreprocessingByIndex=12.1.2,0,7",
    );

    configured(&mut method);
    {
        let rec = h.recording.lock().unwrap();
        assert_eq!(rec.global_config_calls, 10);
        assert_eq!(rec.iterations, Some(50));
        assert_eq!(rec.regularisation, Some(Regularisation::Ard));
        assert_eq!(rec.individual_flags, vec![(0, 12), (2, 7)]);
        assert_eq!(rec.individual_params, vec![(0, 0, 1), (0, 1, 2)]);
    }

    // Second call is a no-op
    method.process_options().unwrap();
    let rec = h.recording.lock().unwrap();
    assert_eq!(rec.global_config_calls, 10);
    assert_eq!(rec.individual_flags.len(), 2);
    assert_eq!(method.state(), MethodState::OptionsProcessed);
}

#[test]
fn test_process_options_without_declare_declares() {
    let h = harness();
    let mut method = teacher(&h.backend, "NeuroBayes", three_vars(), "Momentum=0.5");
    method.process_options().unwrap();
    assert!(!method.options().is_empty());
    assert_eq!(h.recording.lock().unwrap().momentum, Some(0.5));
}

#[test]
fn test_positional_count_mismatch_is_fatal() {
    let h = harness();
    let mut method = teacher(
        &h.backend,
        "NeuroBayes",
        three_vars(),
        "IndividualPreprocessingByIndex=12,7",
    );
    method.declare_options().unwrap();

    let err = method.process_options().unwrap_err();
    assert!(err.is_config());
    assert_eq!(h.recording.lock().unwrap().global_config_calls, 0);
}

#[test]
fn test_name_keyed_directives() {
    let h = harness();
    let mut method = teacher(
        &h.backend,
        "NeuroBayes",
        DataSetInfo::new("ds", ["pt", "eta"]),
        "IndividualPreprocessingByName=pt=5.3,missing=2",
    );
    configured(&mut method);

    let rec = h.recording.lock().unwrap();
    assert_eq!(rec.individual_flags, vec![(0, 5)]);
    assert_eq!(rec.individual_params, vec![(0, 0, 3)]);
    assert!(method.preprocessing().get(1).is_none());
    assert_eq!(method.preprocessing().unresolved(), &["missing".to_string()]);
}

#[test]
fn test_both_directive_encodings_rejected() {
    let h = harness();
    let mut method = teacher(
        &h.backend,
        "NeuroBayes",
        DataSetInfo::new("ds", ["pt"]),
        "IndividualPreprocessingByIndex=12:IndividualPreprocessingByName=pt=12",
    );
    method.declare_options().unwrap();
    assert!(method.process_options().unwrap_err().is_config());
}

#[test]
fn test_unknown_option_rejected() {
    let h = harness();
    let mut method = teacher(&h.backend, "NeuroBayes", three_vars(), "Dropout=0.2");
    method.declare_options().unwrap();
    assert!(method.process_options().unwrap_err().is_config());
}

#[test]
fn test_train_feeds_every_event_and_evaluates() {
    let h = harness();
    let mut method = teacher(&h.backend, "NeuroBayes", three_vars(), "!RunAnalysis");
    configured(&mut method);

    method.train(&sample_events()).unwrap();
    assert_eq!(method.state(), MethodState::Ready);

    let artifact = h.dir.path().join("weights/Job_NeuroBayes.NB_weights.nb");
    assert_eq!(method.artifact(), artifact.as_path());

    {
        let rec = h.recording.lock().unwrap();
        assert_eq!(rec.train_calls, 1);
        assert_eq!(rec.output_file.as_ref(), Some(&artifact));
        assert_eq!(
            rec.topology,
            Some(Topology {
                input: 4,
                hidden: 5,
                output: 1
            })
        );
        assert_eq!(rec.task.as_deref(), Some("CLA"));
        assert_eq!(rec.seed, Some((4701, 21)));
        assert_eq!(
            rec.events,
            vec![
                RecordedEvent {
                    weight: 2.0,
                    target: 1.0,
                    inputs: vec![1.0, 2.0, 3.0]
                },
                RecordedEvent {
                    weight: 1.0,
                    target: 0.0,
                    inputs: vec![4.0, 5.0, 6.0]
                },
                RecordedEvent {
                    weight: 1.0,
                    target: 1.0,
                    inputs: vec![7.0, 8.0, 9.0]
                },
                RecordedEvent {
                    weight: 0.5,
                    target: 0.0,
                    inputs: vec![0.5, 0.5, 0.5]
                },
            ]
        );
    }

    let log = std::fs::read_to_string(h.dir.path().join("nb_teacher.log")).unwrap();
    assert!(log.contains("training on 4 events"));
    assert!(log.contains("training done"));

    assert_eq!(h.experts.loaded(), vec![artifact]);
    assert!(h.runner.commands().is_empty());

    let score = method
        .evaluate(&Event::new(vec![1.0, 2.0, 3.0], EventClass::Background))
        .unwrap();
    assert_eq!(score, 2.0);
}

#[test]
fn test_failed_training_keeps_log() {
    let (teacher_engine, recording) = MockTeacher::new();
    let h = harness_with(teacher_engine.failing(), recording, "MVAPLUG_TEST_TOOLSET_NEVER_SET");
    let mut method = teacher(&h.backend, "NeuroBayes", three_vars(), "!RunAnalysis");
    configured(&mut method);

    let err = method.train(&sample_events()).unwrap_err();
    assert!(matches!(err, Error::Engine(_)));
    assert_ne!(method.state(), MethodState::Ready);

    let log = std::fs::read_to_string(h.dir.path().join("nb_teacher.log")).unwrap();
    assert_eq!(log, "training on 4 events\n");
    assert!(h.experts.loaded().is_empty());
}

#[test]
fn test_train_requires_events() {
    let h = harness();
    let mut method = teacher(&h.backend, "NeuroBayes", three_vars(), "!RunAnalysis");
    configured(&mut method);
    assert!(method.train(&[]).unwrap_err().is_config());

    let short = vec![Event::new(vec![1.0], EventClass::Signal)];
    assert!(method.train(&short).unwrap_err().is_config());
}

#[test]
fn test_train_requires_processed_options() {
    let h = harness();
    let mut method = teacher(&h.backend, "NeuroBayes", three_vars(), "");
    assert!(matches!(
        method.train(&sample_events()),
        Err(Error::InvalidState(_))
    ));
}

#[test]
fn test_second_instance_cannot_train() {
    let h = harness();
    let mut first = teacher(&h.backend, "NB_first", three_vars(), "!RunAnalysis");
    let mut second = teacher(&h.backend, "NB_second", three_vars(), "!RunAnalysis:TrainingIterations=7");

    configured(&mut first);
    configured(&mut second);

    // Only the first instance reached the engine
    {
        let rec = h.recording.lock().unwrap();
        assert_eq!(rec.global_config_calls, 10);
        assert_eq!(rec.iterations, Some(100));
    }
    assert_eq!(second.settings().iterations, 7);

    match second.train(&sample_events()) {
        Err(Error::ResourceClaimed { owner, requested }) => {
            assert_eq!(owner, 0);
            assert_eq!(requested, 1);
        }
        other => panic!("expected ResourceClaimed, got {:?}", other.err()),
    }
    assert!(second.write_reference().is_untrained());
    assert!(h.recording.lock().unwrap().events.is_empty());

    first.train(&sample_events()).unwrap();
    assert!(!first.write_reference().is_untrained());
}

#[test]
fn test_reference_reload_for_inference() {
    let h = harness();
    let mut trained = teacher(&h.backend, "NeuroBayes", three_vars(), "!RunAnalysis");
    configured(&mut trained);
    trained.train(&sample_events()).unwrap();

    let xml = trained.write_reference().to_xml().unwrap();
    let record = ReferenceRecord::from_xml(&xml).unwrap();
    assert_eq!(record.n_variables, 3);
    assert_eq!(record.artifact, trained.artifact());

    let mut expert = h.backend.create(MethodArgs::Expert {
        dataset: three_vars(),
        weight_file: "weights/Job_NeuroBayes.xml".to_string(),
    });
    assert_eq!(expert.mode(), MethodMode::Expert);
    assert_eq!(expert.method_title(), "NeuroBayes");
    assert_eq!(expert.state(), MethodState::Constructed);

    expert.read_reference(&record).unwrap();
    assert_eq!(expert.state(), MethodState::Ready);

    let event = Event::new(vec![3.0, 3.0, 3.0], EventClass::Signal);
    assert_eq!(expert.evaluate(&event).unwrap(), 3.0);
    assert_eq!(expert.evaluate(&event).unwrap(), trained.evaluate(&event).unwrap());
}

#[test]
fn test_sentinel_reload_is_not_evaluable() {
    let h = harness();
    let mut expert = h.backend.create(MethodArgs::Expert {
        dataset: three_vars(),
        weight_file: "weights/Job_NeuroBayes.xml".to_string(),
    });

    expert.read_reference(&ReferenceRecord::untrained(3)).unwrap();
    assert_ne!(expert.state(), MethodState::Ready);
    assert!(h.experts.loaded().is_empty());

    let event = Event::new(vec![1.0, 1.0, 1.0], EventClass::Signal);
    assert!(matches!(expert.evaluate(&event), Err(Error::InvalidState(_))));
}

#[test]
fn test_reference_variable_count_mismatch() {
    let h = harness();
    let mut expert = h.backend.create(MethodArgs::Expert {
        dataset: three_vars(),
        weight_file: "weights/Job_NeuroBayes.xml".to_string(),
    });
    let record = ReferenceRecord::new(2, "weights/Job_NeuroBayes.NB_weights.nb");
    assert!(expert.read_reference(&record).unwrap_err().is_config());
}

#[test]
fn test_evaluate_before_ready() {
    let h = harness();
    let method = teacher(&h.backend, "NeuroBayes", three_vars(), "");
    let event = Event::new(vec![1.0, 1.0, 1.0], EventClass::Signal);
    assert!(matches!(method.evaluate(&event), Err(Error::InvalidState(_))));
}

#[test]
fn test_expert_mode_ignores_process_options() {
    let h = harness();
    let mut expert = h.backend.create(MethodArgs::Expert {
        dataset: three_vars(),
        weight_file: "weights/Job_NeuroBayes.xml".to_string(),
    });
    expert.declare_options().unwrap();
    expert.process_options().unwrap();
    assert_eq!(h.recording.lock().unwrap().global_config_calls, 0);
    assert!(expert.train(&sample_events()).is_err());
}

#[test]
fn test_training_runs_analysis() {
    let (teacher_engine, recording) = MockTeacher::new();
    let env = "MVAPLUG_TEST_TOOLSET_LIFECYCLE";
    std::env::set_var(env, "/opt/neurobayes");
    let h = harness_with(teacher_engine, recording, env);

    let mut method = teacher(
        &h.backend,
        "NeuroBayes",
        three_vars(),
        "IndividualPreprocessingByIndex=12.1.2,0,7",
    );
    configured(&mut method);
    method.train(&sample_events()).unwrap();

    assert_eq!(
        h.recording.lock().unwrap().correlation_labels,
        vec!["a 12 1 2", "b", "c 7"]
    );
    assert!(h.dir.path().join("Jobcorrel_signi.txt").is_file());

    let commands = h.runner.commands();
    assert_eq!(commands.len(), 1);
    assert!(commands[0].starts_with("root -b -q /opt/neurobayes/external/analysis.C"));
    assert!(commands[0].contains("Job_NeuroBayes.pdf"));
    assert_eq!(method.state(), MethodState::Ready);
}

#[test]
fn test_training_analysis_without_toolset_is_fatal() {
    let h = harness();
    let mut method = teacher(&h.backend, "NeuroBayes", three_vars(), "RunAnalysis=T");
    configured(&mut method);

    let err = method.train(&sample_events()).unwrap_err();
    assert!(err.is_config());
    assert!(err.to_string().contains("MVAPLUG_TEST_TOOLSET_NEVER_SET"));
    assert!(h.runner.commands().is_empty());

    // No correlation tables without a toolset
    assert!(h.recording.lock().unwrap().correlation_labels.is_empty());
    assert!(!h.dir.path().join("Jobcorrel_signi.txt").exists());
}

#[test]
fn test_training_without_log_skips_analysis() {
    let dir = TempDir::new().unwrap();
    let (teacher_engine, recording) = MockTeacher::new();
    let teacher_engine = teacher_engine.removing_after_training(dir.path().join("nb_teacher.log"));
    let env = "MVAPLUG_TEST_TOOLSET_SKIPPED";
    std::env::set_var(env, "/opt/neurobayes");

    let h = harness_with(teacher_engine, recording, env);
    let config = BackendConfig {
        log_file: dir.path().join("nb_teacher.log"),
        ..h.backend.config().clone()
    };
    let backend = h.backend.clone().with_config(config);

    let mut method = teacher(&backend, "NeuroBayes", three_vars(), "RunAnalysis");
    configured(&mut method);
    assert!(method.settings().run_analysis);

    method.train(&sample_events()).unwrap();

    assert!(!method.settings().run_analysis);
    assert_eq!(method.state(), MethodState::Ready);
    assert!(h.runner.commands().is_empty());
    assert!(h.recording.lock().unwrap().correlation_labels.is_empty());
}

#[test]
fn test_capabilities() {
    let h = harness();
    let method = teacher(&h.backend, "NeuroBayes", three_vars(), "");
    assert!(method.has_analysis_type(AnalysisType::Classification, 2, 0));
    assert!(!method.has_analysis_type(AnalysisType::Classification, 3, 0));
    assert!(!method.has_analysis_type(AnalysisType::Regression, 2, 1));
    assert!(method.create_ranking().is_none());
    assert!(method.help_message().contains("neurobayes"));
    assert_eq!(method.name(), "NeuroBayes");
    assert_eq!(method.job_name(), "Job");
}

#[test]
fn test_pseudo_codegen_dump() {
    let h = harness();
    let mut method = teacher(
        &h.backend,
        "NeuroBayes",
        three_vars(),
        "IndividualPreprocessingByIndex=14,0,12.3",
    );
    configured(&mut method);

    let path: PathBuf = h.dir.path().join("pseudocodegen");
    method.dump_pseudo_codegen(&path).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        content,
        "VARSET 1\na 14\nb\nc 12 3\nENDVARSET\nNETWORK classify 1\n"
    );
}

#[test]
fn test_engine_trait_object_is_usable_directly() {
    let (mut engine, recording) = MockTeacher::new();
    let dyn_engine: &mut dyn TeacherEngine = &mut engine;
    dyn_engine.define_task("CLA");
    assert_eq!(recording.lock().unwrap().task.as_deref(), Some("CLA"));
}
