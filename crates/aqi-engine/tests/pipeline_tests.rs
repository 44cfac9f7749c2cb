//! End-to-end tests: synthesize, train, persist, reload and predict

use aqi_engine::{
    artifacts, dataset, synth, AqiCategory, EngineError, FeatureVector, LazyPredictor,
    ModelVariant, Trainer,
};
use tempfile::TempDir;

fn typical_reading() -> FeatureVector {
    FeatureVector::new(50.0, 70.0, 40.0, 20.0, 1.2, 45.0, 25.0, 65.0).unwrap()
}

fn trained_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    let ds = synth::generate(synth::DEFAULT_SAMPLES, synth::DEFAULT_SEED).unwrap();
    let models = Trainer::default().train(&ds).unwrap();
    artifacts::save(dir.path(), &models).unwrap();
    dir
}

#[test]
fn test_typical_reading_is_moderate_range() {
    let dir = trained_dir();
    let predictor = LazyPredictor::from_dir(dir.path());
    assert!(!predictor.is_loaded());

    let p = predictor.get().unwrap();
    assert!(predictor.is_loaded());
    assert!(p.training_id().is_some());

    let v = typical_reading();
    for variant in ModelVariant::ALL {
        let aqi = p.predict(&v, variant);
        assert!((30.0..=90.0).contains(&aqi), "{} predicted {}", variant, aqi);
        assert_eq!(aqi, p.predict(&v, variant));
    }

    let both = p.predict_both(&v);
    assert!(matches!(
        both.linear.category,
        AqiCategory::Good | AqiCategory::Moderate
    ));
}

#[test]
fn test_reload_gives_identical_predictions() {
    let dir = trained_dir();
    let first = LazyPredictor::from_dir(dir.path()).get().unwrap();
    let second = LazyPredictor::from_dir(dir.path()).get().unwrap();

    let v = typical_reading();
    assert_eq!(first.predict_both(&v), second.predict_both(&v));
}

#[test]
fn test_predictions_always_on_scale() {
    let dir = trained_dir();
    let p = LazyPredictor::from_dir(dir.path()).get().unwrap();

    let probe = synth::generate(200, 1234).unwrap();
    for row in probe.features() {
        let v = FeatureVector::from_array(*row).unwrap();
        let both = p.predict_both(&v);
        assert!((0.0..=500.0).contains(&both.linear.aqi));
        assert!((0.0..=500.0).contains(&both.tree.aqi));
        assert_eq!(both.linear.category, AqiCategory::categorize(both.linear.aqi));
    }
}

#[test]
fn test_dataset_file_round_trip_then_train() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("aqi_dataset.csv");

    let generated = dataset::load_or_generate(&path, 300, synth::DEFAULT_SEED).unwrap();
    assert!(path.exists());
    let reloaded = dataset::load_or_generate(&path, 10, 0).unwrap();
    assert_eq!(reloaded.len(), 300);
    assert_eq!(generated, reloaded);

    let a = Trainer::default().train(&generated).unwrap();
    let b = Trainer::default().train(&reloaded).unwrap();
    assert_eq!(a.linear, b.linear);
    assert_eq!(a.tree, b.tree);
}

#[test]
fn test_generation_is_deterministic() {
    let a = synth::generate(100, 42).unwrap();
    let b = synth::generate(100, 42).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, synth::generate(100, 43).unwrap());
}

#[test]
fn test_untrained_directory_reports_unavailable() {
    let dir = TempDir::new().unwrap();
    let predictor = LazyPredictor::from_dir(dir.path().join("missing"));
    let err = predictor.get().unwrap_err();
    assert!(matches!(err, EngineError::ModelsUnavailable { .. }));
    assert!(!err.is_client_error());
}
