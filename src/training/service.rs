//! Training pipeline: split, fit the scaler once, train both classifiers, evaluate.

use std::time::Instant;

use crate::common::config::{AppCfg, TrainingCfg};
use crate::common::error::{ScreenError, ScreenResult};
use crate::common::ids::Fingerprint;
use crate::common::time;
use crate::data::domain::{CohortRepo, LabeledRecord};
use crate::data::repo_fs::{to_csv_bytes, FsCohortRepo};
use crate::data::service::generate_cohort;
use crate::evaluation::domain::ClassificationReport;
use crate::evaluation::service::{evaluate, train_test_split};
use crate::features::{feature_matrix, FeatureVector, ScaledFeatures, ScalingTransform};

use super::domain::{Manifest, ModelKind, ModelRepo, TrainedArtifacts, Trainer};
use super::forest::{ForestParams, ForestTrainer, RandomForestClassifier};
use super::repo_fs::FsModelRepo;

/// Train the scaler and both classifiers from a labeled cohort.
///
/// The scaler is fit on the training partition only and reused unchanged for
/// the held-out rows, exactly as serving will reuse it.
pub fn train_models(cohort: &[LabeledRecord], cfg: &TrainingCfg) -> ScreenResult<TrainedArtifacts> {
    let start = Instant::now();
    if cohort.is_empty() {
        return Err(ScreenError::degenerate("empty cohort"));
    }

    let features = feature_matrix(cohort);
    let (train_idx, test_idx) = train_test_split(cohort.len(), cfg.test_fraction, cfg.split_seed)?;
    let pick = |idx: &[usize]| -> Vec<FeatureVector> { idx.iter().map(|&i| features[i]).collect() };
    let train_rows = pick(&train_idx);
    let test_rows = pick(&test_idx);

    let scaler = ScalingTransform::fit(&train_rows)?;
    let x_train = scaler.transform_all(&train_rows)?;
    let x_test = scaler.transform_all(&test_rows)?;

    let trainer = ForestTrainer::new(ForestParams::from(cfg));
    let (acute, acute_report) =
        fit_and_report(&trainer, ModelKind::Acute, cohort, &x_train, &train_idx, &x_test, &test_idx)?;
    let (stunting, stunting_report) = fit_and_report(
        &trainer,
        ModelKind::Stunting,
        cohort,
        &x_train,
        &train_idx,
        &x_test,
        &test_idx,
    )?;

    let fingerprint = Fingerprint::of(&to_csv_bytes(cohort)?);
    let created_ms = time::now_ms();
    let manifest = Manifest {
        version: format!("{}-{}", &fingerprint[..8], created_ms),
        created_ms,
        cohort_fingerprint: fingerprint,
        train_rows: train_idx.len(),
        test_rows: test_idx.len(),
        acute_report,
        stunting_report,
    };

    tracing::info!(
        ev = "training_complete",
        version = %manifest.version,
        train_rows = manifest.train_rows,
        test_rows = manifest.test_rows,
        dur_ms = time::elapsed_ms(start),
    );

    Ok(TrainedArtifacts {
        scaler,
        acute,
        stunting,
        manifest,
    })
}

fn labels_for(kind: ModelKind, record: &LabeledRecord) -> usize {
    match kind {
        ModelKind::Acute => record.labels.acute.label(),
        ModelKind::Stunting => usize::from(record.labels.stunting),
    }
}

fn fit_and_report(
    trainer: &ForestTrainer,
    kind: ModelKind,
    cohort: &[LabeledRecord],
    x_train: &[ScaledFeatures],
    train_idx: &[usize],
    x_test: &[ScaledFeatures],
    test_idx: &[usize],
) -> ScreenResult<(RandomForestClassifier, ClassificationReport)> {
    let start = Instant::now();
    let y_train: Vec<usize> = train_idx.iter().map(|&i| labels_for(kind, &cohort[i])).collect();
    let y_test: Vec<usize> = test_idx.iter().map(|&i| labels_for(kind, &cohort[i])).collect();

    let model = trainer.train(x_train, &y_train)?;
    tracing::info!(
        ev = "model_trained",
        model = kind.as_str(),
        rows = y_train.len(),
        trees = model.n_trees(),
        dur_ms = time::elapsed_ms(start),
    );

    let report = evaluate(&model, x_test, &y_test, &kind.class_names())?;
    tracing::info!(
        ev = "model_evaluated",
        model = kind.as_str(),
        accuracy = report.accuracy,
        macro_f1 = report.macro_f1,
    );
    tracing::debug!(model = kind.as_str(), "\n{report}");

    Ok((model, report))
}

/// Train from the cohort already persisted under `data_root`.
pub fn train_from_repo(
    cohorts: &dyn CohortRepo,
    models: &dyn ModelRepo,
    cfg: &TrainingCfg,
) -> ScreenResult<Manifest> {
    let cohort = cohorts.get_cohort()?;
    let artifacts = train_models(&cohort, cfg)?;
    models.put_artifacts(&artifacts)?;
    Ok(artifacts.manifest)
}

/// Generate a cohort, persist it, train, and persist all serving artefacts.
pub fn run_pipeline(cfg: &AppCfg) -> ScreenResult<Manifest> {
    cfg.validate()?;
    let cohort = generate_cohort(&cfg.generator, cfg.seed)?;
    let cohorts = FsCohortRepo::new(cfg);
    cohorts.put_cohort(&cohort)?;
    train_from_repo(&cohorts, &FsModelRepo::new(cfg), &cfg.training)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::GeneratorCfg;
    use crate::data::service::CohortGenerator;
    use crate::training::domain::Classifier;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::tempdir;

    fn small_cfg() -> TrainingCfg {
        TrainingCfg {
            n_estimators: 15,
            max_depth: Some(8),
            ..TrainingCfg::default()
        }
    }

    fn cohort(noise: f64, n: usize) -> Vec<LabeledRecord> {
        CohortGenerator::new(noise)
            .unwrap()
            .generate(n, &mut StdRng::seed_from_u64(21))
    }

    #[test]
    fn noise_free_acute_model_is_accurate() {
        let artifacts = train_models(&cohort(0.0, 1000), &small_cfg()).unwrap();
        assert_eq!(artifacts.manifest.train_rows, 800);
        assert_eq!(artifacts.manifest.test_rows, 200);
        assert!(
            artifacts.manifest.acute_report.accuracy > 0.9,
            "acute accuracy {}",
            artifacts.manifest.acute_report.accuracy
        );
        assert_eq!(artifacts.acute.n_features(), 7);
        assert_eq!(artifacts.stunting.classes(), &[0, 1]);
    }

    #[test]
    fn training_is_reproducible() {
        let data = cohort(0.05, 300);
        let a = train_models(&data, &small_cfg()).unwrap();
        let b = train_models(&data, &small_cfg()).unwrap();
        assert_eq!(a.scaler, b.scaler);
        assert_eq!(a.acute, b.acute);
        assert_eq!(a.manifest.cohort_fingerprint, b.manifest.cohort_fingerprint);
        assert_eq!(a.manifest.acute_report, b.manifest.acute_report);
    }

    #[test]
    fn empty_cohort_is_degenerate() {
        assert!(matches!(
            train_models(&[], &small_cfg()),
            Err(ScreenError::DegenerateTraining(_))
        ));
    }

    #[test]
    fn single_class_target_is_degenerate() {
        // every child normal, never stunted
        let mut data = cohort(0.0, 50);
        for r in &mut data {
            r.record.muac = 150.0;
            r.record.height = 200.0;
            r.labels.acute = crate::data::domain::AcuteClass::Normal;
            r.labels.stunting = false;
        }
        assert!(matches!(
            train_models(&data, &small_cfg()),
            Err(ScreenError::DegenerateTraining(_))
        ));
    }

    #[test]
    fn pipeline_writes_cohort_and_artifacts() {
        let dir = tempdir().unwrap();
        let cfg = AppCfg {
            data_root: dir.path().display().to_string(),
            seed: Some(4),
            generator: GeneratorCfg {
                cohort_size: 250,
                noise_rate: 0.05,
            },
            training: small_cfg(),
            ..AppCfg::default()
        };
        let manifest = run_pipeline(&cfg).unwrap();
        assert!(dir.path().join("raw/cohort.csv").exists());

        let repo = FsModelRepo::new(&cfg);
        let loaded = repo.get_artifacts().unwrap();
        assert_eq!(loaded.manifest, manifest);
        assert_eq!(loaded.scaler.columns().len(), 7);
    }
}
