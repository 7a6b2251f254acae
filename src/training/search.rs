//! Randomized hyperparameter search
//!
//! Candidates are drawn up front from a seeded stream, each is scored by
//! cross-validation on a bounded rayon pool, and the best one is refit on the
//! whole training set.

use super::cross_validation::{CVResults, CVSplit, CVStrategy, CrossValidator};
use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::metrics::ClassificationReport;
use crate::config::ModelTrainingConfig;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

/// Distribution a hyperparameter is sampled from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamDistribution {
    /// Uniform integer in `[low, high]`
    Int { low: i64, high: i64 },
    /// Uniform float in `[low, high)`
    Float { low: f64, high: f64 },
    /// Log-uniform float in `[low, high)`
    LogFloat { low: f64, high: f64 },
    /// One of a fixed set of values
    Choice { values: Vec<f64> },
}

impl ParamDistribution {
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            ParamDistribution::Int { low, high } if low > high => {
                Err(format!("low ({}) must not exceed high ({})", low, high))
            }
            ParamDistribution::Float { low, high } if !(low.is_finite() && high.is_finite() && low <= high) => {
                Err(format!("invalid float range [{}, {}]", low, high))
            }
            ParamDistribution::LogFloat { low, high } if !(*low > 0.0 && high.is_finite() && low <= high) => {
                Err(format!("log range needs 0 < low <= high, got [{}, {}]", low, high))
            }
            ParamDistribution::Choice { values } if values.is_empty() => {
                Err("choice needs at least one value".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Sample a random value
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        match self {
            ParamDistribution::Int { low, high } => ParameterValue::Int(rng.gen_range(*low..=*high)),
            ParamDistribution::Float { low, high } => ParameterValue::Float(rng.gen::<f64>() * (high - low) + low),
            ParamDistribution::LogFloat { low, high } => {
                let (log_low, log_high) = (low.ln(), high.ln());
                ParameterValue::Float((rng.gen::<f64>() * (log_high - log_low) + log_low).exp())
            }
            ParamDistribution::Choice { values } => ParameterValue::Float(values[rng.gen_range(0..values.len())]),
        }
    }
}

/// Sampled parameter value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
}

impl ParameterValue {
    pub fn as_float(&self) -> f64 {
        match self {
            ParameterValue::Int(v) => *v as f64,
            ParameterValue::Float(v) => *v,
        }
    }

    pub fn as_int(&self) -> i64 {
        match self {
            ParameterValue::Int(v) => *v,
            ParameterValue::Float(v) => v.round() as i64,
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Sampled configuration
pub type TrialParams = BTreeMap<String, ParameterValue>;

/// Metric used to rank candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scoring {
    #[default]
    Accuracy,
    Precision,
    Recall,
    F1,
}

impl Scoring {
    pub fn score(&self, report: &ClassificationReport) -> f64 {
        match self {
            Scoring::Accuracy => report.accuracy,
            Scoring::Precision => report.precision,
            Scoring::Recall => report.recall,
            Scoring::F1 => report.f1,
        }
    }
}

/// Result of a single candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial_id: usize,
    pub params: TrialParams,
    pub cv: CVResults,
    pub duration_secs: f64,
}

/// Outcome of a completed search
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub trials: Vec<TrialResult>,
    pub best_trial_idx: usize,
    pub best_config: GradientBoostingConfig,
    /// Best configuration refit on the full training set
    pub model: GradientBoostingClassifier,
}

impl SearchOutcome {
    pub fn best_trial(&self) -> &TrialResult {
        &self.trials[self.best_trial_idx]
    }

    pub fn best_score(&self) -> f64 {
        self.best_trial().cv.mean_score
    }

    pub fn best_params(&self) -> &TrialParams {
        &self.best_trial().params
    }
}

/// Randomized search over gradient boosting hyperparameters
#[derive(Debug, Clone)]
pub struct RandomizedSearch {
    space: BTreeMap<String, ParamDistribution>,
    n_iter: usize,
    cv_folds: usize,
    scoring: Scoring,
    random_state: u64,
    n_jobs: usize,
}

impl RandomizedSearch {
    pub fn new(space: BTreeMap<String, ParamDistribution>) -> Self {
        Self::from_config(&ModelTrainingConfig {
            search_space: space,
            ..ModelTrainingConfig::default()
        })
    }

    pub fn from_config(config: &ModelTrainingConfig) -> Self {
        Self {
            space: config.search_space.clone(),
            n_iter: config.n_iter.max(1),
            cv_folds: config.cv_folds,
            scoring: config.scoring,
            random_state: config.random_state,
            n_jobs: config.n_jobs,
        }
    }

    pub fn with_n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter.max(1);
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    /// Draw `n_iter` configurations; parameter order is the map's key order
    pub fn sample_candidates(&self) -> Vec<TrialParams> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.random_state);
        (0..self.n_iter)
            .map(|_| {
                self.space
                    .iter()
                    .map(|(name, dist)| (name.clone(), dist.sample(&mut rng)))
                    .collect()
            })
            .collect()
    }

    /// Run the search and refit the winner on all of `x`
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<SearchOutcome> {
        let start = Instant::now();
        let candidates = self.sample_candidates();
        let configs = candidates
            .iter()
            .map(|params| GradientBoostingConfig::from_params(params, self.random_state))
            .collect::<Result<Vec<_>>>()?;

        let splits = CrossValidator::new(CVStrategy::StratifiedKFold {
            n_splits: self.cv_folds,
            shuffle: true,
        })
        .with_random_state(self.random_state)
        .split(x.nrows(), Some(y))?;

        info!(
            n_candidates = candidates.len(),
            n_folds = splits.len(),
            scoring = ?self.scoring,
            "Starting randomized search"
        );

        let mut builder = rayon::ThreadPoolBuilder::new();
        if self.n_jobs > 0 {
            builder = builder.num_threads(self.n_jobs);
        }
        let pool = builder
            .build()
            .map_err(|e| PipelineError::Validation(format!("failed to build worker pool: {}", e)))?;

        let trials: Vec<TrialResult> = pool.install(|| {
            configs
                .par_iter()
                .zip(candidates.par_iter())
                .enumerate()
                .map(|(trial_id, (config, params))| {
                    let trial_start = Instant::now();
                    let cv = self.cross_validate(config, x, y, &splits)?;
                    debug!(trial_id, score = cv.mean_score, "Candidate scored");
                    Ok(TrialResult {
                        trial_id,
                        params: params.clone(),
                        cv,
                        duration_secs: trial_start.elapsed().as_secs_f64(),
                    })
                })
                .collect::<Result<Vec<_>>>()
        })?;

        // Strictly greater keeps the earliest candidate on ties
        let mut best_trial_idx = 0;
        for (idx, trial) in trials.iter().enumerate() {
            if trial.cv.mean_score > trials[best_trial_idx].cv.mean_score {
                best_trial_idx = idx;
            }
        }

        let best_config = configs[best_trial_idx].clone();
        let mut model = GradientBoostingClassifier::new(best_config.clone());
        model.fit(x, y)?;

        info!(
            best_score = trials[best_trial_idx].cv.mean_score,
            best_trial = best_trial_idx,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Randomized search finished"
        );

        Ok(SearchOutcome {
            trials,
            best_trial_idx,
            best_config,
            model,
        })
    }

    fn cross_validate(
        &self,
        config: &GradientBoostingConfig,
        x: &Array2<f64>,
        y: &Array1<f64>,
        splits: &[CVSplit],
    ) -> Result<CVResults> {
        let mut scores = Vec::with_capacity(splits.len());
        for split in splits {
            let x_train = x.select(Axis(0), &split.train_indices);
            let y_train = y.select(Axis(0), &split.train_indices);
            let x_val = x.select(Axis(0), &split.test_indices);
            let y_val = y.select(Axis(0), &split.test_indices);

            let mut model = GradientBoostingClassifier::new(config.clone());
            model.fit(&x_train, &y_train)?;
            let report = ClassificationReport::compute(&y_val, &model.predict(&x_val)?)?;
            scores.push(self.scoring.score(&report));
        }
        Ok(CVResults::from_scores(scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((60, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 7) as f64 });
        let y: Array1<f64> = (0..60).map(|i| if i >= 30 { 1.0 } else { 0.0 }).collect();
        (x, y)
    }

    fn small_space() -> BTreeMap<String, ParamDistribution> {
        let mut space = BTreeMap::new();
        space.insert("n_estimators".to_string(), ParamDistribution::Int { low: 5, high: 15 });
        space.insert("max_depth".to_string(), ParamDistribution::Int { low: 1, high: 3 });
        space.insert(
            "learning_rate".to_string(),
            ParamDistribution::LogFloat { low: 0.05, high: 0.3 },
        );
        space
    }

    #[test]
    fn test_distribution_parses_from_yaml() {
        let dist: ParamDistribution = serde_yaml::from_str("type: int\nlow: 3\nhigh: 8\n").unwrap();
        assert_eq!(dist, ParamDistribution::Int { low: 3, high: 8 });

        let dist: ParamDistribution = serde_yaml::from_str("type: choice\nvalues: [0.1, 0.2]\n").unwrap();
        assert!(matches!(dist, ParamDistribution::Choice { .. }));
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        assert!(ParamDistribution::Int { low: 5, high: 1 }.validate().is_err());
        assert!(ParamDistribution::LogFloat { low: 0.0, high: 1.0 }.validate().is_err());
        assert!(ParamDistribution::Choice { values: vec![] }.validate().is_err());
        assert!(ParamDistribution::Float { low: 0.1, high: 0.2 }.validate().is_ok());
    }

    #[test]
    fn test_samples_stay_in_range() {
        let search = RandomizedSearch::new(small_space()).with_n_iter(20);
        for params in search.sample_candidates() {
            let n = params["n_estimators"].as_int();
            assert!((5..=15).contains(&n));
            let lr = params["learning_rate"].as_float();
            assert!((0.05..0.3).contains(&lr));
        }
    }

    #[test]
    fn test_candidates_are_seeded() {
        let a = RandomizedSearch::new(small_space()).with_random_state(1).sample_candidates();
        let b = RandomizedSearch::new(small_space()).with_random_state(1).sample_candidates();
        assert_eq!(a, b);
    }

    #[test]
    fn test_search_is_deterministic_across_pool_sizes() {
        let (x, y) = separable_data();
        let serial = RandomizedSearch::new(small_space()).with_n_iter(3).with_n_jobs(1);
        let parallel = RandomizedSearch::new(small_space()).with_n_iter(3).with_n_jobs(3);

        let a = serial.fit(&x, &y).unwrap();
        let b = parallel.fit(&x, &y).unwrap();

        assert_eq!(a.best_trial_idx, b.best_trial_idx);
        assert_eq!(a.best_params(), b.best_params());
        assert_eq!(a.best_score(), b.best_score());
        assert!(a.best_score() > 0.8);
        assert_eq!(a.trials.len(), 3);
    }

    #[test]
    fn test_unknown_parameter_fails() {
        let (x, y) = separable_data();
        let mut space = small_space();
        space.insert("gamma".to_string(), ParamDistribution::Float { low: 0.0, high: 1.0 });
        let err = RandomizedSearch::new(space).fit(&x, &y).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
