//! Hyper-parameter search for the rule-induction base model.

use crate::base_model::check_xy;
use crate::config::OptimizerConfig;
use crate::cv::{Fold, StratifiedKFold, cross_val_score};
use crate::error::{OptimizerError, Result, ResultExt};
use crate::space::{ParamValue, SearchSpace};
use crate::sparse::CsrMatrix;
use optimizer::sampler::tpe::TpeSampler;
use optimizer::{Direction, Objective, Study, Trial};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use tracing::{debug, info, warn};

/// Random evaluations before the search starts modelling the objective.
pub const N_INITIAL_POINTS: usize = 10;

/// Bayesian search for the best base model of rule induction.
///
/// Candidates are drawn by a tree-structured Parzen estimator: the first
/// [`N_INITIAL_POINTS`] at random, the rest from the density of the best
/// scores seen so far.
///
/// # Example
///
/// ```no_run
/// use style_optimizer::{CsrMatrix, Optimizer, OptimizerConfig};
///
/// # fn run(x: CsrMatrix, y: Vec<usize>) -> style_optimizer::Result<()> {
/// let optimizer = Optimizer::new(OptimizerConfig::builder().n_iter(30).build()?);
/// let (score, params) = optimizer.optimize(&x, &y)?;
/// println!("accuracy {:.3} with {}", score, params["base_model_name"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Optimizer {
    config: OptimizerConfig,
    space: SearchSpace,
}

impl Optimizer {
    /// Create an optimizer. Fewer than 10 iterations are raised to 10.
    pub fn new(mut config: OptimizerConfig) -> Self {
        if config.n_iter < N_INITIAL_POINTS {
            warn!(
                "n_iter = {} is below the minimum of {}; using {}",
                config.n_iter, N_INITIAL_POINTS, N_INITIAL_POINTS
            );
            config.n_iter = N_INITIAL_POINTS;
        }
        Self {
            config,
            space: SearchSpace::base_model(),
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Number of objective evaluations.
    pub fn n_iter(&self) -> usize {
        self.config.n_iter
    }

    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    /// Search for the parameters with the best cross-validated accuracy.
    ///
    /// Returns the best mean accuracy and its parameters, keyed by name.
    /// The parameters always include `base_model_name`.
    ///
    /// # Errors
    ///
    /// - [`OptimizerError::InvalidData`] if `x` and `y` disagree, are empty,
    ///   or every class has fewer samples than `cv_folds`
    /// - [`OptimizerError::Model`] if a candidate cannot be fitted
    /// - [`OptimizerError::ThreadPool`] if the worker pool cannot start
    pub fn optimize(
        &self,
        x: &CsrMatrix,
        y: &[usize],
    ) -> Result<(f64, BTreeMap<String, ParamValue>)> {
        check_xy(x, y)?;
        let folds = StratifiedKFold::new(self.config.cv_folds)?.split(y)?;

        let (n_samples, n_features) = x.shape();
        info!(
            "Optimizing base model on {} samples x {} features: {} iterations, {} folds",
            n_samples, n_features, self.config.n_iter, self.config.cv_folds
        );

        // 0 lets rayon use every core.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.n_jobs.unwrap_or(0))
            .build()?;

        let sampler = TpeSampler::builder()
            .n_startup_trials(N_INITIAL_POINTS)
            .seed(self.config.random_state)
            .build()?;
        let study: Study<f64> = Study::with_sampler(Direction::Maximize, sampler);

        let objective = CrossValidation {
            space: &self.space,
            x,
            y,
            folds: &folds,
            pool: &pool,
            random_state: self.config.random_state,
            failure: RefCell::new(None),
        };
        let searched = study.optimize(self.config.n_iter, &objective);
        if let Some(err) = objective.failure.into_inner() {
            return Err(err);
        }
        searched?;

        let best = study.best_trial()?;
        let params = self.space.decode(&best)?;
        info!("Best accuracy {:.4} with {}", best.value, params);
        Ok((best.value, params.to_params()))
    }
}

/// Mean cross-validated accuracy of the candidate a trial suggests.
///
/// The study records a failed evaluation and moves on; the first failure is
/// kept here instead and ends the search.
struct CrossValidation<'a> {
    space: &'a SearchSpace,
    x: &'a CsrMatrix,
    y: &'a [usize],
    folds: &'a [Fold],
    pool: &'a rayon::ThreadPool,
    random_state: u64,
    failure: RefCell<Option<OptimizerError>>,
}

impl CrossValidation<'_> {
    fn score(&self, trial: &mut Trial) -> Result<f64> {
        let params = self.space.suggest(trial)?;
        let (x, y, folds, random_state) = (self.x, self.y, self.folds, self.random_state);
        let scores = self
            .pool
            .install(|| cross_val_score(&params, x, y, folds, random_state))
            .context(format!("While evaluating {}", params))?;
        let accuracy = scores.iter().sum::<f64>() / scores.len() as f64;
        debug!("accuracy {:.4} for {}", accuracy, params);
        Ok(accuracy)
    }
}

impl Objective<f64> for &CrossValidation<'_> {
    type Error = String;

    fn evaluate(&self, trial: &mut Trial) -> std::result::Result<f64, String> {
        self.score(trial).map_err(|err| {
            let message = err.to_string();
            self.failure.borrow_mut().get_or_insert(err);
            message
        })
    }

    fn before_trial(&self, _study: &Study<f64>) -> ControlFlow<()> {
        if self.failure.borrow().is_some() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_clamps_n_iter() {
        let config = OptimizerConfig::builder().n_iter(25).build().unwrap();
        assert_eq!(Optimizer::new(config).n_iter(), 25);
    }

    #[test]
    fn test_clamping_is_logged() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let config = OptimizerConfig::builder().n_iter(3).build().unwrap();
        let optimizer = tracing::subscriber::with_default(subscriber, || Optimizer::new(config));
        assert_eq!(optimizer.n_iter(), 10);

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"), "{}", output);
        assert!(
            output.contains("n_iter = 3 is below the minimum of 10; using 10"),
            "{}",
            output
        );
    }

    #[test]
    fn test_optimize_rejects_mismatched_data() {
        let x = CsrMatrix::from_dense(&[vec![1.0], vec![2.0]], 1).unwrap();
        let optimizer = Optimizer::new(OptimizerConfig::default());
        assert!(matches!(
            optimizer.optimize(&x, &[0]),
            Err(OptimizerError::InvalidData(_))
        ));
        // no class has the 3 members needed for 3 folds
        assert!(matches!(
            optimizer.optimize(&x, &[0, 1]),
            Err(OptimizerError::InvalidData(_))
        ));
    }

    #[test]
    fn test_first_failure_ends_the_search() {
        // one feature row more than there are labels
        let x = CsrMatrix::from_dense(&[vec![1.0], vec![2.0], vec![3.0]], 1).unwrap();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let space = SearchSpace::base_model();
        let folds = vec![(vec![0], vec![1])];
        let objective = CrossValidation {
            space: &space,
            x: &x,
            y: &[0, 1],
            folds: &folds,
            pool: &pool,
            random_state: 0,
            failure: RefCell::new(None),
        };
        let study: Study<f64> = Study::new(Direction::Maximize);
        assert!(matches!(
            study.optimize(10, &objective),
            Err(optimizer::Error::NoCompletedTrials)
        ));
        assert_eq!(study.n_trials(), 0);
        let failure = objective.failure.into_inner().unwrap();
        assert_eq!(failure.error_code(), "INVALID_DATA");
    }
}
