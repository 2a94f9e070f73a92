//! Stratified k-fold cross-validation.

use crate::base_model::{BaseModelParams, check_xy};
use crate::error::{OptimizerError, Result, ResultExt};
use crate::sparse::CsrMatrix;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::warn;

/// `(train, test)` sample indices of one fold, both sorted.
pub type Fold = (Vec<usize>, Vec<usize>);

/// Splits samples into `n_splits` folds that keep the class proportions.
///
/// The members of each class, in their original order, are cut into
/// `n_splits` contiguous chunks; the first `n_c % n_splits` chunks get one
/// extra sample. Fold `k` tests on chunk `k` of every class. A class with
/// fewer members than folds is simply missing from the test sets of the
/// last folds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StratifiedKFold {
    n_splits: usize,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Result<Self> {
        if n_splits < 2 {
            return Err(OptimizerError::InvalidConfig(format!(
                "need at least 2 folds, got {}",
                n_splits
            )));
        }
        Ok(Self { n_splits })
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Compute the folds for a label vector.
    ///
    /// Classes smaller than `n_splits` are logged as a warning.
    ///
    /// # Errors
    ///
    /// [`OptimizerError::InvalidData`] when every class has fewer members
    /// than there are folds.
    pub fn split(&self, y: &[usize]) -> Result<Vec<Fold>> {
        let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, &label) in y.iter().enumerate() {
            members.entry(label).or_default().push(i);
        }

        let largest = members.values().map(Vec::len).max().unwrap_or(0);
        if largest < self.n_splits {
            return Err(OptimizerError::InvalidData(format!(
                "n_splits = {} is greater than the number of members in each class",
                self.n_splits
            )));
        }
        let smallest = members.values().map(Vec::len).min().unwrap_or(0);
        if smallest < self.n_splits {
            warn!(
                "The least populated class has only {} members, which is less than n_splits = {}",
                smallest, self.n_splits
            );
        }

        let mut fold_of = vec![0usize; y.len()];
        for samples in members.values() {
            let base = samples.len() / self.n_splits;
            let extra = samples.len() % self.n_splits;
            let mut start = 0;
            for fold in 0..self.n_splits {
                let size = base + usize::from(fold < extra);
                for &sample in &samples[start..start + size] {
                    fold_of[sample] = fold;
                }
                start += size;
            }
        }

        Ok((0..self.n_splits)
            .map(|fold| {
                let split: Fold = (0..y.len()).partition(|&sample| fold_of[sample] != fold);
                split
            })
            .collect())
    }
}

/// Accuracy of `params` on every fold, folds evaluated in parallel on the
/// current rayon pool.
pub fn cross_val_score(
    params: &BaseModelParams,
    x: &CsrMatrix,
    y: &[usize],
    folds: &[Fold],
    random_state: u64,
) -> Result<Vec<f64>> {
    check_xy(x, y)?;

    folds
        .par_iter()
        .enumerate()
        .map(|(k, (train, test))| {
            let model = params
                .fit(x, y, train, random_state)
                .context(format!("While fitting fold {}", k))?;
            let predicted = model.predict(x, test)?;
            let correct = test
                .iter()
                .zip(&predicted)
                .filter(|&(&sample, &label)| y[sample] == label)
                .count();
            Ok(correct as f64 / test.len() as f64)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_model::{BaseModelKind, MaxFeatures};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn tree() -> BaseModelParams {
        BaseModelParams {
            kind: BaseModelKind::DecisionTree,
            max_depth: None,
            max_features: MaxFeatures::All,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }

    #[test]
    fn test_split_layout() {
        let cv = StratifiedKFold::new(2).unwrap();
        let folds = cv.split(&[0, 0, 1, 1, 0, 1, 0]).unwrap();
        // class 0 = [0, 1, 4, 6] -> [0, 1] | [4, 6]; class 1 = [2, 3, 5] -> [2, 3] | [5]
        assert_eq!(folds[0], (vec![4, 5, 6], vec![0, 1, 2, 3]));
        assert_eq!(folds[1], (vec![0, 1, 2, 3], vec![4, 5, 6]));
    }

    #[test]
    fn test_split_keeps_singleton_class() {
        let mut y: Vec<usize> = (0..30).map(|i| i % 2).collect();
        y.push(2);
        let cv = StratifiedKFold::new(3).unwrap();
        let folds = cv.split(&y).unwrap();
        assert_eq!(folds.len(), 3);
        assert!(folds[0].1.contains(&30));
        assert!(folds[1].0.contains(&30));
        assert!(folds[2].0.contains(&30));
        for (_, test) in &folds {
            assert_eq!(test.iter().filter(|&&s| y[s] == 0).count(), 5);
        }
    }

    #[test]
    fn test_split_rejects_classes_all_smaller_than_folds() {
        let cv = StratifiedKFold::new(3).unwrap();
        let result = cv.split(&[0, 0, 1, 1, 2]);
        assert!(matches!(result, Err(OptimizerError::InvalidData(_))));
        assert!(cv.split(&[0, 0, 0, 1, 1]).is_ok());
    }

    #[test]
    fn test_needs_two_folds() {
        assert!(StratifiedKFold::new(1).is_err());
    }

    #[test]
    fn test_cross_val_score() {
        // two well separated groups
        let rows: Vec<Vec<f32>> = (0..12)
            .map(|i| vec![if i < 6 { i as f32 } else { 100.0 + i as f32 }])
            .collect();
        let y: Vec<usize> = (0..12).map(|i| usize::from(i >= 6)).collect();
        let x = CsrMatrix::from_dense(&rows, 1).unwrap();
        let folds = StratifiedKFold::new(3).unwrap().split(&y).unwrap();
        let scores = cross_val_score(&tree(), &x, &y, &folds, 0).unwrap();
        assert_eq!(scores, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_cross_val_score_with_singleton_class() {
        let mut rows: Vec<Vec<f32>> = (0..30)
            .map(|i| vec![if i % 2 == 0 { 1.0 } else { 0.0 }, (i % 5) as f32])
            .collect();
        rows.push(vec![0.0, 9.0]);
        let mut y: Vec<usize> = (0..30).map(|i| i % 2).collect();
        y.push(2);
        let x = CsrMatrix::from_dense(&rows, 2).unwrap();
        let folds = StratifiedKFold::new(3).unwrap().split(&y).unwrap();
        let scores = cross_val_score(&tree(), &x, &y, &folds, 0).unwrap();
        assert_eq!(scores.len(), 3);
        // the singleton is never in a training set while it is tested
        assert!(scores[0] < 1.0);
        assert_eq!(&scores[1..], &[1.0, 1.0]);
    }

    proptest! {
        #[test]
        fn test_every_sample_is_tested_once(y in prop::collection::vec(0usize..3, 0..60), k in 2usize..5) {
            let cv = StratifiedKFold::new(k).unwrap();
            if let Ok(folds) = cv.split(&y) {
                let mut seen = vec![0; y.len()];
                for (train, test) in &folds {
                    prop_assert_eq!(train.len() + test.len(), y.len());
                    prop_assert!(!test.is_empty());
                    for &sample in test {
                        seen[sample] += 1;
                    }
                }
                prop_assert!(seen.iter().all(|&count| count == 1));
            }
        }
    }
}
