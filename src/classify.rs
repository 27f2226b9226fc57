//! External classifier seam. The engine never implements classifiers; it
//! hands numeric features and nominal class codes to whatever the caller
//! plugs in and folds the predictions back into the dataset as synthetic
//! attributes.

use log::debug;
use ndarray::{ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::dataset::{AttributeKind, Dataset};
use crate::error::{PursuitError, Result};

/// A supervised classifier living outside the crate. Failures cross the
/// boundary as `anyhow::Error` and surface as [`PursuitError::Classifier`].
pub trait Classifier {
    fn train(&mut self, data: ArrayView2<f64>, classes: &[u32]) -> anyhow::Result<()>;

    /// One predicted class code per row of `data`.
    fn predict(&self, data: ArrayView2<f64>) -> anyhow::Result<Vec<u32>>;
}

/// Whole-dataset predictions assembled from a k-fold run.
#[derive(Debug, Clone)]
pub struct CrossValidation {
    pub predicted: Vec<u32>,
    pub errors: Vec<bool>,
    pub accuracy: f64,
}

/// Shuffled k-fold cross-validation over the dataset's numeric block.
/// Every row is predicted exactly once, by a classifier trained on the
/// other folds.
pub fn cross_validate<C, R>(
    classifier: &mut C,
    dataset: &Dataset,
    class_attribute: &str,
    folds: usize,
    rng: &mut R,
) -> Result<CrossValidation>
where
    C: Classifier,
    R: Rng,
{
    if dataset.kind(class_attribute)? != AttributeKind::Nominal {
        return Err(PursuitError::InvalidAttribute {
            name: class_attribute.to_string(),
            expected: "nominal".to_string(),
        });
    }
    let rows = dataset.rows();
    if folds < 2 || folds > rows {
        return Err(PursuitError::DegenerateInput(format!(
            "{folds} folds over {rows} rows"
        )));
    }
    let data = dataset.numeric_matrix();
    if data.ncols() == 0 {
        return Err(PursuitError::DegenerateInput(
            "no numeric attributes to train on".to_string(),
        ));
    }
    let actual = dataset.nominal_values(class_attribute)?;

    let mut order: Vec<usize> = (0..rows).collect();
    order.shuffle(rng);
    let mut fold_of = vec![0usize; rows];
    for (i, &row) in order.iter().enumerate() {
        fold_of[row] = i % folds;
    }

    let mut predicted = vec![0u32; rows];
    for fold in 0..folds {
        let train_rows: Vec<usize> = (0..rows).filter(|&r| fold_of[r] != fold).collect();
        let test_rows: Vec<usize> = (0..rows).filter(|&r| fold_of[r] == fold).collect();

        let train_data = data.select(Axis(0), &train_rows);
        let train_classes: Vec<u32> = train_rows.iter().map(|&r| actual[r]).collect();
        classifier.train(train_data.view(), &train_classes)?;

        let test_data = data.select(Axis(0), &test_rows);
        let fold_predictions = classifier.predict(test_data.view())?;
        if fold_predictions.len() != test_rows.len() {
            return Err(PursuitError::Classifier(anyhow::anyhow!(
                "classifier returned {} predictions for {} rows",
                fold_predictions.len(),
                test_rows.len()
            )));
        }
        for (&row, &p) in test_rows.iter().zip(fold_predictions.iter()) {
            predicted[row] = p;
        }
        debug!("cross-validation fold {fold}: {} test rows", test_rows.len());
    }

    let errors: Vec<bool> = predicted
        .iter()
        .zip(actual.iter())
        .map(|(p, a)| p != a)
        .collect();
    let correct = errors.iter().filter(|&&e| !e).count();
    Ok(CrossValidation {
        predicted,
        errors,
        accuracy: correct as f64 / rows as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Attribute;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Predicts whichever class was most common in training.
    struct MajorityClassifier {
        majority: u32,
    }

    impl Classifier for MajorityClassifier {
        fn train(&mut self, _data: ArrayView2<f64>, classes: &[u32]) -> anyhow::Result<()> {
            let mut counts = std::collections::HashMap::new();
            for &c in classes {
                *counts.entry(c).or_insert(0usize) += 1;
            }
            self.majority = counts
                .into_iter()
                .max_by_key(|&(c, n)| (n, std::cmp::Reverse(c)))
                .map(|(c, _)| c)
                .unwrap_or(0);
            Ok(())
        }

        fn predict(&self, data: ArrayView2<f64>) -> anyhow::Result<Vec<u32>> {
            Ok(vec![self.majority; data.nrows()])
        }
    }

    /// Assigns the class whose training-set feature mean is nearest.
    struct NearestMeanClassifier {
        means: Vec<(u32, f64)>,
    }

    impl Classifier for NearestMeanClassifier {
        fn train(&mut self, data: ArrayView2<f64>, classes: &[u32]) -> anyhow::Result<()> {
            let mut sums: std::collections::HashMap<u32, (f64, usize)> =
                std::collections::HashMap::new();
            for (i, &c) in classes.iter().enumerate() {
                let e = sums.entry(c).or_insert((0.0, 0));
                e.0 += data[[i, 0]];
                e.1 += 1;
            }
            self.means = sums
                .into_iter()
                .map(|(c, (s, n))| (c, s / n as f64))
                .collect();
            Ok(())
        }

        fn predict(&self, data: ArrayView2<f64>) -> anyhow::Result<Vec<u32>> {
            Ok((0..data.nrows())
                .map(|i| {
                    self.means
                        .iter()
                        .min_by(|a, b| {
                            (a.1 - data[[i, 0]])
                                .abs()
                                .total_cmp(&(b.1 - data[[i, 0]]).abs())
                        })
                        .map(|&(c, _)| c)
                        .unwrap_or(0)
                })
                .collect())
        }
    }

    struct BrokenClassifier;

    impl Classifier for BrokenClassifier {
        fn train(&mut self, _data: ArrayView2<f64>, _classes: &[u32]) -> anyhow::Result<()> {
            anyhow::bail!("refusing to train")
        }

        fn predict(&self, _data: ArrayView2<f64>) -> anyhow::Result<Vec<u32>> {
            Ok(Vec::new())
        }
    }

    fn labelled_dataset(zeros: usize, ones: usize) -> Dataset {
        let mut feature = vec![0.0; zeros];
        feature.extend(vec![1.0; ones]);
        let mut codes = vec![0u32; zeros];
        codes.extend(vec![1u32; ones]);
        Dataset::new(vec![
            Attribute::numeric("feature", feature),
            Attribute::nominal(
                "class",
                vec!["zero".to_string(), "one".to_string()],
                codes,
            )
            .unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_majority_baseline_accuracy() {
        let ds = labelled_dataset(15, 5);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut clf = MajorityClassifier { majority: 0 };
        let cv = cross_validate(&mut clf, &ds, "class", 4, &mut rng).unwrap();

        // The majority class survives leaving any fold out, so exactly the
        // minority rows come back wrong
        assert_relative_eq!(cv.accuracy, 0.75);
        assert!(cv.predicted.iter().all(|&p| p == 0));
        assert_eq!(cv.errors.iter().filter(|&&e| e).count(), 5);
    }

    #[test]
    fn test_separable_data_is_perfect() {
        let ds = labelled_dataset(10, 10);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut clf = NearestMeanClassifier { means: Vec::new() };
        let cv = cross_validate(&mut clf, &ds, "class", 5, &mut rng).unwrap();
        assert_relative_eq!(cv.accuracy, 1.0);
        assert!(cv.errors.iter().all(|&e| !e));
    }

    #[test]
    fn test_fold_count_validation() {
        let ds = labelled_dataset(3, 3);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut clf = MajorityClassifier { majority: 0 };
        assert!(cross_validate(&mut clf, &ds, "class", 1, &mut rng).is_err());
        assert!(cross_validate(&mut clf, &ds, "class", 7, &mut rng).is_err());
        assert!(cross_validate(&mut clf, &ds, "feature", 2, &mut rng).is_err());
    }

    #[test]
    fn test_classifier_failure_propagates() {
        let ds = labelled_dataset(3, 3);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut clf = BrokenClassifier;
        assert!(matches!(
            cross_validate(&mut clf, &ds, "class", 2, &mut rng),
            Err(PursuitError::Classifier(_))
        ));
    }
}
