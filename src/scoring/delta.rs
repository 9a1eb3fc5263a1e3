//! Delta policies: how two score vectors become one bias number.

use std::fmt::Debug;

/// Turns the original and counterfactual score vectors into a scalar delta.
///
/// Returns `None` when the vectors cannot be compared (a required class
/// index is missing); the sample is then marked failed.
pub trait DeltaPolicy: Send + Sync + Debug {
    fn delta(&self, original: &[f64], counterfactual: &[f64]) -> Option<f64>;

    fn name(&self) -> &'static str;
}

/// Signed change of one class score: `cf[class] - orig[class]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassDifference {
    pub class: usize,
}

impl ClassDifference {
    pub fn new(class: usize) -> Self {
        Self { class }
    }
}

impl Default for ClassDifference {
    fn default() -> Self {
        Self { class: 1 }
    }
}

impl DeltaPolicy for ClassDifference {
    fn delta(&self, original: &[f64], counterfactual: &[f64]) -> Option<f64> {
        Some(counterfactual.get(self.class)? - original.get(self.class)?)
    }

    fn name(&self) -> &'static str {
        "class_difference"
    }
}

/// Magnitude of the change of one class score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AbsoluteClassDifference {
    pub inner: ClassDifference,
}

impl AbsoluteClassDifference {
    pub fn new(class: usize) -> Self {
        Self {
            inner: ClassDifference::new(class),
        }
    }
}

impl DeltaPolicy for AbsoluteClassDifference {
    fn delta(&self, original: &[f64], counterfactual: &[f64]) -> Option<f64> {
        self.inner.delta(original, counterfactual).map(f64::abs)
    }

    fn name(&self) -> &'static str {
        "absolute_class_difference"
    }
}

/// Signed change of the summed score of several positive classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositiveClassesDifference {
    pub classes: Vec<usize>,
}

impl PositiveClassesDifference {
    pub fn new(classes: impl IntoIterator<Item = usize>) -> Self {
        let mut classes: Vec<usize> = classes.into_iter().collect();
        classes.sort_unstable();
        classes.dedup();
        Self { classes }
    }
}

impl DeltaPolicy for PositiveClassesDifference {
    fn delta(&self, original: &[f64], counterfactual: &[f64]) -> Option<f64> {
        let mut orig = 0.0;
        let mut cf = 0.0;
        for &class in &self.classes {
            orig += original.get(class)?;
            cf += counterfactual.get(class)?;
        }
        Some(cf - orig)
    }

    fn name(&self) -> &'static str {
        "positive_classes_difference"
    }
}

/// Total absolute change across all classes. Vectors must have equal length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct L1Distance;

impl DeltaPolicy for L1Distance {
    fn delta(&self, original: &[f64], counterfactual: &[f64]) -> Option<f64> {
        if original.len() != counterfactual.len() {
            return None;
        }
        Some(
            original
                .iter()
                .zip(counterfactual)
                .map(|(a, b)| (b - a).abs())
                .sum(),
        )
    }

    fn name(&self) -> &'static str {
        "l1_distance"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_class_difference_signed() {
        let policy = ClassDifference::default();
        let d = policy.delta(&[0.3, 0.7], &[0.6, 0.4]).unwrap();
        assert!((d - -0.3).abs() < EPS);
        assert_eq!(policy.delta(&[1.0], &[1.0]), None);
    }

    #[test]
    fn test_absolute() {
        let d = AbsoluteClassDifference::new(1)
            .delta(&[0.3, 0.7], &[0.6, 0.4])
            .unwrap();
        assert!((d - 0.3).abs() < EPS);
    }

    #[test]
    fn test_positive_classes() {
        let policy = PositiveClassesDifference::new([2, 1, 2]);
        assert_eq!(policy.classes, vec![1, 2]);
        let d = policy.delta(&[0.5, 0.25, 0.25], &[0.0, 0.5, 0.5]).unwrap();
        assert!((d - 0.5).abs() < EPS);
        assert_eq!(policy.delta(&[0.5, 0.5], &[0.5, 0.5]), None);
    }

    #[test]
    fn test_l1() {
        let d = L1Distance.delta(&[0.5, 0.5], &[0.25, 0.75]).unwrap();
        assert!((d - 0.5).abs() < EPS);
        assert_eq!(L1Distance.delta(&[1.0], &[0.5, 0.5]), None);
    }
}
