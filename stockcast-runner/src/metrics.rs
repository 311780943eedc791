//! Classification metrics: pure functions from (actual, predicted) labels to scores.
//!
//! Labels are binary (0 = not higher, 1 = higher). Ratios with an empty
//! denominator are 0.0 rather than NaN so the metrics file stays valid JSON.

use serde::{Deserialize, Serialize};

/// 2×2 confusion matrix, `counts[actual][predicted]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub counts: [[usize; 2]; 2],
}

impl ConfusionMatrix {
    /// Tally pairs. Labels other than 0 and 1 are ignored.
    pub fn from_labels(actual: &[u32], predicted: &[u32]) -> Self {
        let mut counts = [[0usize; 2]; 2];
        for (&a, &p) in actual.iter().zip(predicted) {
            if a < 2 && p < 2 {
                counts[a as usize][p as usize] += 1;
            }
        }
        Self { counts }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        self.counts[0][0] + self.counts[1][1]
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.correct(), self.total())
    }

    /// Rows actually labelled `class`.
    pub fn support(&self, class: usize) -> usize {
        self.counts[class].iter().sum()
    }

    /// Of the rows predicted `class`, the fraction that were `class`.
    pub fn precision(&self, class: usize) -> f64 {
        let predicted = self.counts[0][class] + self.counts[1][class];
        ratio(self.counts[class][class], predicted)
    }

    /// Of the rows that were `class`, the fraction predicted `class`.
    pub fn recall(&self, class: usize) -> f64 {
        ratio(self.counts[class][class], self.support(class))
    }

    pub fn f1(&self, class: usize) -> f64 {
        let (p, r) = (self.precision(class), self.recall(class));
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

/// Per-class scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    pub class: u8,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Everything computed from one evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub classes: Vec<ClassReport>,
}

impl ClassificationMetrics {
    pub fn compute(actual: &[u32], predicted: &[u32]) -> Self {
        let cm = ConfusionMatrix::from_labels(actual, predicted);
        let classes = (0..2u8)
            .map(|class| {
                let c = usize::from(class);
                ClassReport {
                    class,
                    precision: cm.precision(c),
                    recall: cm.recall(c),
                    f1: cm.f1(c),
                    support: cm.support(c),
                }
            })
            .collect();
        Self {
            accuracy: cm.accuracy(),
            confusion_matrix: cm,
            classes,
        }
    }
}

/// Fraction of positions where `actual` and `predicted` agree.
pub fn accuracy(actual: &[u32], predicted: &[u32]) -> f64 {
    let correct = actual.iter().zip(predicted).filter(|(a, p)| a == p).count();
    ratio(correct, actual.len().min(predicted.len()))
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}
