//! Human-readable test-phase reports.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::evaluate::Evaluation;

/// Correct/total counts for one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassAccuracy {
    pub class: String,
    pub correct: usize,
    pub total: usize,
}

impl ClassAccuracy {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

fn class_name(classes: &[String], index: usize) -> &str {
    classes.get(index).map_or("?", String::as_str)
}

/// One line per example: `id: true --> predicted`, suffixed with
/// `(wrong)` on a misclassification.
pub fn comparison_lines(eval: &Evaluation, classes: &[String]) -> Vec<String> {
    eval.ids
        .iter()
        .zip(eval.true_labels.iter().zip(&eval.predicted_labels))
        .map(|(id, (&truth, &pred))| {
            let mark = if truth == pred { "" } else { " (wrong)" };
            format!(
                "{id}: {} --> {}{mark}",
                class_name(classes, truth),
                class_name(classes, pred)
            )
        })
        .collect()
}

/// Accuracy per true class, in class-index order. Classes absent from the
/// evaluation are omitted.
pub fn per_class_accuracy(eval: &Evaluation, classes: &[String]) -> Vec<ClassAccuracy> {
    let mut counts: BTreeMap<usize, (usize, usize)> = BTreeMap::new();
    for (&truth, &pred) in eval.true_labels.iter().zip(&eval.predicted_labels) {
        let entry = counts.entry(truth).or_default();
        entry.1 += 1;
        if truth == pred {
            entry.0 += 1;
        }
    }
    counts
        .into_iter()
        .map(|(index, (correct, total))| ClassAccuracy {
            class: class_name(classes, index).to_string(),
            correct,
            total,
        })
        .collect()
}

/// Writes the comparison and the per-class summary to the `run.test` target.
pub fn log_test_report(eval: &Evaluation, classes: &[String]) {
    tracing::info!(target: "run.test", "True label became... --> ?");
    for line in comparison_lines(eval, classes) {
        tracing::info!(target: "run.test", "{line}");
    }
    for class in per_class_accuracy(eval, classes) {
        tracing::info!(
            target: "run.test",
            "{}: {}/{} correct ({:.3})",
            class.class,
            class.correct,
            class.total,
            class.accuracy()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval() -> Evaluation {
        Evaluation {
            loss: 0.5,
            accuracy: 2.0 / 3.0,
            count: 3,
            ids: vec!["Ada".into(), "Bob".into(), "Cy".into()],
            true_labels: vec![0, 1, 1],
            predicted_labels: vec![0, 0, 1],
        }
    }

    fn classes() -> Vec<String> {
        vec!["poet".into(), "judge".into()]
    }

    #[test]
    fn marks_wrong_predictions() {
        let lines = comparison_lines(&eval(), &classes());
        assert_eq!(
            lines,
            vec!["Ada: poet --> poet", "Bob: judge --> poet (wrong)", "Cy: judge --> judge"]
        );
    }

    #[test]
    fn per_class_counts() {
        let per = per_class_accuracy(&eval(), &classes());
        assert_eq!(per.len(), 2);
        assert_eq!(per[0].class, "poet");
        assert_eq!((per[0].correct, per[0].total), (1, 1));
        assert_eq!(per[1].class, "judge");
        assert_eq!((per[1].correct, per[1].total), (1, 2));
        assert!((per[1].accuracy() - 0.5).abs() < 1e-12);
    }
}
