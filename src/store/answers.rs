use std::collections::BTreeMap;

use crate::models::{AnswerStatus, Mcq};
use crate::store::{Binding, Store, keys};

/////*============== ANSWER LEDGER ==============*/
pub type AnswerMap = BTreeMap<String, AnswerStatus>;

/// Aggregate over answered questions. Always computed, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scorecard {
    pub passed: usize,
    pub answered: usize,
}

impl Scorecard {
    /// Rounded pass percentage, 0 when nothing has been answered.
    pub fn percent(&self) -> u8 {
        if self.answered == 0 {
            return 0;
        }
        ((self.passed as f64 / self.answered as f64) * 100.0).round() as u8
    }
}

impl std::fmt::Display for Scorecard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}% ({} of {} passed)", self.percent(), self.passed, self.answered)
    }
}

#[derive(Clone)]
pub struct AnswerLedger {
    answers: Binding<AnswerMap>,
}

impl AnswerLedger {
    pub fn new(store: &Store) -> Self {
        Self { answers: store.bind(keys::MCQ_ANSWERS, AnswerMap::new()) }
    }

    /// Records the latest outcome for `mcq_id`, replacing any earlier one.
    pub fn record_answer(&self, mcq_id: &str, status: AnswerStatus) {
        log::info!("[record_answer] {mcq_id}: {status}");
        self.answers.update(|answers| {
            answers.insert(mcq_id.to_string(), status);
        });
    }

    pub fn get_all(&self) -> AnswerMap {
        self.answers.get()
    }

    pub fn status(&self, mcq_id: &str) -> Option<AnswerStatus> {
        self.get_all().get(mcq_id).copied()
    }

    /// Answered questions that still exist in `questions`, in bank order.
    pub fn history<'q>(&self, questions: &'q [Mcq]) -> Vec<(&'q Mcq, AnswerStatus)> {
        let answers = self.get_all();
        questions
            .iter()
            .filter_map(|q| answers.get(&q.id).map(|status| (q, *status)))
            .collect()
    }

    pub fn scorecard(&self, questions: &[Mcq]) -> Scorecard {
        let history = self.history(questions);
        Scorecard {
            passed: history.iter().filter(|(_, status)| *status == AnswerStatus::Passed).count(),
            answered: history.len(),
        }
    }

    pub fn clear(&self) {
        self.answers.clear();
    }
}
