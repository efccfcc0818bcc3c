use chrono::{Duration, SecondsFormat, Utc};

use crate::catalog;
use crate::models::{Review, Submission, SubmissionWithReview};
use crate::store::{Binding, Store, keys};

/////*============== SUBMISSION LEDGER ==============*/
/// Per-problem, newest-first list of reviewed submissions.
///
/// A bundled mock may occupy an empty ledger so there is always something to
/// look at; the first real submission replaces it.
#[derive(Clone)]
pub struct SubmissionLedger {
    store: Store,
}

impl SubmissionLedger {
    pub fn new(store: &Store) -> Self {
        Self { store: store.clone() }
    }

    pub fn binding(&self, problem_id: &str) -> Binding<Vec<SubmissionWithReview>> {
        self.store.bind(keys::submissions(problem_id), Vec::new())
    }

    /// All submissions for `problem_id`, newest first.
    pub fn list(&self, problem_id: &str) -> Vec<SubmissionWithReview> {
        let mut submissions = self.binding(problem_id).get();
        submissions.sort_by(|a, b| b.submission.timestamp.cmp(&a.submission.timestamp));
        submissions
    }

    /// Records a reviewed submission. Any mock entry is evicted first.
    pub fn append(&self, problem_id: &str, code: &str, review: Review) -> SubmissionWithReview {
        let binding = self.binding(problem_id);
        let mut entries = binding.get();

        let before = entries.len();
        entries.retain(|entry| !entry.submission.is_mock);
        if entries.len() != before {
            log::info!("[append] Replacing example submission for {problem_id}");
        }

        // Keep timestamps strictly decreasing down the list even if the clock
        // hasn't moved since the previous submission.
        let mut timestamp = Utc::now();
        if let Some(newest) = entries.iter().map(|e| e.submission.timestamp).max() {
            if timestamp <= newest {
                timestamp = newest + Duration::milliseconds(1);
            }
        }

        let record = SubmissionWithReview {
            submission: Submission {
                id: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
                problem_id: problem_id.to_string(),
                code: code.to_string(),
                timestamp,
                is_mock: false,
            },
            review,
        };

        entries.insert(0, record.clone());
        binding.set(&entries);

        log::info!("[append] Recorded submission {} for {problem_id} (score {})",
                   record.submission.id, record.review.score);

        record
    }

    /// Seeds the bundled example submission into an empty ledger.
    ///
    /// Returns `true` if a seed was inserted.
    pub fn seed_mock_if_empty(&self, problem_id: &str) -> bool {
        let binding = self.binding(problem_id);
        if !binding.get().is_empty() {
            return false;
        }

        match catalog::mock_submission(problem_id) {
            Some(mock) => {
                log::trace!("[seed_mock_if_empty] Seeding example submission for {problem_id}");
                binding.set(&vec![mock.clone()]);
                true
            }
            None => false,
        }
    }

    /// Number of real (non-mock) submissions.
    pub fn attempts(&self, problem_id: &str) -> usize {
        self.binding(problem_id)
            .get()
            .iter()
            .filter(|entry| !entry.submission.is_mock)
            .count()
    }

    /// Highest score among real submissions.
    pub fn best_score(&self, problem_id: &str) -> Option<u8> {
        self.binding(problem_id)
            .get()
            .iter()
            .filter(|entry| !entry.submission.is_mock)
            .map(|entry| entry.review.score)
            .max()
    }
}
