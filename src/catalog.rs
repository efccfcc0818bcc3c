use std::collections::HashMap;
use std::sync::LazyLock;

use crate::models::{Mcq, Problem, SubmissionWithReview};

// Bundled content, parsed once on first use. The JSON ships inside the binary
// so a parse failure means a broken build, not bad user input.
static PROBLEMS: LazyLock<Vec<Problem>> = LazyLock::new(|| {
    serde_json::from_str(include_str!("../data/problems.json"))
        .expect("data/problems.json is not a valid problem catalog")
});

static MCQS: LazyLock<Vec<Mcq>> = LazyLock::new(|| {
    serde_json::from_str(include_str!("../data/mcqs.json"))
        .expect("data/mcqs.json is not a valid question bank")
});

static MOCK_SUBMISSIONS: LazyLock<HashMap<String, SubmissionWithReview>> = LazyLock::new(|| {
    serde_json::from_str(include_str!("../data/mock_submissions.json"))
        .expect("data/mock_submissions.json is not a valid mock submission set")
});

/// All coding problems, in catalog order.
pub fn problems() -> &'static [Problem] {
    &PROBLEMS
}

pub fn problem(id: &str) -> Option<&'static Problem> {
    PROBLEMS.iter().find(|p| p.id == id)
}

/// The bundled (non-custom) multiple-choice questions.
pub fn mcqs() -> &'static [Mcq] {
    &MCQS
}

/// The curated example submission shown before a user's first attempt.
pub fn mock_submission(problem_id: &str) -> Option<&'static SubmissionWithReview> {
    MOCK_SUBMISSIONS.get(problem_id)
}
