use std::collections::HashMap;

use chrono::Utc;
use itertools::Itertools;
use serde::Deserialize;

use crate::catalog;
use crate::models::{Mcq, McqCategory};
use crate::store::{Binding, Store, keys};

const MIN_OPTIONS: usize = 2;
const MAX_OPTIONS: usize = 6;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum McqError {
    #[error("Question cannot be empty.")]
    EmptyQuestion,

    #[error("A question needs between {MIN_OPTIONS} and {MAX_OPTIONS} options, got {0}.")]
    OptionCount(usize),

    #[error("All options must be filled.")]
    BlankOption,

    #[error("Please select a correct answer.")]
    NoCorrectAnswer,

    #[error("Explanation cannot be empty.")]
    EmptyExplanation,
}

/// A user-authored question before it has been validated and given an id.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McqDraft {
    pub question: String,

    #[serde(default)]
    pub code_snippet: Option<String>,

    pub options: Vec<String>,
    pub correct_answer_index: Option<usize>,
    pub explanation: String,

    #[serde(default)]
    pub category: McqCategory,
}

impl McqDraft {
    /// Checks the draft the same way the authoring form does, in the same order.
    pub fn validate(&self) -> Result<(), McqError> {
        if self.question.trim().is_empty() {
            return Err(McqError::EmptyQuestion);
        }
        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&self.options.len()) {
            return Err(McqError::OptionCount(self.options.len()));
        }
        if self.options.iter().any(|opt| opt.trim().is_empty()) {
            return Err(McqError::BlankOption);
        }
        match self.correct_answer_index {
            Some(i) if i < self.options.len() => {}
            _ => return Err(McqError::NoCorrectAnswer),
        }
        if self.explanation.trim().is_empty() {
            return Err(McqError::EmptyExplanation);
        }
        Ok(())
    }
}

/////*============== MCQ BANK ==============*/
/// Bundled questions plus the user's own.
#[derive(Clone)]
pub struct McqBank {
    custom: Binding<Vec<Mcq>>,
}

impl McqBank {
    pub fn new(store: &Store) -> Self {
        Self { custom: store.bind(keys::CUSTOM_MCQS, Vec::new()) }
    }

    /// Bundled questions first, then custom ones, each marked custom.
    pub fn all(&self) -> Vec<Mcq> {
        let custom = self.custom.get().into_iter().map(|mcq| Mcq { is_custom: true, ..mcq });
        catalog::mcqs().iter().cloned().chain(custom).collect()
    }

    pub fn find(&self, id: &str) -> Option<Mcq> {
        self.all().into_iter().find(|mcq| mcq.id == id)
    }

    pub fn by_category(&self, category: Option<McqCategory>) -> Vec<Mcq> {
        self.all()
            .into_iter()
            .filter(|mcq| category.is_none_or(|cat| mcq.category == cat))
            .collect()
    }

    /// Question count for every category, zero included.
    pub fn category_counts(&self) -> Vec<(McqCategory, usize)> {
        let counts: HashMap<McqCategory, usize> = self.all().iter().map(|mcq| mcq.category).counts();
        McqCategory::ALL
            .into_iter()
            .map(|cat| (cat, counts.get(&cat).copied().unwrap_or(0)))
            .collect()
    }

    pub fn add_custom(&self, draft: McqDraft) -> Result<Mcq, McqError> {
        draft.validate()?;

        let existing = self.all();
        let mut millis = Utc::now().timestamp_millis();
        while existing.iter().any(|mcq| mcq.id == format!("custom-{millis}")) {
            millis += 1;
        }

        let mcq = Mcq {
            id: format!("custom-{millis}"),
            question: draft.question.trim().to_string(),
            code_snippet: draft.code_snippet.filter(|s| !s.trim().is_empty()),
            options: draft.options.iter().map(|opt| opt.trim().to_string()).collect(),
            correct_answer_index: draft.correct_answer_index.unwrap_or_default(),
            explanation: draft.explanation.trim().to_string(),
            category: draft.category,
            is_custom: true,
        };

        self.custom.update(|custom| custom.push(mcq.clone()));
        log::info!("[add_custom] Added custom question {}", mcq.id);

        Ok(mcq)
    }

    pub fn clear_custom(&self) {
        self.custom.clear();
    }
}
