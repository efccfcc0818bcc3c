//! Storage layout. Values under every key are JSON.

pub const CUSTOM_MCQS: &str = "custom-mcqs";
pub const MCQ_ANSWERS: &str = "mcq-answers";
pub const API_KEY: &str = "gemini-api-key";

pub fn submissions(problem_id: &str) -> String {
    format!("submissions-{problem_id}")
}

pub fn code_editor(problem_id: &str) -> String {
    format!("code-editor-{problem_id}")
}
