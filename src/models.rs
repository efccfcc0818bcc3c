use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/////*============== PROBLEMS ==============*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemTags {
    pub level: Difficulty,
    pub concept: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemExample {
    pub input: String,
    pub output: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// A bundled coding exercise. Never changes after startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub skeleton_code: String,
    pub tags: ProblemTags,
    pub requirements: Vec<String>,
    pub example: ProblemExample,
    pub hints: Vec<String>,
}

impl std::fmt::Display for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "**{}** [{} | {}]", self.title, self.tags.level, self.tags.concept)?;
        writeln!(f, "{}", self.description)?;
        writeln!(f, "\nRequirements:")?;
        for req in &self.requirements {
            writeln!(f, "\t-> {req}")?;
        }
        writeln!(f, "\nExample:")?;
        writeln!(f, "\tInput:  {}", self.example.input)?;
        write!(f, "\tOutput: {}", self.example.output)?;
        if let Some(explanation) = &self.example.explanation {
            write!(f, "\n\tExplanation: {explanation}")?;
        }
        Ok(())
    }
}

/////*============== SUBMISSIONS ==============*/
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub problem_id: String,
    pub code: String,
    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_mock: bool,
}

/// Structured feedback for one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub score: u8,
    pub feedback: String,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
}

impl std::fmt::Display for Review {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "**Score**: {}/100", self.score)?;
        writeln!(f, "{}", self.feedback)?;
        writeln!(f, "\nStrengths:")?;
        for strength in &self.strengths {
            writeln!(f, "\t+ {strength}")?;
        }
        write!(f, "\nAreas for improvement:")?;
        for area in &self.areas_for_improvement {
            write!(f, "\n\t- {area}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionWithReview {
    #[serde(flatten)]
    pub submission: Submission,
    pub review: Review,
}

impl std::fmt::Display for SubmissionWithReview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "**Submission** {}{}\n\
            \tTimestamp: {}\n\
            \tScore:     {}/100",
            self.submission.id,
            if self.submission.is_mock { " (example)" } else { "" },
            self.submission.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.review.score
        )
    }
}

/////*============== MCQS ==============*/
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum McqCategory {
    #[default]
    Concepts,
    Concurrency,
    #[serde(rename = "Code Output")]
    CodeOutput,
    #[serde(rename = "Error Handling")]
    ErrorHandling,
    #[serde(rename = "Best Practices")]
    BestPractices,
}

impl McqCategory {
    pub const ALL: [McqCategory; 5] = [
        McqCategory::Concepts,
        McqCategory::Concurrency,
        McqCategory::CodeOutput,
        McqCategory::ErrorHandling,
        McqCategory::BestPractices,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            McqCategory::Concepts => "Concepts",
            McqCategory::Concurrency => "Concurrency",
            McqCategory::CodeOutput => "Code Output",
            McqCategory::ErrorHandling => "Error Handling",
            McqCategory::BestPractices => "Best Practices",
        }
    }

    /// Case-insensitive lookup that ignores spaces, so `codeoutput` and
    /// `"Code Output"` both resolve.
    pub fn parse(s: &str) -> Option<McqCategory> {
        let wanted: String = s.chars().filter(|c| !c.is_whitespace() && *c != '_' && *c != '-').collect();
        Self::ALL.into_iter().find(|cat| {
            cat.name().replace(' ', "").eq_ignore_ascii_case(&wanted)
        })
    }
}

impl std::fmt::Display for McqCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mcq {
    pub id: String,
    pub question: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,

    pub options: Vec<String>,
    pub correct_answer_index: usize,
    pub explanation: String,
    pub category: McqCategory,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_custom: bool,
}

impl Mcq {
    pub fn grade(&self, selected: usize) -> AnswerStatus {
        if selected == self.correct_answer_index {
            AnswerStatus::Passed
        } else {
            AnswerStatus::Failed
        }
    }
}

impl std::fmt::Display for Mcq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "**{}** [{}{}]",
            self.id,
            self.category,
            if self.is_custom { ", custom" } else { "" }
        )?;
        writeln!(f, "{}", self.question)?;
        if let Some(snippet) = &self.code_snippet {
            writeln!(f, "```go\n{snippet}\n```")?;
        }
        for (i, option) in self.options.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "\t{}. {option}", i + 1)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerStatus {
    Passed,
    Failed,
}

impl std::fmt::Display for AnswerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            AnswerStatus::Passed => "passed",
            AnswerStatus::Failed => "failed",
        })
    }
}
