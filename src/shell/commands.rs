use std::io::Write;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use itertools::Itertools;
use regex::Regex;
use tokio::io::{AsyncBufRead, Lines};

use crate::catalog;
use crate::models::{AnswerStatus, McqCategory, Problem};
use crate::review::{self, ReviewTransport};
use crate::shell::{PromptForKey, Session};
use crate::store::mcqs::McqDraft;

const MAX_CMD_LENGTH: usize = 12;

static COMMAND_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("command pattern does not compile")
});

struct CommandInstance<'a, T, R> {
    session: &'a Session<T>,
    input: &'a mut Lines<R>,
    parameters: &'a [&'a str],
}

pub struct Commands;
impl Commands {
    pub async fn run_command<T, R>(session: &Session<T>, input: &mut Lines<R>, line: &str) -> Result<String>
    where
        T: ReviewTransport,
        R: AsyncBufRead + Unpin,
    {
        // Split the line (on whitespace) into:
        // - The command (first token)
        // - Its parameters (all tokens afterwards)
        let split_tokens = line.split_whitespace().collect::<Vec<_>>();
        let Some((&command, parameters)) = split_tokens.split_first() else {
            return Ok(String::new());
        };

        let mut cmd = CommandInstance { session, input, parameters };

        let result: String = match command {
            "problems" => cmd.problems(),
            "show" => cmd.show()?,
            "hints" => cmd.hints()?,
            "draft" => cmd.draft()?,
            "load" => cmd.load().await?,
            "reset" => cmd.reset()?,
            "submit" => cmd.submit().await?,
            "history" => cmd.history()?,
            "review" => cmd.review()?,
            "mcq" => cmd.mcq()?,
            "question" => cmd.question()?,
            "answer" => cmd.answer()?,
            "score" => cmd.score(),
            "addmcq" => cmd.addmcq().await?,
            "clearmcqs" => cmd.clearmcqs(),
            "clearanswers" => cmd.clearanswers(),
            "key" => cmd.key()?,
            "help" => Self::get_help(),
            _ => {
                if Commands::is_valid_cmd(command) {
                    log::info!("User submitted unknown command: {}", command);
                    return Err(anyhow!("No such command found: {}, see `help` for commands.", command));
                } else {
                    log::info!("User submitted invalid command: {}", command);
                    return Err(anyhow!("Invalid command syntax."));
                }
            }
        };

        Ok(result)
    }
}

/// Coding problems
impl<T: ReviewTransport, R: AsyncBufRead + Unpin> CommandInstance<'_, T, R> {
    fn problem(&self) -> Result<&'static Problem> {
        let id = self.parameters
            .first()
            .context("Expected a problem id, see `problems`.")?;

        catalog::problem(id).with_context(|| format!("No such problem: {id}, see `problems`."))
    }

    fn problems(&self) -> String {
        let mut output = String::from("**Problems:**");
        for problem in catalog::problems() {
            let ledger = &self.session.submissions;
            let best = ledger
                .best_score(&problem.id)
                .map_or_else(|| String::from("-"), |score| format!("{score}/100"));

            output += &format!(
                "\n\t{:<24} {:<7} {:<16} attempts: {:<3} best: {}",
                problem.id,
                problem.tags.level,
                problem.tags.concept,
                ledger.attempts(&problem.id),
                best
            );
        }
        output
    }

    fn show(&self) -> Result<String> {
        let problem = self.problem()?;
        self.session.submissions.seed_mock_if_empty(&problem.id);
        Ok(format!("{problem}\n\nUse `draft {id}` to see your code, `hints {id}` if you're stuck.",
                   id = problem.id))
    }

    fn hints(&self) -> Result<String> {
        let problem = self.problem()?;
        let hints = problem.hints
            .iter()
            .enumerate()
            .map(|(i, hint)| format!("\t{}. {hint}", i + 1))
            .join("\n");

        Ok(format!("**Hints for {}:**\n{hints}", problem.title))
    }

    fn draft(&self) -> Result<String> {
        let problem = self.problem()?;
        Ok(format!(
            "```go\n{}\n```\n(draft {})",
            self.session.drafts.load(problem).trim_end(),
            self.session.drafts.status(&problem.id)
        ))
    }

    async fn load(&self) -> Result<String> {
        let problem = self.problem()?;
        let path = self.parameters
            .get(1)
            .context("Expected usage: `load <problem id> <file>`")?;

        let code = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("No such file or directory: {path}"))?;

        self.session.drafts.edit(&problem.id, &code);
        Ok(format!("Draft for {} updated from {path} ({}).", problem.id, self.session.drafts.status(&problem.id)))
    }

    fn reset(&self) -> Result<String> {
        let problem = self.problem()?;
        self.session.drafts.reset(problem);
        Ok(format!("Draft for {} reset to the skeleton code.", problem.id))
    }

    async fn submit(&mut self) -> Result<String> {
        let problem = self.problem()?;
        let code = self.session.drafts.load(problem);

        println!("Submitting {} for review, this can take a moment...", problem.id);
        std::io::stdout().flush().ok();

        let mut credentials = PromptForKey::new(&self.session.api_key, self.input);
        let record = review::review_and_record(
            &self.session.client,
            &self.session.submissions,
            &mut credentials,
            problem,
            &code,
        )
        .await?;

        Ok(format!("{record}\n\n{}", record.review))
    }

    fn history(&self) -> Result<String> {
        let problem = self.problem()?;
        let ledger = &self.session.submissions;
        ledger.seed_mock_if_empty(&problem.id);

        let submissions = ledger.list(&problem.id);
        if submissions.is_empty() {
            return Ok(format!("No submissions for {} yet.", problem.id));
        }

        let mut output = format!("**History for {} ({}):**", problem.title, submissions.len());
        for (i, submission) in submissions.iter().enumerate() {
            output += &format!("\n{}. {submission}", i + 1);
        }
        Ok(output)
    }

    fn review(&self) -> Result<String> {
        let problem = self.problem()?;
        let get_usage = || format!("Expected usage: `review {} <n>`, see `history {}`.", problem.id, problem.id);

        let n: usize = self.parameters
            .get(1)
            .with_context(get_usage)?
            .parse()
            .with_context(get_usage)?;

        let submissions = self.session.submissions.list(&problem.id);
        let submission = n
            .checked_sub(1)
            .and_then(|i| submissions.get(i))
            .with_context(|| format!("No submission #{n} for {}.", problem.id))?;

        Ok(format!(
            "{submission}\n\n{}\n\n```go\n{}\n```",
            submission.review,
            submission.submission.code.trim_end()
        ))
    }
}

/// Multiple-choice questions
impl<T: ReviewTransport, R: AsyncBufRead + Unpin> CommandInstance<'_, T, R> {
    fn mcq(&self) -> Result<String> {
        let category = match self.parameters {
            [] => None,
            words => {
                let name = words.join(" ");
                Some(McqCategory::parse(&name).with_context(|| {
                    format!("Unknown category: {name}. Try one of: {}.",
                            McqCategory::ALL.iter().map(McqCategory::name).join(", "))
                })?)
            }
        };

        let bank = &self.session.mcqs;
        let answers = self.session.answers.get_all();

        let counts = bank.category_counts()
            .into_iter()
            .map(|(cat, count)| format!("{cat} ({count})"))
            .join(" | ");

        let mut output = format!("All ({}) | {counts}", bank.all().len());
        for mcq in bank.by_category(category) {
            let status = answers.get(&mcq.id).map_or("unanswered".to_string(), |s| s.to_string());
            let headline = mcq.question.lines().next().unwrap_or_default();
            output += &format!("\n\t{:<28} {:<11} {headline}", mcq.id, status);
        }
        Ok(output)
    }

    fn question(&self) -> Result<String> {
        let id = self.parameters.first().context("Expected a question id, see `mcq`.")?;
        let mcq = self.session.mcqs
            .find(id)
            .with_context(|| format!("No such question: {id}, see `mcq`."))?;

        let status = self.session.answers
            .status(id)
            .map_or_else(|| String::from("unanswered"), |s| s.to_string());

        Ok(format!("{mcq}\n\nStatus: {status}. Answer with `answer {id} <option number>`."))
    }

    fn answer(&self) -> Result<String> {
        let get_usage = || String::from("Expected usage: `answer <question id> <option number>`");
        let (id, choice) = match self.parameters {
            [id, choice, ..] => (*id, *choice),
            _ => return Err(anyhow!(get_usage())),
        };

        let mcq = self.session.mcqs
            .find(id)
            .with_context(|| format!("No such question: {id}, see `mcq`."))?;

        let choice: usize = choice.parse().with_context(get_usage)?;
        if !(1..=mcq.options.len()).contains(&choice) {
            return Err(anyhow!("Pick an option between 1 and {}.", mcq.options.len()));
        }

        let status = mcq.grade(choice - 1);
        self.session.answers.record_answer(&mcq.id, status);

        let verdict = match status {
            AnswerStatus::Passed => String::from("Correct!"),
            AnswerStatus::Failed => format!(
                "Incorrect. The answer is {}. {}",
                mcq.correct_answer_index + 1,
                mcq.options[mcq.correct_answer_index]
            ),
        };
        Ok(format!("{verdict}\n{}", mcq.explanation))
    }

    fn score(&self) -> String {
        let questions = self.session.mcqs.all();
        let history = self.session.answers.history(&questions);
        if history.is_empty() {
            return String::from("No questions answered yet. Start with `mcq`.");
        }

        let mut output = format!("**Score:** {}", self.session.answers.scorecard(&questions));
        for (mcq, status) in history {
            let mark = if status == AnswerStatus::Passed { "+" } else { "-" };
            output += &format!("\n\t{mark} {:<28} {}", mcq.id, mcq.category);
        }
        output
    }

    async fn addmcq(&self) -> Result<String> {
        let path = self.parameters
            .first()
            .context("Expected usage: `addmcq <file.json>`")?;

        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("No such file or directory: {path}"))?;
        let draft: McqDraft = serde_json::from_str(&text)
            .with_context(|| format!("{path} is not a valid question (see `help`)."))?;

        let mcq = self.session.mcqs.add_custom(draft)?;
        Ok(format!("Added custom question {}.", mcq.id))
    }

    fn clearmcqs(&self) -> String {
        self.session.mcqs.clear_custom();
        String::from("Custom questions removed.")
    }

    fn clearanswers(&self) -> String {
        self.session.answers.clear();
        String::from("Answer history cleared.")
    }
}

/// Settings
impl<T: ReviewTransport, R: AsyncBufRead + Unpin> CommandInstance<'_, T, R> {
    fn key(&self) -> Result<String> {
        let setting = &self.session.api_key;
        match self.parameters {
            [] => Ok(setting
                .masked()
                .map_or_else(|| String::from("No API key set."), |masked| format!("API key: {masked}"))),
            ["clear"] => {
                setting.clear();
                Ok(String::from("API key cleared."))
            }
            [key] => {
                setting.set(key);
                Ok(String::from("API key saved."))
            }
            _ => Err(anyhow!("Expected usage: `key [<api key>|clear]`")),
        }
    }
}

/// Non-async helpers
impl Commands {
    /// Ensures that the string slice conforms to C-like identifier regex
    fn is_valid_cmd(s: &str) -> bool {
        s.len() <= MAX_CMD_LENGTH && COMMAND_PATTERN.is_match(s)
    }

    /// Gets a help string. Should be updated after a new command is added
    pub fn get_help() -> String {
        String::from(
r#"
**Coding problems:**
`problems`:  List problems with your attempts and best score.
`show <id>`:  Show a problem statement.
`hints <id>`:  Show hints for a problem.
`draft <id>`:  Show your current code for a problem.
`load <id> <file>`:  Replace your draft with the contents of a file.
`reset <id>`:  Reset your draft to the skeleton code.
`submit <id>`:  Send your draft for an AI review.
`history <id>`:  List your past submissions.
`review <id> <n>`:  Show submission #n from the history in full.

**Multiple-choice questions:**
`mcq [category]`:  List questions, optionally for one category.
`question <id>`:  Show a question.
`answer <id> <n>`:  Answer a question with option n.
`score`:  Show your pass rate.
`addmcq <file>`:  Add a custom question from a JSON file with `question`,
    `options`, `correctAnswerIndex` (0-based), `explanation`, `category`,
    and optionally `codeSnippet`.
`clearmcqs`:  Remove all custom questions.
`clearanswers`:  Forget all answers.

**Settings:**
`key`:  Show the stored Gemini API key (masked).
`key <api key>`:  Store a Gemini API key.
`key clear`:  Remove the stored key.
`help`:  Get information on supported commands.
`quit`:  Leave.
"#)
    }
}
