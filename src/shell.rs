pub mod commands;

use std::io::Write;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use crate::config::Config;
use crate::review::{CredentialProvider, GeminiClient, ReviewClient, ReviewTransport};
use crate::store::Store;
use crate::store::answers::AnswerLedger;
use crate::store::drafts::DraftEditor;
use crate::store::mcqs::McqBank;
use crate::store::settings::ApiKeySetting;
use crate::store::submissions::SubmissionLedger;

use commands::Commands;

/// Everything a command can touch. All state lives in the store; the
/// components here are views over it.
pub struct Session<T> {
    pub store: Store,
    pub submissions: SubmissionLedger,
    pub answers: AnswerLedger,
    pub mcqs: McqBank,
    pub drafts: DraftEditor,
    pub api_key: ApiKeySetting,
    pub client: ReviewClient<T>,
}

impl<T: ReviewTransport> Session<T> {
    pub fn new(store: Store, client: ReviewClient<T>, config: &Config) -> Self {
        Self {
            submissions: SubmissionLedger::new(&store),
            answers: AnswerLedger::new(&store),
            mcqs: McqBank::new(&store),
            drafts: DraftEditor::new(&store, config.save_debounce),
            api_key: ApiKeySetting::new(&store),
            client,
            store,
        }
    }
}

pub async fn run_shell() -> Result<()> {
    let config = Config::from_env().context("Could not load configuration.")?;
    log::info!("[run_shell] Using store at {}", config.db_path.display());

    let transport = GeminiClient::new(&config.api_base, &config.model, config.request_timeout)?;
    let session = Session::new(
        Store::open(&config.db_path),
        ReviewClient::new(transport, config.temperature),
        &config,
    );

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    println!("Go interview practice. Type `help` for commands, `quit` to leave.");

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = input.next_line().await.context("Could not read from stdin.")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "quit" | "exit") {
            break;
        }

        // A review is awaited here before the next line is read, so at most
        // one is ever in flight.
        let response = match Commands::run_command(&session, &mut input, line).await {
            Ok(message) => message,
            Err(err) => format!("ERROR: {err}"),
        };

        if !response.is_empty() {
            println!("{response}");
        }
    }

    log::info!("[run_shell] Goodbye.");
    Ok(())
}

/// Uses the stored key, or asks for one on the shell's input and stores it.
pub struct PromptForKey<'a, R> {
    setting: &'a ApiKeySetting,
    input: &'a mut Lines<R>,
}

impl<'a, R> PromptForKey<'a, R> {
    pub fn new(setting: &'a ApiKeySetting, input: &'a mut Lines<R>) -> Self {
        Self { setting, input }
    }
}

impl<R: AsyncBufRead + Unpin> CredentialProvider for PromptForKey<'_, R> {
    async fn credential(&mut self) -> Option<String> {
        if let Some(key) = self.setting.get() {
            return Some(key);
        }

        println!("A Gemini API key is needed to review code. Paste it below (blank to cancel).");
        print!("key> ");
        std::io::stdout().flush().ok();

        let line = self.input
            .next_line()
            .await
            .inspect_err(|err| log::error!("[credential] Could not read API key: {err}"))
            .ok()
            .flatten()?;

        let key = line.trim();
        if key.is_empty() {
            return None;
        }

        self.setting.set(key);
        Some(key.to_string())
    }
}
