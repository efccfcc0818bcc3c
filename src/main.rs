use anyhow::Result;
use dotenv::dotenv;

use gointerview::shell;

#[tokio::main]
async fn main() -> Result<()> {
    // Begin logger
    env_logger::init();

    // Pick up GOINTERVIEW_DB, GEMINI_* and friends from .env in project root
    dotenv().ok();

    shell::run_shell().await
}
