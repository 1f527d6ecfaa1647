use ai_llm_service::telemetry;
use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; a malformed one is not.
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(e) if e.not_found() => {}
        Err(e) => return Err(e).context("failed to load .env"),
    }

    telemetry::init("info").context("failed to initialise logging")?;

    api::start().await.context("RAG service stopped with an error")?;
    Ok(())
}
