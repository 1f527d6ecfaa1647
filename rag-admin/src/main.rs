use ai_llm_service::telemetry;
use anyhow::Context;
use clap::Parser;
use rag_admin::{
    cli::{Cli, Commands},
    commands,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(e) if e.not_found() => {}
        Err(e) => return Err(e).context("failed to load .env"),
    }
    telemetry::init("warn,rag_admin=info,rag_store=info").context("failed to initialise logging")?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Provision => commands::provision::run().await,
        Commands::GenerateLogs {
            out,
            seed,
            days,
            probability,
        } => commands::generate_logs::run(&out, seed, days, probability),
        Commands::Load {
            file,
            generate,
            seed,
            no_progress,
        } => {
            let source = match (file, generate) {
                (Some(path), _) => commands::load::Source::File(path),
                (None, _) => commands::load::Source::Generated { seed },
            };
            commands::load::run(source, !no_progress).await
        }
        Commands::Search { query, k } => commands::search::run(&query, k).await,
        Commands::Ask {
            query,
            url,
            no_stream,
        } => commands::ask::run(&url, query, !no_stream).await,
        Commands::Upload { file } => commands::upload::run(&file).await,
    }
}
