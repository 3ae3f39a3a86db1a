use anyhow::Result;
use clap::Parser;
use machtiani::api::ApiError;
use machtiani::app::App;
use machtiani::cli::{Cli, Command};
use machtiani::config::Config;
use machtiani::terminal::Console;
use machtiani::util::is_local_endpoint_url;
use tracing_subscriber::EnvFilter;

fn init_tracing(cli: &Cli) {
    let answer_only = cli.command.is_none() && cli.prompt.is_answer_only();
    let verbose = match &cli.command {
        Some(Command::Sync(args)) => args.verbose,
        Some(_) => false,
        None => cli.prompt.verbose,
    };

    // Answer-only output must stay machine readable.
    let filter = if answer_only {
        EnvFilter::new("off")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = Config::load()?;
    config.validate()?;

    let app = App::new(config, Console::stdout())?;
    if let Err(error) = app.run(cli).await {
        if let Some(ApiError::Connect { url, .. }) = error.downcast_ref::<ApiError>() {
            if is_local_endpoint_url(url) {
                eprintln!(
                    "hint: no machtiani service is listening on {url}; start the local services \
                     or set MACHTIANI_URL / MACHTIANI_REPO_MANAGER_URL"
                );
            }
        }
        return Err(error);
    }
    Ok(())
}
