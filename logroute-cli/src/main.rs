use clap::Parser;

use logroute_cli::cli::{Cli, Commands};
use logroute_cli::commands;
use logroute_cli::error::CliError;
use logroute_cli::logging;
use logroute_cli::output::OutputWriter;
use logroute_core::config::{GeneralConfig, LogrouteConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 진단 로그 설정은 설정 파일이 잘못되어도 기본값으로 시작
    let mut general = LogrouteConfig::load(&cli.config)
        .await
        .map(|c| c.general)
        .unwrap_or_else(|_| GeneralConfig::default());
    if let Some(level) = &cli.log_level {
        general.log_level = level.clone();
    }
    logging::init_tracing(&general)?;
    logroute_core::metrics::describe_all();

    tracing::debug!(config = %cli.config.display(), "logroute starting");

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);
    match cli.command {
        Commands::Emit(args) => commands::emit::execute(args, &cli.config, &writer).await,
        Commands::Route(args) => commands::route::execute(args, &cli.config, &writer).await,
        Commands::Decrypt(args) => commands::decrypt::execute(args, &cli.config, &writer).await,
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
    }
}
