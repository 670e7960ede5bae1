use bracket15::app::{App, Config};
use bracket15::cli::{banner, output, Cli, Commands};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config: {e}");
            std::process::exit(1);
        }
    };

    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Commands::Run(args) = &cli.command {
        if args.json_logs {
            config.logging.json = true;
        }
    }
    config.init_logging();

    let result = match cli.command {
        Commands::Run(args) => run(config, args).await,
        Commands::Status => status(config).await,
        Commands::Unresolved => unresolved(config).await,
        Commands::Migrate => migrate(config).await,
    };

    if let Err(e) = result {
        error!(error = %e, "fatal error");
        std::process::exit(1);
    }
}

async fn run(config: Config, args: bracket15::cli::RunArgs) -> bracket15::error::Result<()> {
    if !args.no_banner {
        banner::print_banner();
    }

    info!("bracket15 starting");
    let app = App::bootstrap(config)?;

    let shutdown = async {
        let _ = signal::ctrl_c().await;
    };
    app.run(shutdown).await?;

    info!("bracket15 stopped");
    Ok(())
}

async fn status(config: Config) -> bracket15::error::Result<()> {
    let app = App::bootstrap(config)?;
    let report = app.status().await?;

    output::header(env!("CARGO_PKG_VERSION"));
    output::field("ws connected", report.ws_connected);
    output::field("tradeable", report.tradeable_markets);
    output::field("known slugs", report.known_slugs);
    output::field("trading enabled", report.trading_enabled);
    output::field("open brackets", report.open_brackets);
    output::field("notional today", report.estimated_notional_today);
    Ok(())
}

async fn unresolved(config: Config) -> bracket15::error::Result<()> {
    let app = App::bootstrap(config)?;
    let records = app.unresolved().await?;

    if records.is_empty() {
        output::success("no unresolved hedges");
        return Ok(());
    }

    output::section("unresolved hedges");
    for record in records {
        let label = record.slug.to_string();
        output::field(&label, format!("{:?} up={} down={}", record.state, record.up_token, record.down_token));
    }
    Ok(())
}

async fn migrate(config: Config) -> bracket15::error::Result<()> {
    App::bootstrap(config)?;
    output::success("migrations applied");
    Ok(())
}
