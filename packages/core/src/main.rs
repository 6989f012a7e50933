use clap::Parser;
use dotenvy::dotenv;
use tokio::signal;

use fx_archive::cli::Cli;
use fx_archive::clock::SystemClock;
use fx_archive::config::Config;
use fx_archive::error::AppError;
use fx_archive::logging::init_logging;
use fx_archive::metrics::AppMetrics;
use fx_archive::scheduler::{plan_backfill_pass, run_backfill_pass};
use fx_archive::services::freecurrency::FreeCurrencyClient;

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let config = Config::from_env()
        .and_then(|config| config.with_overrides(&cli))
        .map_err(AppError::Config)
        .unwrap_or_else(|err| {
            tracing::error!("{}", err);
            std::process::exit(1);
        });

    tracing::info!("Backfill started with config: {:?}", config);

    let code = match run(&cli, &config).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{}", err);
            1
        }
    };
    std::process::exit(code);
}

async fn run(cli: &Cli, config: &Config) -> Result<i32, AppError> {
    let client = FreeCurrencyClient::new(
        config.api_base_url.clone(),
        config.api_key.clone(),
        config.request_timeout(),
    )?;
    let clock = SystemClock;

    if cli.dry_run {
        let planned = plan_backfill_pass(&client, &clock, config).await?;
        tracing::info!(
            "Dry run: {} dates missing, monthly quota remaining {}",
            planned.plan.len(),
            planned.quota.month_remaining,
        );
        for date in &planned.plan {
            tracing::debug!("  would fetch {}", date);
        }
        return Ok(0);
    }

    let report = tokio::select! {
        report = run_backfill_pass(&client, &clock, config) => report,
        _ = signal::ctrl_c() => {
            tracing::warn!("Shutdown signal received. Dates stored so far are kept.");
            return Ok(130);
        }
    };

    if let Some(path) = &config.metrics_textfile {
        let metrics = AppMetrics::new().map_err(|err| AppError::Metrics(err.to_string()))?;
        metrics.observe_pass(&report);
        if let Err(err) = metrics.write_textfile(path) {
            tracing::warn!("Failed to write metrics to {}: {}", path.display(), err);
        }
    }

    match &report.error {
        Some(err) => {
            tracing::error!("Pass ended early: {}", err);
            Ok(1)
        }
        None => Ok(0),
    }
}
