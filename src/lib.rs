use anyhow::Result;
use log::{LevelFilter, info, warn};

use crate::browser::RenderedPage;
use crate::config::TrackerConfig;
use crate::report::{message, read_report, write_report};
use crate::types::PointsReport;

pub mod airline;
pub mod browser;
pub mod config;
pub mod extract;
pub mod notify;
pub mod report;
pub mod schedule;
pub mod types;

pub const APP_NAME: &str = "rewardseats";

pub fn set_up_logger(calling_module: &str, verbose: bool) -> Result<()> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(LevelFilter::Warn)
        .filter_module(APP_NAME, level)
        .filter_module(calling_module, level)
        .parse_default_env()
        .try_init()?;

    Ok(())
}

pub async fn check(config: &TrackerConfig) -> Result<PointsReport> {
    let page = browser::render(config).await?;
    record(config, &page).await
}

/// Extracts the configured days from a rendered page and writes the result file.
pub async fn record(config: &TrackerConfig, page: &RenderedPage) -> Result<PointsReport> {
    let report = extract::extract_points(page, config.month, &config.days, config.cabin);
    if report.found() == 0 {
        warn!(
            "No {} points found for {}, the page layout may have changed",
            config.cabin, config.route
        );
    }
    info!("Final results: {report}");

    write_report(&config.output, &report).await?;

    Ok(report)
}

fn report_message(config: &TrackerConfig, report: &PointsReport) -> String {
    message(&config.route, &report.to_string())
}

pub async fn check_and_notify(config: &TrackerConfig) -> Result<PointsReport> {
    let report = check(config).await?;
    config.notifier.send(&report_message(config, &report)).await?;
    Ok(report)
}

pub async fn notify_from_file(config: &TrackerConfig) -> Result<()> {
    let results = read_report(&config.output).await?;
    config
        .notifier
        .send(&message(&config.route, &results))
        .await
}
