use anyhow::Result;
use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use log::{error, info, warn};

use crate::config::TrackerConfig;

/// Earliest of `times` strictly after `now`, looking at today and tomorrow.
pub fn next_run<Tz: TimeZone>(now: &DateTime<Tz>, times: &[NaiveTime]) -> Option<DateTime<Tz>> {
    let today = now.date_naive();
    [Some(today), today.checked_add_days(Days::new(1))]
        .into_iter()
        .flatten()
        .flat_map(|date| times.iter().map(move |time| date.and_time(*time)))
        .filter_map(|naive| now.timezone().from_local_datetime(&naive).earliest())
        .filter(|candidate| candidate > now)
        .min()
}

pub async fn run_forever(config: &TrackerConfig) -> Result<()> {
    if config.times.is_empty() {
        warn!("No check times configured, nothing to schedule");
        return Ok(());
    }

    let times = config
        .times
        .iter()
        .map(|t| t.format("%H:%M").to_string())
        .collect::<Vec<_>>()
        .join(", ");
    info!("Scheduled checks daily at {times}");

    loop {
        let now = Local::now();
        let Some(next) = next_run(&now, &config.times) else {
            warn!("Could not work out the next check time after {now}");
            return Ok(());
        };
        info!("Next check at {}", next.format("%Y-%m-%d %H:%M"));

        let wait = (next - now).to_std().unwrap_or_default();
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Scheduler stopped");
                return Ok(());
            }
        }

        info!("Running flight check at {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
        match crate::check_and_notify(config).await {
            Ok(report) => info!("Flight check complete: {report}"),
            Err(e) => error!("Flight check failed: {e:#}"),
        }
    }
}
