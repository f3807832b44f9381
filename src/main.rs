use log::debug;
use rewardseats::config::{TrackerConfig, command};
use rewardseats::set_up_logger;

#[derive(Debug)]
enum Action {
    Check { notify: bool },
    Notify,
    Schedule,
}

#[derive(Debug)]
struct Args {
    verbose: bool,
    action: Action,
    config: TrackerConfig,
}

fn parse_args() -> anyhow::Result<Args> {
    let matches = command().get_matches();

    let (name, sub) = matches
        .subcommand()
        .ok_or_else(|| anyhow::anyhow!("A subcommand is required"))?;

    let action = match name {
        "check" => Action::Check {
            notify: sub.get_flag("notify"),
        },
        "notify" => Action::Notify,
        "schedule" => Action::Schedule,
        other => anyhow::bail!("Unknown subcommand: {other}"),
    };

    let verbose = sub.get_flag("verbose");

    let config = TrackerConfig::from_matches(sub)?;

    Ok(Args {
        verbose,
        action,
        config,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args()?;
    set_up_logger(module_path!(), args.verbose)?;
    debug!("{args:?}");

    match args.action {
        Action::Check { notify: false } => {
            rewardseats::check(&args.config).await?;
        }
        Action::Check { notify: true } => {
            rewardseats::check_and_notify(&args.config).await?;
        }
        Action::Notify => rewardseats::notify_from_file(&args.config).await?,
        Action::Schedule => rewardseats::schedule::run_forever(&args.config).await?,
    }

    Ok(())
}
