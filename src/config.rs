use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::NaiveTime;
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::browser::Renderer;
use crate::notify::{Carrier, Notifier};
use crate::types::{Cabin, Route, SearchMonth};

const DEFAULT_DAYS: &[&str] = &["19", "20"];
const DEFAULT_TIMES: &[&str] = &["09:00", "20:00"];

#[derive(Debug)]
pub struct TrackerConfig {
    pub route: Route,
    pub month: SearchMonth,
    pub days: Vec<u32>,
    pub cabin: Cabin,
    pub renderer: Renderer,
    pub webdriver_url: String,
    pub headless: bool,
    pub settle: Duration,
    pub use_cache: bool,
    pub output: PathBuf,
    pub debug_dir: Option<PathBuf>,
    pub notifier: Notifier,
    pub times: Vec<NaiveTime>,
}

fn tracker_args() -> Vec<Arg> {
    vec![
        Arg::new("origin")
            .long("origin")
            .env("REWARD_ORIGIN")
            .default_value("LHR")
            .global(true)
            .help("Origin airport code."),
        Arg::new("destination")
            .long("destination")
            .env("REWARD_DESTINATION")
            .default_value("BLR")
            .global(true)
            .help("Destination airport code."),
        Arg::new("month")
            .long("month")
            .env("REWARD_MONTH")
            .default_value("10")
            .value_parser(clap::value_parser!(u32))
            .global(true)
            .help("Calendar month to check (1-12)."),
        Arg::new("year")
            .long("year")
            .env("REWARD_YEAR")
            .default_value("2025")
            .value_parser(clap::value_parser!(i32))
            .global(true)
            .help("Calendar year to check."),
        Arg::new("day")
            .short('d')
            .long("day")
            .env("REWARD_DAYS")
            .value_delimiter(',')
            .default_values(DEFAULT_DAYS)
            .value_parser(clap::value_parser!(u32))
            .action(ArgAction::Append)
            .global(true)
            .help("Day of month to report on. May be repeated."),
        Arg::new("cabin")
            .long("cabin")
            .env("REWARD_CABIN")
            .default_value("upper")
            .global(true)
            .help("Cabin to read points for: economy, premium or upper."),
        Arg::new("renderer")
            .long("renderer")
            .env("REWARD_RENDERER")
            .default_value("webdriver")
            .value_parser(["webdriver", "http"])
            .global(true)
            .help("How to load the calendar page."),
        Arg::new("webdriver-url")
            .long("webdriver-url")
            .env("WEBDRIVER_URL")
            .default_value("http://localhost:4444")
            .global(true)
            .help("WebDriver server to drive the browser through."),
        Arg::new("show-browser")
            .long("show-browser")
            .env("REWARD_SHOW_BROWSER")
            .action(ArgAction::SetTrue)
            .global(true)
            .help("Run the browser with a visible window."),
        Arg::new("settle-secs")
            .long("settle-secs")
            .env("REWARD_SETTLE_SECS")
            .default_value("5")
            .value_parser(clap::value_parser!(u64))
            .global(true)
            .help("Seconds to wait for the calendar to render."),
        Arg::new("use-cache")
            .short('c')
            .long("cache")
            .action(ArgAction::SetTrue)
            .global(true)
            .help("Use cached values, if present, rather than querying remote services."),
        Arg::new("output")
            .short('o')
            .long("output")
            .env("REWARD_OUTPUT")
            .default_value("extracted_points.txt")
            .value_parser(clap::value_parser!(PathBuf))
            .global(true)
            .help("File the extracted result is written to and read from."),
        Arg::new("debug-dir")
            .long("debug-dir")
            .env("REWARD_DEBUG_DIR")
            .value_parser(clap::value_parser!(PathBuf))
            .global(true)
            .help("Directory to save page text and screenshots to."),
        Arg::new("notifier")
            .short('n')
            .long("notifier")
            .env("REWARD_NOTIFIER")
            .default_value("stdout")
            .value_parser(["stdout", "desktop", "imessage", "carrier", "twilio"])
            .global(true)
            .help("Where to send the result."),
        Arg::new("recipient")
            .long("recipient")
            .env("REWARD_RECIPIENT")
            .global(true)
            .help("Phone number or address for imessage, carrier and twilio notifiers."),
        Arg::new("carrier")
            .long("carrier")
            .env("REWARD_CARRIER")
            .global(true)
            .help("Mobile carrier for the email-to-SMS gateway."),
        Arg::new("at")
            .long("at")
            .env("REWARD_TIMES")
            .value_delimiter(',')
            .default_values(DEFAULT_TIMES)
            .action(ArgAction::Append)
            .global(true)
            .help("Local time (HH:MM) to run scheduled checks at. May be repeated."),
    ]
}

pub fn command() -> Command {
    Command::new(crate::APP_NAME)
        .version("0.1")
        .author("Jacob Luszcz")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Verbose mode. Outputs DEBUG and higher log messages."),
        )
        .args(tracker_args())
        .subcommand(
            Command::new("check")
                .about("Check the reward calendar and write the result file.")
                .arg(
                    Arg::new("notify")
                        .long("notify")
                        .action(ArgAction::SetTrue)
                        .help("Send the result once the check completes."),
                ),
        )
        .subcommand(Command::new("notify").about("Send the last result file."))
        .subcommand(Command::new("schedule").about("Check and notify on a daily timer."))
}

fn string_arg<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .with_context(|| format!("--{id} is required"))
}

fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .with_context(|| format!("Invalid time {value:?}, expected HH:MM"))
}

fn notifier(matches: &ArgMatches) -> Result<Notifier> {
    let recipient = || string_arg(matches, "recipient").map(str::to_owned);

    Ok(match string_arg(matches, "notifier")? {
        "stdout" => Notifier::Stdout,
        "desktop" => Notifier::Desktop,
        "imessage" => Notifier::IMessage {
            recipient: recipient()?,
        },
        "carrier" => Notifier::CarrierGateway {
            number: recipient()?,
            carrier: string_arg(matches, "carrier")?.parse::<Carrier>()?,
        },
        "twilio" => Notifier::Twilio { to: recipient()? },
        other => bail!("Unknown notifier: {other}"),
    })
}

impl TrackerConfig {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let route = Route::new(
            string_arg(matches, "origin")?,
            string_arg(matches, "destination")?,
        )?;

        let month = SearchMonth::new(
            *matches.get_one::<u32>("month").context("--month is required")?,
            *matches.get_one::<i32>("year").context("--year is required")?,
        )?;

        let mut days: Vec<u32> = matches
            .get_many::<u32>("day")
            .map(|d| d.copied().collect())
            .unwrap_or_default();
        let mut seen = HashSet::new();
        days.retain(|day| seen.insert(*day));
        if days.is_empty() {
            bail!("At least one --day is required");
        }
        let last_day = month.days_in_month();
        if let Some(day) = days.iter().find(|d| **d == 0 || **d > last_day) {
            bail!("Day {day} is outside {} {}", month.abbrev(), month.year);
        }

        let renderer = string_arg(matches, "renderer")?.parse::<Renderer>()?;

        let mut times = matches
            .get_many::<String>("at")
            .map(|t| t.map(|s| parse_time(s)).collect::<Result<Vec<_>>>())
            .transpose()?
            .unwrap_or_default();
        times.sort();
        times.dedup();

        Ok(Self {
            route,
            month,
            days,
            cabin: string_arg(matches, "cabin")?.parse()?,
            renderer,
            webdriver_url: string_arg(matches, "webdriver-url")?.to_owned(),
            headless: !matches.get_flag("show-browser"),
            settle: Duration::from_secs(
                *matches
                    .get_one::<u64>("settle-secs")
                    .context("--settle-secs is required")?,
            ),
            use_cache: matches.get_flag("use-cache"),
            output: matches
                .get_one::<PathBuf>("output")
                .cloned()
                .context("--output is required")?,
            debug_dir: matches.get_one::<PathBuf>("debug-dir").cloned(),
            notifier: notifier(matches)?,
            times,
        })
    }

    /// Builds a config from environment variables and defaults alone, adjusted for
    /// Lambda: no local browser and a read-only working directory.
    pub fn from_lambda_env() -> Result<Self> {
        let matches = command()
            .subcommand_required(false)
            .try_get_matches_from([crate::APP_NAME])?;
        Self::lambda_from_matches(&matches, &std::env::temp_dir())
    }

    fn lambda_from_matches(matches: &ArgMatches, writable_dir: &Path) -> Result<Self> {
        let mut config = Self::from_matches(matches)?;
        if matches.value_source("renderer") == Some(ValueSource::DefaultValue) {
            config.renderer = Renderer::Http;
        }
        if config.output.is_relative() {
            config.output = writable_dir.join(&config.output);
        }
        Ok(config)
    }
}

#[cfg(test)]
pub(crate) fn test_config(output: PathBuf) -> TrackerConfig {
    TrackerConfig {
        route: Route::new("LHR", "BLR").unwrap(),
        month: SearchMonth::new(10, 2025).unwrap(),
        days: vec![19, 20],
        cabin: Cabin::UpperClass,
        renderer: Renderer::Http,
        webdriver_url: "http://localhost:4444".to_owned(),
        headless: true,
        settle: Duration::from_secs(0),
        use_cache: true,
        output,
        debug_dir: None,
        notifier: Notifier::Stdout,
        times: vec![],
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> Result<TrackerConfig> {
        let mut argv = vec![crate::APP_NAME];
        argv.extend_from_slice(args);
        let matches = command().try_get_matches_from(argv)?;
        let (_, sub) = matches.subcommand().context("no subcommand")?;
        TrackerConfig::from_matches(sub)
    }

    #[test]
    fn test_defaults() -> Result<()> {
        let config = parse(&["check"])?;
        assert_eq!(config.route.to_string(), "LHR→BLR");
        assert_eq!(config.month, SearchMonth::new(10, 2025)?);
        assert_eq!(config.days, vec![19, 20]);
        assert_eq!(config.cabin, Cabin::UpperClass);
        assert_eq!(config.renderer, Renderer::WebDriver);
        assert!(config.headless);
        assert_eq!(config.settle, Duration::from_secs(5));
        assert_eq!(config.output, PathBuf::from("extracted_points.txt"));
        assert_eq!(config.notifier, Notifier::Stdout);
        assert_eq!(
            config.times,
            vec![parse_time("09:00")?, parse_time("20:00")?]
        );
        Ok(())
    }

    #[test]
    fn test_days_comma_separated() -> Result<()> {
        let config = parse(&["check", "--day", "22,23"])?;
        assert_eq!(config.days, vec![22, 23]);
        Ok(())
    }

    #[test]
    fn test_days_repeated() -> Result<()> {
        let config = parse(&["--day", "22", "--day", "25", "check"])?;
        assert_eq!(config.days, vec![22, 25]);
        Ok(())
    }

    #[test]
    fn test_day_outside_month() {
        assert!(parse(&["check", "--month", "2", "--year", "2025", "--day", "30"]).is_err());
    }

    #[test]
    fn test_carrier_notifier() -> Result<()> {
        let config = parse(&[
            "notify",
            "--notifier",
            "carrier",
            "--recipient",
            "5551234567",
            "--carrier",
            "verizon",
        ])?;
        assert_eq!(
            config.notifier,
            Notifier::CarrierGateway {
                number: "5551234567".to_owned(),
                carrier: Carrier::Verizon,
            }
        );
        Ok(())
    }

    #[test]
    fn test_imessage_requires_recipient() {
        assert!(parse(&["notify", "--notifier", "imessage"]).is_err());
    }

    #[test]
    fn test_schedule_times_sorted() -> Result<()> {
        let config = parse(&["schedule", "--at", "20:00,07:30"])?;
        assert_eq!(config.times, vec![parse_time("07:30")?, parse_time("20:00")?]);
        Ok(())
    }

    #[test]
    fn test_repeated_day_reported_once() -> Result<()> {
        let config = parse(&["check", "--day", "19,20,19"])?;
        assert_eq!(config.days, vec![19, 20]);
        Ok(())
    }

    fn lambda_config(args: &[&str]) -> Result<TrackerConfig> {
        let mut argv = vec![crate::APP_NAME];
        argv.extend_from_slice(args);
        let matches = command()
            .subcommand_required(false)
            .try_get_matches_from(argv)?;
        TrackerConfig::lambda_from_matches(&matches, Path::new("/tmp"))
    }

    #[test]
    fn test_lambda_defaults_to_http() -> Result<()> {
        let config = lambda_config(&[])?;
        assert_eq!(config.renderer, Renderer::Http);
        assert_eq!(config.output, PathBuf::from("/tmp/extracted_points.txt"));
        Ok(())
    }

    #[test]
    fn test_lambda_keeps_explicit_renderer() -> Result<()> {
        let config = lambda_config(&["--renderer", "webdriver", "--output", "/var/out.txt"])?;
        assert_eq!(config.renderer, Renderer::WebDriver);
        assert_eq!(config.output, PathBuf::from("/var/out.txt"));
        Ok(())
    }

    #[test]
    fn test_bad_time() {
        assert!(parse(&["schedule", "--at", "25:00"]).is_err());
    }

    #[test]
    fn test_http_renderer() -> Result<()> {
        let config = parse(&["check", "--renderer", "http", "-c"])?;
        assert_eq!(config.renderer, Renderer::Http);
        assert!(config.use_cache);
        Ok(())
    }
}
