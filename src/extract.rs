use std::sync::LazyLock;

use log::{debug, info};
use regex::{Captures, Regex};

use crate::browser::RenderedPage;
use crate::types::{Cabin, DayPoints, PointsReport, SearchMonth};

const POINTS: &str = r"(?P<num>\d{1,3}(?:,\d{3})+|\d+(?:\.\d+)?)\s*(?P<k>k)?\s*(?:pts|points)\b";

/// A day heading on the calendar: "Sun 19", "Sunday 19" or "19 Economy".
static DAY_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:sun|mon|tue(?:s)?|wed(?:nes)?|thu(?:r(?:s)?)?|fri|sat(?:ur)?)(?:day)?\.?\s+(?P<wday>\d{1,2})|(?P<eday>\d{1,2})\s+economy)\b",
    )
    .unwrap()
});

/// Points quoted next to a cabin label.
static CABIN_POINTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?P<prefix>premium\s+)?(?P<label>upper\s+class|premium|economy)(?:\s+economy)?\s+{POINTS}"
    ))
    .unwrap()
});

static BARE_POINTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i){POINTS}")).unwrap());

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Heading {
    /// "Sun 19"
    Weekday,
    /// "19 Economy"
    Economy,
}

/// A stretch of page text that starts at a day heading and runs up to the next one.
#[derive(Debug, PartialEq)]
struct DaySegment<'a> {
    day: u32,
    heading: Heading,
    text: &'a str,
}

fn day_segments(text: &str) -> Vec<DaySegment<'_>> {
    let headings: Vec<(u32, Heading, usize)> = DAY_TOKEN
        .captures_iter(text)
        .filter_map(|c| {
            let start = c.get(0)?.start();
            let (day, heading) = match (c.name("wday"), c.name("eday")) {
                (Some(day), _) => (day, Heading::Weekday),
                (None, Some(day)) => (day, Heading::Economy),
                (None, None) => return None,
            };
            Some((day.as_str().parse().ok()?, heading, start))
        })
        .collect();

    headings
        .iter()
        .enumerate()
        .map(|(i, (day, heading, start))| {
            let end = headings
                .get(i + 1)
                .map(|(_, _, s)| *s)
                .unwrap_or(text.len());
            DaySegment {
                day: *day,
                heading: *heading,
                text: &text[*start..end],
            }
        })
        .collect()
}

fn parse_points(captures: &Captures) -> Option<u64> {
    let raw = captures.name("num")?.as_str().replace(',', "");
    let value: f64 = raw.parse().ok()?;
    let value = if captures.name("k").is_some() {
        value * 1000.0
    } else {
        value
    };
    Some(value.round() as u64)
}

fn cabin_of(captures: &Captures) -> Option<Cabin> {
    let label = captures.name("label")?.as_str().to_ascii_lowercase();
    if captures.name("prefix").is_some() || label == "premium" {
        Some(Cabin::PremiumEconomy)
    } else if label == "economy" {
        Some(Cabin::Economy)
    } else {
        Some(Cabin::UpperClass)
    }
}

fn cabin_points(text: &str, cabin: Cabin) -> Option<u64> {
    CABIN_POINTS
        .captures_iter(text)
        .find(|c| cabin_of(c) == Some(cabin))
        .and_then(|c| parse_points(&c))
}

/// Weekday headings are tried before "N Economy" headings.
fn points_from_text(text: &str, day: u32, cabin: Cabin) -> Option<u64> {
    let segments = day_segments(text);
    [Heading::Weekday, Heading::Economy]
        .into_iter()
        .find_map(|heading| {
            segments
                .iter()
                .filter(|segment| segment.day == day && segment.heading == heading)
                .find_map(|segment| {
                    let points = cabin_points(segment.text, cabin)?;
                    debug!("Day {day} matched in text: {}", segment.text.trim());
                    Some(points)
                })
        })
}

/// Whether the day appears as a whole number in the cell, outside any points figure.
fn cell_has_day(cell: &str, day: u32) -> bool {
    let without_points = BARE_POINTS.replace_all(cell, " ");
    let day = day.to_string();
    without_points
        .split(|c: char| !c.is_ascii_digit())
        .any(|token| token == day)
}

fn points_from_cells(cells: &[String], day: u32, cabin: Cabin) -> Option<u64> {
    cells
        .iter()
        .filter(|cell| cell_has_day(cell, day))
        .find_map(|cell| {
            let points = cabin_points(cell, cabin)
                .or_else(|| BARE_POINTS.captures(cell).and_then(|c| parse_points(&c)))?;
            debug!("Day {day} matched in calendar cell: {}", cell.trim());
            Some(points)
        })
}

pub fn extract_points(
    page: &RenderedPage,
    month: SearchMonth,
    days: &[u32],
    cabin: Cabin,
) -> PointsReport {
    info!("Extracting {cabin} points for {} {days:?}", month.abbrev());

    let days = days
        .iter()
        .map(|&day| DayPoints {
            day,
            points: points_from_text(&page.text, day, cabin)
                .or_else(|| points_from_cells(&page.cells, day, cabin)),
        })
        .collect();

    PointsReport { month, days }
}
