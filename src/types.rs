use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow, bail};
use chrono::Month;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Route {
    pub origin: String,
    pub destination: String,
}

impl Route {
    pub fn new(origin: &str, destination: &str) -> Result<Self> {
        Ok(Self {
            origin: airport_code(origin)?,
            destination: airport_code(destination)?,
        })
    }
}

fn airport_code(code: &str) -> Result<String> {
    let code = code.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        bail!("Invalid airport code: {code:?}");
    }
    Ok(code.to_ascii_uppercase())
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}→{}", self.origin, self.destination)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SearchMonth {
    pub month: u32,
    pub year: i32,
}

impl SearchMonth {
    pub fn new(month: u32, year: i32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            bail!("Month must be between 1 and 12, got {month}");
        }
        Ok(Self { month, year })
    }

    pub fn abbrev(&self) -> &'static str {
        // month is range checked in new()
        Month::try_from(self.month as u8)
            .map(|m| &m.name()[..3])
            .unwrap_or("???")
    }

    pub fn days_in_month(&self) -> u32 {
        let (next_year, next_month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        chrono::NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .and_then(|d| d.pred_opt())
            .map(|d| chrono::Datelike::day(&d))
            .unwrap_or(31)
    }
}

/// Cabin as labelled on the reward calendar.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Cabin {
    Economy,
    PremiumEconomy,
    UpperClass,
}

impl Cabin {
    pub fn label(&self) -> &'static str {
        match self {
            Cabin::Economy => "Economy",
            Cabin::PremiumEconomy => "Premium",
            Cabin::UpperClass => "Upper Class",
        }
    }
}

impl FromStr for Cabin {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect();
        match normalized.as_str() {
            "economy" => Ok(Cabin::Economy),
            "premium" | "premiumeconomy" => Ok(Cabin::PremiumEconomy),
            "upper" | "upperclass" => Ok(Cabin::UpperClass),
            _ => Err(anyhow!("Unknown cabin: {s:?}")),
        }
    }
}

impl fmt::Display for Cabin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DayPoints {
    pub day: u32,
    pub points: Option<u64>,
}

impl fmt::Display for DayPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.points {
            Some(points) => write!(f, "{}k pts", points / 1000),
            None => f.write_str("Not found"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PointsReport {
    pub month: SearchMonth,
    pub days: Vec<DayPoints>,
}

impl PointsReport {
    pub fn found(&self) -> usize {
        self.days.iter().filter(|d| d.points.is_some()).count()
    }
}

impl fmt::Display for PointsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abbrev = self.month.abbrev();
        for (i, day) in self.days.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}: {}", abbrev, day.day, day)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn october() -> SearchMonth {
        SearchMonth::new(10, 2025).unwrap()
    }

    #[test]
    fn test_route_uppercases() -> Result<()> {
        let route = Route::new("lhr", " blr ")?;
        assert_eq!(route.origin, "LHR");
        assert_eq!(route.destination, "BLR");
        assert_eq!(route.to_string(), "LHR→BLR");
        Ok(())
    }

    #[test]
    fn test_route_rejects_bad_code() {
        assert!(Route::new("LHRX", "BLR").is_err());
        assert!(Route::new("LH1", "BLR").is_err());
    }

    #[test]
    fn test_month_out_of_range() {
        assert!(SearchMonth::new(0, 2025).is_err());
        assert!(SearchMonth::new(13, 2025).is_err());
    }

    #[test]
    fn test_month_abbrev() {
        assert_eq!(october().abbrev(), "Oct");
        assert_eq!(SearchMonth::new(1, 2026).unwrap().abbrev(), "Jan");
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(october().days_in_month(), 31);
        assert_eq!(SearchMonth::new(2, 2024).unwrap().days_in_month(), 29);
        assert_eq!(SearchMonth::new(2, 2025).unwrap().days_in_month(), 28);
        assert_eq!(SearchMonth::new(12, 2025).unwrap().days_in_month(), 31);
    }

    #[test]
    fn test_cabin_parse() {
        assert_eq!("upper".parse::<Cabin>().unwrap(), Cabin::UpperClass);
        assert_eq!("Upper Class".parse::<Cabin>().unwrap(), Cabin::UpperClass);
        assert_eq!("upper-class".parse::<Cabin>().unwrap(), Cabin::UpperClass);
        assert_eq!("ECONOMY".parse::<Cabin>().unwrap(), Cabin::Economy);
        assert_eq!(
            "premium economy".parse::<Cabin>().unwrap(),
            Cabin::PremiumEconomy
        );
        assert!("first".parse::<Cabin>().is_err());
    }

    #[test]
    fn test_day_points_display_truncates() {
        let day = DayPoints {
            day: 19,
            points: Some(95_500),
        };
        assert_eq!(day.to_string(), "95k pts");
    }

    #[test]
    fn test_day_points_display_not_found() {
        let day = DayPoints {
            day: 19,
            points: None,
        };
        assert_eq!(day.to_string(), "Not found");
    }

    #[test]
    fn test_report_display() {
        let report = PointsReport {
            month: october(),
            days: vec![
                DayPoints {
                    day: 19,
                    points: Some(95_000),
                },
                DayPoints {
                    day: 20,
                    points: None,
                },
            ],
        };
        assert_eq!(report.to_string(), "Oct 19: 95k pts, Oct 20: Not found");
        assert_eq!(report.found(), 1);
    }
}
