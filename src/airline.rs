use jluszcz_rust_utils::query::http_get;

use crate::types::{Route, SearchMonth};

pub const AIRLINE_NAME: &str = "Virgin Atlantic";

const SITE_URL: &str = "https://www.virginatlantic.com";
const MONTH_RESULTS: &str = "reward-flight-finder/results/month";

fn query_params(route: &Route, month: &SearchMonth) -> [(&'static str, String); 4] {
    [
        ("origin", route.origin.clone()),
        ("destination", route.destination.clone()),
        ("month", month.month.to_string()),
        ("year", month.year.to_string()),
    ]
}

pub fn calendar_url(route: &Route, month: &SearchMonth) -> String {
    let query = query_params(route, month)
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}/{}?{}", SITE_URL, MONTH_RESULTS, query)
}

/// Fetches the calendar page without running any of its scripts.
pub async fn query_calendar(route: &Route, month: &SearchMonth) -> anyhow::Result<String> {
    let params = query_params(route, month);
    let params: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
    http_get(&format!("{}/{}", SITE_URL, MONTH_RESULTS), &params).await
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_calendar_url() {
        let route = Route::new("LHR", "BLR").unwrap();
        let month = SearchMonth::new(10, 2025).unwrap();
        assert_eq!(
            calendar_url(&route, &month),
            "https://www.virginatlantic.com/reward-flight-finder/results/month?origin=LHR&destination=BLR&month=10&year=2025"
        );
    }

    #[test]
    fn test_calendar_url_single_digit_month() {
        let route = Route::new("lhr", "jfk").unwrap();
        let month = SearchMonth::new(3, 2026).unwrap();
        assert!(calendar_url(&route, &month).ends_with("origin=LHR&destination=JFK&month=3&year=2026"));
    }
}
