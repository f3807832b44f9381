use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use log::debug;

use crate::airline::AIRLINE_NAME;
use crate::types::{PointsReport, Route};

pub async fn write_report(path: &Path, report: &PointsReport) -> Result<()> {
    tokio::fs::write(path, report.to_string())
        .await
        .with_context(|| format!("Failed to write results to {}", path.display()))?;
    debug!("Wrote results to {}", path.display());
    Ok(())
}

pub async fn read_report(path: &Path) -> Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(results) => Ok(results.trim().to_owned()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(anyhow!(
            "No results found at {}. Run the check first.",
            path.display()
        )),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

pub fn message(route: &Route, results: &str) -> String {
    format!("{AIRLINE_NAME} {route}: {results}")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::{DayPoints, SearchMonth};

    #[tokio::test]
    async fn test_write_then_read() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("extracted_points.txt");
        let report = PointsReport {
            month: SearchMonth::new(10, 2025)?,
            days: vec![DayPoints {
                day: 22,
                points: Some(112_500),
            }],
        };

        write_report(&path, &report).await?;
        assert_eq!(tokio::fs::read_to_string(&path).await?, "Oct 22: 112k pts");
        assert_eq!(read_report(&path).await?, "Oct 22: 112k pts");
        Ok(())
    }

    #[tokio::test]
    async fn test_read_trims() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("extracted_points.txt");
        tokio::fs::write(&path, "Oct 19: 95k pts\n").await?;
        assert_eq!(read_report(&path).await?, "Oct 19: 95k pts");
        Ok(())
    }

    #[tokio::test]
    async fn test_read_missing() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let err = read_report(&dir.path().join("missing.txt"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Run the check first"));
        Ok(())
    }

    #[test]
    fn test_message() -> Result<()> {
        let route = Route::new("LHR", "BLR")?;
        assert_eq!(
            message(&route, "Oct 19: 95k pts, Oct 20: Not found"),
            "Virgin Atlantic LHR→BLR: Oct 19: 95k pts, Oct 20: Not found"
        );
        Ok(())
    }
}
