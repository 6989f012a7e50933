use std::path::PathBuf;

use clap::Parser;

/// fx-archive CLI arguments
#[derive(Debug, Parser)]
#[command(
    name = "fx-archive",
    version,
    about = "Backfill a monthly CSV archive of daily historical exchange rates"
)]
pub struct Cli {
    /// Directory holding the monthly `YYYY-MM.csv` records
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// First year to backfill
    #[arg(long)]
    pub start_year: Option<i32>,

    /// Also fetch elapsed days of the current month (true or false)
    #[arg(long)]
    pub allow_partial_month: Option<bool>,

    /// Check quota and log the fetch plan without requesting any rates
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides() {
        let cli = Cli::parse_from([
            "fx-archive",
            "--data-dir",
            "/srv/rates",
            "--start-year",
            "2024",
            "--allow-partial-month",
            "true",
            "--dry-run",
        ]);

        assert_eq!(cli.data_dir, Some(PathBuf::from("/srv/rates")));
        assert_eq!(cli.start_year, Some(2024));
        assert_eq!(cli.allow_partial_month, Some(true));
        assert!(cli.dry_run);
    }

    #[test]
    fn no_arguments_means_no_overrides() {
        let cli = Cli::parse_from(["fx-archive"]);

        assert!(cli.data_dir.is_none());
        assert!(cli.start_year.is_none());
        assert!(cli.allow_partial_month.is_none());
        assert!(!cli.dry_run);
    }
}
