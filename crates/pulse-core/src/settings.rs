use chrono::NaiveDate;
use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::classify::{Grouping, UnclassifiedPolicy};
use crate::error::{PulseError, Result};
use crate::formatting::DEFAULT_CURRENCY_SYMBOL;
use crate::period::{DateSanity, Granularity, DEFAULT_FLOOR_YEAR};
use crate::time_utils::validate_timezone;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Month-over-month and year-over-year studio performance reports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "studio-pulse",
    about = "Month-over-month and year-over-year studio performance reports",
    version
)]
pub struct Settings {
    /// Directory holding the spreadsheet exports
    #[arg(long, env = "STUDIO_PULSE_DATA")]
    pub data_path: Option<PathBuf>,

    /// Reporting period width
    #[arg(long, default_value = "month", value_parser = ["month", "year"])]
    pub granularity: String,

    /// Dimension to group rows by
    #[arg(long, default_value = "format", value_parser = ["format", "trainer", "day", "time", "location", "source", "stage", "all"])]
    pub group_by: String,

    /// What to do with records whose group cannot be determined
    #[arg(long, default_value = "bucket", value_parser = ["bucket", "skip"])]
    pub unclassified: String,

    /// Records dated before this year are ignored
    #[arg(long, default_value_t = DEFAULT_FLOOR_YEAR)]
    pub floor_year: i32,

    /// Keep records dated after today
    #[arg(long)]
    pub allow_future: bool,

    /// First period to include (YYYY-MM or YYYY)
    #[arg(long)]
    pub from: Option<String>,

    /// Last period to include (YYYY-MM or YYYY)
    #[arg(long)]
    pub to: Option<String>,

    /// Studio timezone used to decide what "today" is (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Currency symbol for revenue columns
    #[arg(long, default_value = DEFAULT_CURRENCY_SYMBOL)]
    pub currency: String,

    /// Report output format
    #[arg(long, default_value = "table", value_parser = ["table", "json"])]
    pub output: String,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.studio-pulse/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granularity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unclassified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir`.
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".studio-pulse").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to an explicit path, creating parent
    /// directories if needed.
    pub fn save_to(&self, path: &std::path::Path) -> std::result::Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &std::path::Path) -> std::result::Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── EngineConfig ───────────────────────────────────────────────────────────────

/// Everything the aggregation pipeline needs, built once at startup and
/// passed in explicitly.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub granularity: Granularity,
    pub grouping: Grouping,
    pub unclassified: UnclassifiedPolicy,
    pub sanity: DateSanity,
    /// Inclusive lower period bound.
    pub from: Option<String>,
    /// Inclusive upper period bound.
    pub to: Option<String>,
}

impl EngineConfig {
    /// Defaults: monthly, grouped by class format, unknowns bucketed.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            granularity: Granularity::default(),
            grouping: Grouping::default(),
            unclassified: UnclassifiedPolicy::default(),
            sanity: DateSanity::new(today),
            from: None,
            to: None,
        }
    }

    /// Whether `key` lies inside the optional `from`/`to` bounds.
    pub fn within_bounds(&self, key: &str) -> bool {
        let after_from = self.from.as_deref().map_or(true, |from| key >= from);
        let before_to = self.to.as_deref().map_or(true, |to| key <= to);
        after_from && before_to
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, resolve `"auto"` values, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Accepts args and an explicit config path so that tests can redirect
    /// to a temporary directory.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::resolve_auto_values(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins. Period bounds and the sanity flags are per-run and
        // never restored.
        if !is_arg_explicitly_set(&matches, "data_path") && settings.data_path.is_none() {
            settings.data_path = last.data_path;
        }
        if !is_arg_explicitly_set(&matches, "granularity") {
            if let Some(v) = last.granularity {
                settings.granularity = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "group_by") {
            if let Some(v) = last.group_by {
                settings.group_by = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "unclassified") {
            if let Some(v) = last.unclassified {
                settings.unclassified = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "timezone") {
            if let Some(v) = last.timezone {
                settings.timezone = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "currency") {
            if let Some(v) = last.currency {
                settings.currency = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "output") {
            if let Some(v) = last.output {
                settings.output = v;
            }
        }

        settings = Self::resolve_auto_values(settings);

        let params = LastUsedParams::from(&settings);
        let _ = params.save_to(config_path);

        settings
    }

    /// Resolve `"auto"` sentinel values and apply the `--debug` flag.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        if settings.timezone == "auto" {
            settings.timezone = crate::time_utils::get_system_timezone();
        }
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Build the pipeline configuration for a run on `today`.
    pub fn engine_config(&self, today: NaiveDate) -> Result<EngineConfig> {
        if !self.timezone.eq_ignore_ascii_case("auto") && !validate_timezone(&self.timezone) {
            return Err(PulseError::Config(format!(
                "unknown timezone: {}",
                self.timezone
            )));
        }
        let granularity: Granularity = self.granularity.parse()?;
        let grouping: Grouping = self.group_by.parse()?;
        let unclassified: UnclassifiedPolicy = self.unclassified.parse()?;

        let from = self
            .from
            .as_deref()
            .map(|s| validate_period_bound(s, granularity))
            .transpose()?;
        let to = self
            .to
            .as_deref()
            .map(|s| validate_period_bound(s, granularity))
            .transpose()?;
        if let (Some(f), Some(t)) = (&from, &to) {
            if f > t {
                return Err(PulseError::Config(format!(
                    "--from {} is after --to {}",
                    f, t
                )));
            }
        }

        Ok(EngineConfig {
            granularity,
            grouping,
            unclassified,
            sanity: DateSanity {
                floor_year: self.floor_year,
                reject_future: !self.allow_future,
                today,
            },
            from,
            to,
        })
    }
}

/// Check that `bound` is a well-formed key for `granularity`.
fn validate_period_bound(bound: &str, granularity: Granularity) -> Result<String> {
    let trimmed = bound.trim();
    let valid = match granularity {
        Granularity::Month => {
            trimmed.len() == 7
                && NaiveDate::parse_from_str(&format!("{}-01", trimmed), "%Y-%m-%d").is_ok()
        }
        Granularity::Year => trimmed.len() == 4 && trimmed.chars().all(|c| c.is_ascii_digit()),
    };
    if valid {
        Ok(trimmed.to_string())
    } else {
        Err(PulseError::Config(format!(
            "\"{}\" is not a valid {} period",
            bound, granularity
        )))
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            data_path: s.data_path.clone(),
            granularity: Some(s.granularity.clone()),
            group_by: Some(s.group_by.clone()),
            unclassified: Some(s.unclassified.clone()),
            timezone: Some(s.timezone.clone()),
            currency: Some(s.currency.clone()),
            output: Some(s.output.clone()),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tmp_config_path(tmp: &TempDir) -> PathBuf {
        LastUsedParams::config_path_in(tmp.path())
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn args(list: &[&str]) -> Vec<std::ffi::OsString> {
        list.iter().map(|s| s.into()).collect()
    }

    // ── LastUsedParams ────────────────────────────────────────────────────────

    #[test]
    fn test_last_used_params_save_load() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        let params = LastUsedParams {
            data_path: Some(PathBuf::from("/srv/exports")),
            granularity: Some("year".to_string()),
            group_by: Some("trainer".to_string()),
            unclassified: Some("skip".to_string()),
            timezone: Some("Asia/Kolkata".to_string()),
            currency: Some("$".to_string()),
            output: Some("json".to_string()),
        };
        params.save_to(&path).expect("save");
        let loaded = LastUsedParams::load_from(&path);

        assert_eq!(loaded.data_path, Some(PathBuf::from("/srv/exports")));
        assert_eq!(loaded.granularity, Some("year".to_string()));
        assert_eq!(loaded.group_by, Some("trainer".to_string()));
        assert_eq!(loaded.unclassified, Some("skip".to_string()));
        assert_eq!(loaded.timezone, Some("Asia/Kolkata".to_string()));
        assert_eq!(loaded.currency, Some("$".to_string()));
        assert_eq!(loaded.output, Some("json".to_string()));
    }

    #[test]
    fn test_last_used_params_default_when_missing() {
        let tmp = TempDir::new().expect("tempdir");
        let loaded = LastUsedParams::load_from(&tmp_config_path(&tmp));
        assert!(loaded.granularity.is_none());
        assert!(loaded.group_by.is_none());
        assert!(loaded.data_path.is_none());
    }

    #[test]
    fn test_last_used_params_corrupt_file_is_default() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert!(LastUsedParams::load_from(&path).group_by.is_none());
    }

    // ── Settings parsing ──────────────────────────────────────────────────────

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["studio-pulse"]);

        assert_eq!(settings.granularity, "month");
        assert_eq!(settings.group_by, "format");
        assert_eq!(settings.unclassified, "bucket");
        assert_eq!(settings.floor_year, 2020);
        assert!(!settings.allow_future);
        assert!(settings.from.is_none());
        assert!(settings.to.is_none());
        assert_eq!(settings.timezone, "auto");
        assert_eq!(settings.currency, "₹");
        assert_eq!(settings.output, "table");
        assert_eq!(settings.log_level, "INFO");
        assert!(!settings.debug);
        assert!(!settings.clear);
    }

    #[test]
    fn test_settings_rejects_unknown_grouping() {
        assert!(Settings::try_parse_from(["studio-pulse", "--group-by", "weather"]).is_err());
    }

    // ── load_with_last_used ───────────────────────────────────────────────────

    #[test]
    fn test_load_with_last_used_merges_persisted_grouping() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            group_by: Some("trainer".to_string()),
            timezone: Some("UTC".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings = Settings::load_with_last_used_impl(args(&["studio-pulse"]), &config_path);
        assert_eq!(settings.group_by, "trainer");
        assert_eq!(settings.timezone, "UTC");
    }

    #[test]
    fn test_load_with_last_used_cli_overrides_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            group_by: Some("trainer".to_string()),
            timezone: Some("UTC".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings = Settings::load_with_last_used_impl(
            args(&["studio-pulse", "--group-by", "location"]),
            &config_path,
        );
        assert_eq!(settings.group_by, "location");
    }

    #[test]
    fn test_load_with_last_used_clear_removes_file() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            output: Some("json".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings = Settings::load_with_last_used_impl(
            args(&["studio-pulse", "--clear", "--timezone", "UTC"]),
            &config_path,
        );

        assert!(!config_path.exists(), "file must be gone after --clear");
        assert_eq!(settings.output, "table");
    }

    #[test]
    fn test_load_with_last_used_debug_overrides_log_level() {
        let tmp = TempDir::new().expect("tempdir");
        let settings = Settings::load_with_last_used_impl(
            args(&["studio-pulse", "--debug", "--timezone", "UTC"]),
            &tmp_config_path(&tmp),
        );
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_load_with_last_used_persists_after_run() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        Settings::load_with_last_used_impl(
            args(&["studio-pulse", "--granularity", "year", "--timezone", "UTC"]),
            &config_path,
        );

        let loaded = LastUsedParams::load_from(&config_path);
        assert_eq!(loaded.granularity, Some("year".to_string()));
        assert_eq!(loaded.timezone, Some("UTC".to_string()));
    }

    #[test]
    fn test_period_bounds_are_not_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        Settings::load_with_last_used_impl(
            args(&["studio-pulse", "--from", "2025-01", "--timezone", "UTC"]),
            &config_path,
        );
        let second = Settings::load_with_last_used_impl(args(&["studio-pulse"]), &config_path);
        assert!(second.from.is_none());
    }

    // ── engine_config ─────────────────────────────────────────────────────────

    #[test]
    fn test_engine_config_from_defaults() {
        let settings = Settings::parse_from(["studio-pulse"]);
        let config = settings.engine_config(today()).expect("config");

        assert_eq!(config.granularity, Granularity::Month);
        assert_eq!(config.grouping, Grouping::Format);
        assert_eq!(config.unclassified, UnclassifiedPolicy::Bucket);
        assert_eq!(config.sanity.floor_year, 2020);
        assert!(config.sanity.reject_future);
        assert_eq!(config.sanity.today, today());
    }

    #[test]
    fn test_engine_config_allow_future_and_floor() {
        let settings = Settings::parse_from([
            "studio-pulse",
            "--allow-future",
            "--floor-year",
            "2022",
            "--granularity",
            "year",
        ]);
        let config = settings.engine_config(today()).expect("config");
        assert!(!config.sanity.reject_future);
        assert_eq!(config.sanity.floor_year, 2022);
        assert_eq!(config.granularity, Granularity::Year);
    }

    #[test]
    fn test_engine_config_validates_bounds() {
        let ok = Settings::parse_from(["studio-pulse", "--from", "2025-01", "--to", "2025-03"]);
        let config = ok.engine_config(today()).expect("config");
        assert!(config.within_bounds("2025-02"));
        assert!(!config.within_bounds("2024-12"));
        assert!(!config.within_bounds("2025-04"));

        let malformed = Settings::parse_from(["studio-pulse", "--from", "2025-13"]);
        assert!(matches!(
            malformed.engine_config(today()),
            Err(PulseError::Config(_))
        ));

        let wrong_width = Settings::parse_from(["studio-pulse", "--granularity", "year", "--to", "2025-01"]);
        assert!(wrong_width.engine_config(today()).is_err());

        let inverted = Settings::parse_from(["studio-pulse", "--from", "2025-05", "--to", "2025-01"]);
        assert!(inverted.engine_config(today()).is_err());
    }

    #[test]
    fn test_engine_config_rejects_unknown_timezone() {
        let bad = Settings::parse_from(["studio-pulse", "--timezone", "Mars/Olympus"]);
        assert!(matches!(
            bad.engine_config(today()),
            Err(PulseError::Config(_))
        ));
        let good = Settings::parse_from(["studio-pulse", "--timezone", "Asia/Kolkata"]);
        assert!(good.engine_config(today()).is_ok());
    }

    #[test]
    fn test_from_settings_to_last_used() {
        let settings = Settings::parse_from(["studio-pulse", "--group-by", "day", "--output", "json"]);
        let last = LastUsedParams::from(&settings);
        assert_eq!(last.group_by, Some("day".to_string()));
        assert_eq!(last.output, Some("json".to_string()));
        assert_eq!(last.granularity, Some("month".to_string()));
    }
}
