use anyhow::{Context, Result, anyhow, bail};
use chrono::{Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const APP_DIR: &str = ".TeamPulse";
const CONFIG_FILE: &str = "config.json";
const DEFAULT_DIGEST_TIME: &str = "08:30";
pub const DEFAULT_ORG_ID: &str = "default";
pub const MAX_LOOKBACK_DAYS: u32 = 90;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    pub api_port: u16,
    pub digest_time: String,
    pub digest_dir: PathBuf,
    pub default_org_id: String,
    pub ai_enabled: bool,
    pub ai_api_key: Option<String>,
    pub ai_api_base_url: String,
    pub ai_model: String,
    pub ai_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            db_path: root.join("db").join("teampulse.db"),
            api_port: 7891,
            digest_time: DEFAULT_DIGEST_TIME.to_string(),
            digest_dir: default_digest_dir(),
            default_org_id: DEFAULT_ORG_ID.to_string(),
            ai_enabled: false,
            ai_api_key: None,
            ai_api_base_url: "https://api.openai.com/v1".to_string(),
            ai_model: "gpt-4o-mini".to_string(),
            ai_timeout_seconds: 20,
        }
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        set_mode_600(path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        fs::create_dir_all(&self.digest_dir).with_context(|| {
            format!(
                "Failed to create digest directory: {}",
                self.digest_dir.display()
            )
        })?;

        Ok(())
    }

    pub fn parse_digest_time(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.digest_time)
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "db_path" => {
                self.db_path = expand_home(value);
            }
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "digest_time" => {
                parse_hhmm(value)?;
                self.digest_time = value.to_string();
            }
            "digest_dir" => {
                self.digest_dir = expand_home(value);
            }
            "default_org_id" => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    bail!("default_org_id must not be empty");
                }
                self.default_org_id = trimmed.to_string();
            }
            "ai_enabled" => {
                self.ai_enabled = value
                    .parse::<bool>()
                    .map_err(|_| anyhow!("ai_enabled must be true/false"))?;
            }
            "ai_api_key" => {
                self.ai_api_key = (!value.trim().is_empty()).then_some(value.to_string());
            }
            "ai_api_base_url" => {
                self.ai_api_base_url = value.trim().trim_end_matches('/').to_string();
            }
            "ai_model" => {
                self.ai_model = value.trim().to_string();
            }
            "ai_timeout_seconds" => {
                self.ai_timeout_seconds = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("ai_timeout_seconds must be a number"))?
                    .max(5);
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: db_path|db.path, api_port|api.port, digest_time|digest.time, digest_dir|digest.dir, default_org_id|org.default, ai_enabled|ai.enabled, ai_api_key|ai.api_key, ai_api_base_url|ai.base_url, ai_model|ai.model, ai_timeout_seconds|ai.timeout_seconds"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "db_path" => Some(self.db_path.display().to_string()),
            "api_port" => Some(self.api_port.to_string()),
            "digest_time" => Some(self.digest_time.clone()),
            "digest_dir" => Some(self.digest_dir.display().to_string()),
            "default_org_id" => Some(self.default_org_id.clone()),
            "ai_enabled" => Some(self.ai_enabled.to_string()),
            "ai_api_key" => Some(
                self.ai_api_key
                    .as_ref()
                    .map(|_| "***set***".to_string())
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "ai_api_base_url" => Some(self.ai_api_base_url.clone()),
            "ai_model" => Some(self.ai_model.clone()),
            "ai_timeout_seconds" => Some(self.ai_timeout_seconds.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantSettings {
    pub timezone: String,
    pub work_start: String,
    pub work_end: String,
    pub break_minutes: u32,
    // ISO weekday numbers, 1 = Monday .. 7 = Sunday.
    pub work_days: Vec<u8>,
    pub ai_policy: AiPolicy,
    pub thresholds: RiskThresholds,
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            timezone: "Europe/Kyiv".to_string(),
            work_start: "09:00".to_string(),
            work_end: "18:00".to_string(),
            break_minutes: 60,
            work_days: vec![1, 2, 3, 4, 5],
            ai_policy: AiPolicy::default(),
            thresholds: RiskThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiPolicy {
    pub manager_digest_enabled: bool,
    pub ai_mentor_enabled: bool,
    pub tone: String,
}

impl Default for AiPolicy {
    fn default() -> Self {
        Self {
            manager_digest_enabled: false,
            ai_mentor_enabled: false,
            tone: "supportive".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub lookback_days: u32,
    pub not_submitted_high_days: u32,
    pub no_big_task_medium_days: u32,
    pub max_planned_tasks: u32,
    pub low_report_rate: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            lookback_days: 14,
            not_submitted_high_days: 3,
            no_big_task_medium_days: 2,
            max_planned_tasks: 10,
            low_report_rate: 0.7,
        }
    }
}

impl TenantSettings {
    pub fn validate(&self) -> Result<()> {
        self.tz()?;
        let start = parse_hhmm(&self.work_start)?;
        let end = parse_hhmm(&self.work_end)?;

        if end <= start {
            bail!(
                "work_end ({}) must be later than work_start ({})",
                self.work_end,
                self.work_start
            );
        }

        if let Some(day) = self.work_days.iter().find(|day| !(1..=7).contains(*day)) {
            bail!("work_days must use ISO weekday numbers 1..7, got {day}");
        }

        if !(1..=MAX_LOOKBACK_DAYS).contains(&self.thresholds.lookback_days) {
            bail!(
                "thresholds.lookback_days must be within 1..={MAX_LOOKBACK_DAYS}, got {}",
                self.thresholds.lookback_days
            );
        }

        Ok(())
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|error| anyhow!("Invalid timezone {}: {error}", self.timezone))
    }

    pub fn today(&self) -> Result<NaiveDate> {
        let tz = self.tz()?;
        Ok(Utc::now().with_timezone(&tz).date_naive())
    }

    pub fn workday_hours(&self) -> f64 {
        let window = parse_hhmm(&self.work_start)
            .and_then(|start| parse_hhmm(&self.work_end).map(|end| end - start))
            .map(|span| span.num_minutes())
            .unwrap_or(9 * 60);

        let minutes = (window - i64::from(self.break_minutes)).max(60);
        minutes as f64 / 60.0
    }

    pub fn is_work_day(&self, date: NaiveDate) -> bool {
        if self.work_days.is_empty() {
            return true;
        }

        let iso = iso_weekday(date.weekday());
        self.work_days.contains(&iso)
    }
}

fn iso_weekday(weekday: Weekday) -> u8 {
    u8::try_from(weekday.number_from_monday()).unwrap_or(1)
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "db_path" | "db.path" => "db_path",
        "api_port" | "api.port" => "api_port",
        "digest_time" | "digest.time" => "digest_time",
        "digest_dir" | "digest.dir" => "digest_dir",
        "default_org_id" | "org.default" => "default_org_id",
        "ai_enabled" | "ai.enabled" => "ai_enabled",
        "ai_api_key" | "ai.api_key" => "ai_api_key",
        "ai_api_base_url" | "ai.base_url" => "ai_api_base_url",
        "ai_model" | "ai.model" => "ai_model",
        "ai_timeout_seconds" | "ai.timeout_seconds" => "ai_timeout_seconds",
        _ => key,
    }
}

pub fn parse_hhmm(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .with_context(|| format!("Invalid time format: {value}. Example: 08:30 (24-hour format)"))
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

pub fn default_digest_dir() -> PathBuf {
    default_root_dir().join("digests")
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_workday_is_eight_hours() {
        let settings = TenantSettings::default();
        assert_eq!(settings.workday_hours(), 8.0);
    }

    #[test]
    fn weekends_are_not_work_days_by_default() {
        let settings = TenantSettings::default();
        let saturday = NaiveDate::from_ymd_opt(2026, 2, 21).unwrap();
        let monday = NaiveDate::from_ymd_opt(2026, 2, 23).unwrap();

        assert!(!settings.is_work_day(saturday));
        assert!(settings.is_work_day(monday));
    }

    #[test]
    fn validate_rejects_inverted_work_hours() {
        let settings = TenantSettings {
            work_start: "18:00".to_string(),
            work_end: "09:00".to_string(),
            ..TenantSettings::default()
        };

        assert!(settings.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_timezone() {
        let settings = TenantSettings {
            timezone: "Mars/Olympus".to_string(),
            ..TenantSettings::default()
        };

        assert!(settings.validate().is_err());
        assert!(TenantSettings::default().validate().is_ok());
    }

    #[test]
    fn validate_bounds_lookback_days() {
        let mut settings = TenantSettings::default();

        settings.thresholds.lookback_days = 3_000_000_000;
        assert!(settings.validate().is_err());

        settings.thresholds.lookback_days = MAX_LOOKBACK_DAYS + 1;
        assert!(settings.validate().is_err());

        settings.thresholds.lookback_days = MAX_LOOKBACK_DAYS;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn partial_settings_json_falls_back_to_defaults() {
        let settings: TenantSettings =
            serde_json::from_str(r#"{"ai_policy":{"manager_digest_enabled":true}}"#)
                .expect("parse settings");

        assert!(settings.ai_policy.manager_digest_enabled);
        assert!(!settings.ai_policy.ai_mentor_enabled);
        assert_eq!(settings.thresholds, RiskThresholds::default());
        assert_eq!(settings.work_days, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn set_value_accepts_dotted_aliases() {
        let mut config = Config::default();
        config.set_value("digest.time", "07:45").expect("set time");
        config.set_value("ai.timeout_seconds", "1").expect("set timeout");

        assert_eq!(config.get_value("digest_time").as_deref(), Some("07:45"));
        assert_eq!(config.ai_timeout_seconds, 5);
        assert!(config.set_value("digest.time", "7pm").is_err());
        assert!(config.set_value("unknown.key", "x").is_err());
    }

    #[test]
    fn config_round_trips_through_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");

        let config = Config {
            api_port: 9000,
            ..Config::default()
        };
        config.save_to(&path).expect("save");

        let loaded = Config::load_from(&path).expect("load");
        assert_eq!(loaded.api_port, 9000);
        assert_eq!(loaded.default_org_id, DEFAULT_ORG_ID);
    }
}
