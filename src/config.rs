use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use chrono::Duration;

use crate::scheduler::{ReminderEligibility, ScheduleMode};

const DEFAULT_FIRST_REVIEW_DELAY_MINUTES: i64 = 10;
const DEFAULT_REMINDER_OFFSET_MINUTES: i32 = 8 * 60;
const DEFAULT_REMINDER_SCHEDULE: &str = "0 0 * * * *";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub file_log_dir: Option<PathBuf>,
    pub store_backend: StoreBackend,
    pub sqlite_path: PathBuf,
    pub scheduler: SchedulerSettings,
    pub reminder_worker_enabled: bool,
    pub reminder_schedule: String,
}

/// Knobs the transition dispatch needs; everything else is fixed policy.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    pub first_review_delay: Duration,
    pub default_mode: ScheduleMode,
    pub reminder: ReminderEligibility,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            first_review_delay: Duration::minutes(DEFAULT_FIRST_REVIEW_DELAY_MINUTES),
            default_mode: ScheduleMode::Continuous,
            reminder: ReminderEligibility::new(DEFAULT_REMINDER_OFFSET_MINUTES),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3000);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let file_log_dir = crate::logging::file_log_dir_from_env();

        let store_backend = match std::env::var("REVIEW_STORE").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            _ => StoreBackend::Sqlite,
        };

        let sqlite_path = std::env::var("SQLITE_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_sqlite_path);

        let first_review_delay_minutes = std::env::var("FIRST_REVIEW_DELAY_MINUTES")
            .ok()
            .and_then(|value| value.parse::<i64>().ok())
            .filter(|value| *value >= 0)
            .unwrap_or(DEFAULT_FIRST_REVIEW_DELAY_MINUTES);

        let default_mode = std::env::var("DEFAULT_SCHEDULE_MODE")
            .ok()
            .and_then(|value| value.parse::<ScheduleMode>().ok())
            .unwrap_or_default();

        let reminder_offset = std::env::var("REMINDER_UTC_OFFSET_MINUTES")
            .ok()
            .and_then(|value| value.parse::<i32>().ok())
            .unwrap_or(DEFAULT_REMINDER_OFFSET_MINUTES);

        let reminder_worker_enabled = std::env::var("ENABLE_DUE_REMINDER_WORKER")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let reminder_schedule = std::env::var("DUE_REMINDER_SCHEDULE")
            .unwrap_or_else(|_| DEFAULT_REMINDER_SCHEDULE.to_string());

        Self {
            host,
            port,
            log_level,
            file_log_dir,
            store_backend,
            sqlite_path,
            scheduler: SchedulerSettings {
                first_review_delay: Duration::minutes(first_review_delay_minutes),
                default_mode,
                reminder: ReminderEligibility::new(reminder_offset),
            },
            reminder_worker_enabled,
            reminder_schedule,
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

pub fn default_sqlite_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("com.danci.app")
        .join("srs.db")
}
