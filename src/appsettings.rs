use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File, builder::DefaultState};
use serde::Deserialize;

use crate::delivery::NotificationPermission;

#[derive(Deserialize, Debug, Clone)]
pub struct StorageSettings {
    pub directory: PathBuf,
}

#[derive(Deserialize, Debug, Clone)]
pub struct HydrationSettings {
    pub poll_interval_secs: u64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CountdownSettings {
    pub tick_interval_secs: u64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NotificationSettings {
    pub permission: NotificationPermission,
    pub app_name: String,
    pub sound_player: String,
    pub sound_file: Option<PathBuf>,
    pub haptics: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    pub timezone: String,
    pub storage: StorageSettings,
    pub hydration: HydrationSettings,
    pub countdown: CountdownSettings,
    pub notifications: NotificationSettings,
}

impl AppSettings {
    /// Defaults, then `appsettings.*`, then `appsettings.local.*`, then
    /// `APP_`-prefixed environment variables (`APP_STORAGE__DIRECTORY`).
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(File::with_name("appsettings").required(false))
            .add_source(File::with_name("appsettings.local").required(false))
            .add_source(environment())
            .build()?
            .try_deserialize()
    }

    pub fn timezone(&self) -> anyhow::Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|error| anyhow::anyhow!("Invalid timezone {:?}: {}", self.timezone, error))
    }

    pub fn hydration_poll_interval(&self) -> Duration {
        Duration::from_secs(self.hydration.poll_interval_secs.max(1))
    }

    pub fn countdown_tick_interval(&self) -> Duration {
        Duration::from_secs(self.countdown.tick_interval_secs.max(1))
    }

    fn builder() -> Result<config::ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("timezone", "UTC")?
            .set_default("storage.directory", ".wellnudge")?
            .set_default("hydration.poll_interval_secs", 30)?
            .set_default("countdown.tick_interval_secs", 1)?
            .set_default("notifications.permission", "default")?
            .set_default("notifications.app_name", "wellnudge")?
            .set_default("notifications.sound_player", "paplay")?
            .set_default("notifications.haptics", true)
    }
}

fn environment() -> Environment {
    Environment::with_prefix("APP")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use config::FileFormat;

    use super::*;

    #[test]
    fn defaults_apply_without_any_source() {
        let settings: AppSettings = AppSettings::builder()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.timezone().unwrap(), Tz::UTC);
        assert_eq!(settings.storage.directory, PathBuf::from(".wellnudge"));
        assert_eq!(settings.hydration_poll_interval(), Duration::from_secs(30));
        assert_eq!(settings.countdown_tick_interval(), Duration::from_secs(1));
        assert_eq!(
            settings.notifications.permission,
            NotificationPermission::Default
        );
        assert_eq!(settings.notifications.sound_file, None);
        assert!(settings.notifications.haptics);
    }

    #[test]
    fn file_and_environment_override_defaults() {
        let file = r#"
            timezone = "Europe/Prague"

            [notifications]
            permission = "granted"
            sound_file = "/usr/share/sounds/freedesktop/stereo/complete.oga"
        "#;
        let env = HashMap::from([
            ("APP_HYDRATION__POLL_INTERVAL_SECS".to_owned(), "5".to_owned()),
            ("APP_NOTIFICATIONS__HAPTICS".to_owned(), "false".to_owned()),
        ]);

        let settings: AppSettings = AppSettings::builder()
            .unwrap()
            .add_source(File::from_str(file, FileFormat::Toml))
            .add_source(environment().source(Some(env)))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.timezone().unwrap(), chrono_tz::Europe::Prague);
        assert_eq!(settings.hydration_poll_interval(), Duration::from_secs(5));
        assert_eq!(
            settings.notifications.permission,
            NotificationPermission::Granted
        );
        assert!(settings.notifications.sound_file.is_some());
        assert!(!settings.notifications.haptics);
    }

    #[test]
    fn unknown_timezone_is_an_error() {
        let settings: AppSettings = AppSettings::builder()
            .unwrap()
            .set_override("timezone", "Mars/Olympus")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!(settings.timezone().is_err());
    }
}
