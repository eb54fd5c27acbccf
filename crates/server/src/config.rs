use std::{collections::HashMap, fs, time::Duration};

use provider::{SocrataConfig, DEFAULT_DATASET_URL};

pub const CONFIG_FILE: &str = "dashboard.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub dataset_url: String,
    pub app_token: Option<String>,
    pub request_timeout_secs: u64,
    pub row_limit: u32,
    pub initial_species: Option<String>,
    pub fixture_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8050".into(),
            dataset_url: DEFAULT_DATASET_URL.into(),
            app_token: None,
            request_timeout_secs: 30,
            row_limit: 50_000,
            initial_species: None,
            fixture_path: None,
        }
    }
}

impl Settings {
    pub fn socrata_config(&self) -> SocrataConfig {
        SocrataConfig {
            dataset_url: self.dataset_url.clone(),
            app_token: self.app_token.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
            row_limit: self.row_limit,
        }
    }
}

pub fn load_settings() -> Settings {
    let file = fs::read_to_string(CONFIG_FILE).ok();
    resolve_settings(file.as_deref(), |key| std::env::var(key).ok())
}

/// File values first, then environment overrides. Unparsable numbers keep
/// the previous value.
pub(crate) fn resolve_settings(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        if let Ok(table) = toml::from_str::<HashMap<String, toml::Value>>(raw) {
            let file_cfg: HashMap<String, String> = table
                .into_iter()
                .filter_map(|(key, value)| scalar_text(value).map(|text| (key, text)))
                .collect();
            if let Some(v) = file_cfg.get("bind_addr") {
                settings.server_bind = v.clone();
            }
            if let Some(v) = file_cfg.get("dataset_url") {
                settings.dataset_url = v.clone();
            }
            if let Some(v) = file_cfg.get("app_token") {
                settings.app_token = Some(v.clone());
            }
            if let Some(v) = file_cfg.get("request_timeout_secs") {
                apply_number(&mut settings.request_timeout_secs, v);
            }
            if let Some(v) = file_cfg.get("row_limit") {
                apply_number(&mut settings.row_limit, v);
            }
            if let Some(v) = file_cfg.get("initial_species") {
                settings.initial_species = Some(v.clone());
            }
            if let Some(v) = file_cfg.get("fixture_path") {
                settings.fixture_path = Some(v.clone());
            }
        }
    }

    if let Some(v) = env("DASHBOARD_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = env("DATASET_URL") {
        settings.dataset_url = v;
    }
    if let Some(v) = env("APP__DATASET_URL") {
        settings.dataset_url = v;
    }

    if let Some(v) = env("SOCRATA_APP_TOKEN") {
        settings.app_token = Some(v);
    }
    if let Some(v) = env("APP__APP_TOKEN") {
        settings.app_token = Some(v);
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        apply_number(&mut settings.request_timeout_secs, &v);
    }
    if let Some(v) = env("APP__ROW_LIMIT") {
        apply_number(&mut settings.row_limit, &v);
    }

    if let Some(v) = env("APP__INITIAL_SPECIES") {
        settings.initial_species = Some(v);
    }
    if let Some(v) = env("APP__FIXTURE_PATH") {
        settings.fixture_path = Some(v);
    }

    settings
}

fn scalar_text(value: toml::Value) -> Option<String> {
    match value {
        toml::Value::String(text) => Some(text),
        toml::Value::Integer(number) => Some(number.to_string()),
        _ => None,
    }
}

fn apply_number<T: std::str::FromStr>(target: &mut T, raw: &str) {
    if let Ok(parsed) = raw.trim().parse::<T>() {
        *target = parsed;
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
