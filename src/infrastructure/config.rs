use crate::domain::models::AppSettings;
use crate::infrastructure::error::InfraError;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const SUPPORTED_SCHEMA: u64 = 1;

fn default_app_config() -> Result<serde_json::Value, InfraError> {
    Ok(serde_json::json!({
        "schema": SUPPORTED_SCHEMA,
        "appName": "BlockBoard",
        "settings": serde_json::to_value(AppSettings::default())?,
    }))
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_app_config()?)?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_app_config(config_dir: &Path) -> Result<serde_json::Value, InfraError> {
    read_config(&config_dir.join(APP_JSON))
}

/// Settings seeded from `app.json`. Missing or partial blocks fall back to the
/// built-in defaults; values that fail validation are rejected.
pub fn read_default_settings(config_dir: &Path) -> Result<AppSettings, InfraError> {
    let app = load_app_config(config_dir)?;
    let Some(raw) = app.get("settings") else {
        return Ok(AppSettings::default());
    };

    let mut merged = serde_json::to_value(AppSettings::default())?;
    if let (Some(target), Some(overrides)) = (merged.as_object_mut(), raw.as_object()) {
        for (key, value) in overrides {
            target.insert(key.clone(), value.clone());
        }
    }
    let settings: AppSettings = serde_json::from_value(merged)?;
    settings.validate().map_err(InfraError::InvalidConfig)?;
    Ok(settings)
}
