use crate::types::{BracketOptions, SeedingMode};
use serde::{Deserialize, Serialize};
use std::{
    env,
    fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:17900";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
  pub allow_grand_final_reset: bool,
  pub race_to: Option<u32>,
  pub seeding: SeedingMode,
  pub listen_addr: String,
}

impl Default for EngineConfig {
  fn default() -> Self {
    EngineConfig {
      allow_grand_final_reset: true,
      race_to: None,
      seeding: SeedingMode::Standard,
      listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
    }
  }
}

impl EngineConfig {
  pub fn bracket_options(&self) -> BracketOptions {
    BracketOptions {
      allow_grand_final_reset: self.allow_grand_final_reset,
      race_to: self.race_to,
      seeding: self.seeding,
    }
  }
}

pub fn repo_root() -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn resolve_repo_path(raw: &str) -> PathBuf {
  let path = PathBuf::from(raw);
  if path.is_absolute() {
    path
  } else {
    repo_root().join(path)
  }
}

pub fn config_path() -> PathBuf {
  match env_default("BRACKET_CONFIG_PATH") {
    Some(raw) => resolve_repo_path(&raw),
    None => repo_root().join("bracket_config.json"),
  }
}

pub fn logs_dir() -> PathBuf {
  repo_root().join("logs")
}

pub fn env_default(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

pub fn env_flag_true_default(key: &str, default: bool) -> bool {
  match env::var(key) {
    Ok(value) => {
      let value = value.trim().to_ascii_lowercase();
      match value.as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
      }
    }
    Err(_) => default,
  }
}

pub fn apply_env_overrides(mut config: EngineConfig) -> Result<EngineConfig, String> {
  config.allow_grand_final_reset =
    env_flag_true_default("BRACKET_GRAND_FINAL_RESET", config.allow_grand_final_reset);
  if let Some(value) = env_default("BRACKET_RACE_TO") {
    let race_to = value
      .parse::<u32>()
      .map_err(|e| format!("BRACKET_RACE_TO={value}: {e}"))?;
    config.race_to = if race_to == 0 { None } else { Some(race_to) };
  }
  if let Some(value) = env_default("BRACKET_SEEDING") {
    config.seeding = value.parse::<SeedingMode>()?;
  }
  if let Some(value) = env_default("BRACKET_LISTEN_ADDR") {
    config.listen_addr = value;
  }
  Ok(config)
}

pub fn load_config_from(path: &Path) -> Result<EngineConfig, String> {
  if !path.is_file() {
    return Ok(EngineConfig::default());
  }
  let data = fs::read_to_string(path).map_err(|e| format!("read config {}: {e}", path.display()))?;
  serde_json::from_str::<EngineConfig>(&data).map_err(|e| format!("parse config {}: {e}", path.display()))
}

pub fn load_engine_config() -> Result<EngineConfig, String> {
  let config = load_config_from(&config_path())?;
  apply_env_overrides(config)
}

pub fn load_env_file() {
  let env_path = repo_root().join(".env");
  if !env_path.is_file() {
    return;
  }
  let contents = match fs::read_to_string(&env_path) {
    Ok(data) => data,
    Err(_) => return,
  };
  for line in contents.lines() {
    if let Some((key, value)) = parse_env_line(line) {
      if env::var_os(&key).is_none() {
        env::set_var(key, value);
      }
    }
  }
}

pub fn parse_env_line(line: &str) -> Option<(String, String)> {
  let trimmed = line.trim();
  if trimmed.is_empty() || trimmed.starts_with('#') {
    return None;
  }
  let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
  let (key, raw_value) = trimmed.split_once('=')?;
  let key = key.trim();
  if key.is_empty() {
    return None;
  }
  let mut value = raw_value.trim();
  if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
    value = &value[1..value.len() - 1];
  } else if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
    value = &value[1..value.len() - 1];
  } else if let Some(idx) = value.find('#') {
    value = value[..idx].trim_end();
  }
  Some((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_env_line() {
    assert_eq!(parse_env_line("# comment"), None);
    assert_eq!(parse_env_line("   "), None);
    assert_eq!(
      parse_env_line("export BRACKET_SEEDING=sequential"),
      Some(("BRACKET_SEEDING".to_string(), "sequential".to_string()))
    );
    assert_eq!(
      parse_env_line("BRACKET_LISTEN_ADDR=\"0.0.0.0:8080\""),
      Some(("BRACKET_LISTEN_ADDR".to_string(), "0.0.0.0:8080".to_string()))
    );
    assert_eq!(
      parse_env_line("BRACKET_RACE_TO=3 # best of five"),
      Some(("BRACKET_RACE_TO".to_string(), "3".to_string()))
    );
    assert_eq!(parse_env_line("=oops"), None);
  }

  #[test]
  fn test_config_defaults_and_partial_json() {
    let config = serde_json::from_str::<EngineConfig>("{\"raceTo\": 2}").unwrap();
    assert_eq!(config.race_to, Some(2));
    assert!(config.allow_grand_final_reset);
    assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR);

    let options = config.bracket_options();
    assert_eq!(options.race_to, Some(2));
    assert_eq!(options.seeding, SeedingMode::Standard);
  }

  #[test]
  fn test_missing_config_file_uses_defaults() {
    let path = repo_root().join("does-not-exist").join("bracket_config.json");
    assert_eq!(load_config_from(&path).unwrap(), EngineConfig::default());
  }

  #[test]
  fn test_bad_config_file_reports_path() {
    let path = env::temp_dir().join(format!("bracket_config_{}.json", std::process::id()));
    fs::write(&path, "{ not json").unwrap();
    let err = load_config_from(&path).unwrap_err();
    assert!(err.starts_with("parse config"), "{err}");
    let _ = fs::remove_file(&path);
  }
}
