use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::info;

use crate::bracket::BracketInstance;
use crate::types::{BracketOptions, Format, ParticipantId};

/// A results log that can be replayed against a freshly generated bracket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketScript {
  pub format: String,
  pub participants: Vec<String>,
  #[serde(default)]
  pub options: Option<BracketOptions>,
  #[serde(default)]
  pub results: Vec<ScriptResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptResult {
  #[serde(rename = "match")]
  pub match_id: String,
  pub score1: u32,
  pub score2: u32,
}

pub fn load_script(path: &Path) -> Result<BracketScript, String> {
  let data = fs::read_to_string(path).map_err(|e| format!("read script {}: {e}", path.display()))?;
  serde_json::from_str::<BracketScript>(&data).map_err(|e| format!("parse script {}: {e}", path.display()))
}

/// Generates the scripted bracket and applies every result in order. `defaults` is used
/// when the script carries no options of its own.
pub fn run_script(script: &BracketScript, defaults: &BracketOptions) -> Result<BracketInstance, String> {
  let format = script.format.parse::<Format>().map_err(|e| e.to_string())?;
  let participants = script
    .participants
    .iter()
    .map(|name| ParticipantId::new(name.trim()))
    .collect::<Vec<_>>();
  let options = script.options.clone().unwrap_or_else(|| defaults.clone());

  let mut bracket =
    BracketInstance::generate(format, participants, options).map_err(|e| format!("generate bracket: {e}"))?;
  for (idx, result) in script.results.iter().enumerate() {
    bracket
      .submit_result(&result.match_id, result.score1, result.score2)
      .map_err(|e| format!("result #{} ({}): {e}", idx + 1, result.match_id))?;
  }
  info!(
    "replayed {} results, champion {}",
    script.results.len(),
    bracket.champion().map(|p| p.as_str()).unwrap_or("undecided")
  );
  Ok(bracket)
}
