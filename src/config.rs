use crate::error::{RagError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";

/// Construction options shared by every session and tool.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub env_path: String,
    pub env_file: String,
    pub model_name: String,
    pub collection_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            env_path: "~".to_string(),
            env_file: ".env".to_string(),
            model_name: "gemini-1.5-flash".to_string(),
            collection_name: "geminidb".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn env_file_path(&self) -> Result<PathBuf> {
        Ok(expand_home(&self.env_path)?.join(&self.env_file))
    }

    /// Reads the API key once; a missing key is fatal for the caller.
    pub fn api_key(&self) -> Result<String> {
        load_api_key(&self.env_file_path()?, |key| std::env::var(key).ok())
    }
}

/// Expands a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    let rest = match path.strip_prefix('~') {
        Some(rest) => rest.trim_start_matches(['/', '\\']),
        None => return Ok(PathBuf::from(path)),
    };
    let home = dirs::home_dir()
        .ok_or_else(|| RagError::Config("could not determine home directory".to_string()))?;
    Ok(if rest.is_empty() { home } else { home.join(rest) })
}

/// Looks up the key in the env file first, then through `fallback`.
pub fn load_api_key<F>(env_file: &Path, fallback: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = read_env_file(env_file)? {
        return Ok(value);
    }

    match fallback(API_KEY_VAR) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(RagError::Config(format!(
            "{API_KEY_VAR} not found in {} or the process environment",
            env_file.display()
        ))),
    }
}

fn read_env_file(env_file: &Path) -> Result<Option<String>> {
    if !env_file.is_file() {
        debug!(path = %env_file.display(), "env file not present");
        return Ok(None);
    }

    let entries = dotenvy::from_path_iter(env_file)
        .map_err(|e| RagError::Config(format!("{}: {e}", env_file.display())))?;
    for entry in entries {
        let (key, value) =
            entry.map_err(|e| RagError::Config(format!("{}: {e}", env_file.display())))?;
        if key == API_KEY_VAR && !value.trim().is_empty() {
            return Ok(Some(value));
        }
    }
    Ok(None)
}
