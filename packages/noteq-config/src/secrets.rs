use std::{fs, path::PathBuf};

use crate::error::{Error, Result};

/// One secret value, resolved through a fixed source priority: a mounted
/// secret file, then a project-local file, then an environment variable,
/// then (only when explicitly permitted) a built-in development fallback.
/// No other code path may read an env var for a secret-bearing field; this
/// is the single helper for that.
#[derive(Clone, Debug, Default)]
pub struct SecretSource {
	pub name: String,
	pub mounted_path: Option<PathBuf>,
	pub local_path: Option<PathBuf>,
	pub env_var: Option<String>,
	pub dev_fallback: Option<String>,
	pub allow_dev_fallback: bool,
}

impl SecretSource {
	pub fn resolve(&self, required: bool) -> Result<Option<String>> {
		for path in [&self.mounted_path, &self.local_path].into_iter().flatten() {
			if let Some(value) = read_non_empty_file(path) {
				return Ok(Some(value));
			}
		}
		if let Some(env_var) = &self.env_var
			&& let Ok(value) = std::env::var(env_var)
			&& !value.trim().is_empty()
		{
			return Ok(Some(value));
		}
		if self.allow_dev_fallback
			&& let Some(fallback) = &self.dev_fallback
			&& !fallback.trim().is_empty()
		{
			return Ok(Some(fallback.clone()));
		}
		if required {
			return Err(Error::MissingSecret { name: self.name.clone() });
		}

		Ok(None)
	}
}

fn read_non_empty_file(path: &PathBuf) -> Option<String> {
	let contents = fs::read_to_string(path).ok()?;
	let trimmed = contents.trim();

	if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}
