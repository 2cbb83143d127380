use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::PitagError;
use crate::PitagResult;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["pitag.toml", ".pitag.toml"];

/// Configuration loaded from a `pitag.toml` file.
///
/// ```toml
/// target = "py"
/// no_color = false
///
/// # Snippets run before the first document, in order.
/// exec = ["import datetime", "VERSION = '1.2.0'"]
///
/// # Python files run after `exec`, relative to this file.
/// exec_files = ["helpers.py"]
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PitagConfig {
	/// Processing instruction target, `py` when unset.
	pub target: Option<String>,
	/// Pre-execution snippets.
	pub exec: Vec<String>,
	/// Pre-execution python files.
	pub exec_files: Vec<PathBuf>,
	/// Disable coloured diagnostics.
	pub no_color: bool,
	/// Directory containing the loaded config file. Relative `exec_files`
	/// are resolved against it.
	#[serde(skip)]
	pub root: PathBuf,
}

impl PitagConfig {
	/// Returns the first config file that exists in `root`.
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if there is no config file.
	pub fn load(root: &Path) -> PitagResult<Option<PitagConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		Self::load_file(&config_path).map(Some)
	}

	/// Load the config from an explicit path.
	pub fn load_file(path: &Path) -> PitagResult<PitagConfig> {
		let content = std::fs::read_to_string(path)?;
		let mut config: PitagConfig =
			toml::from_str(&content).map_err(|e| PitagError::ConfigParse(e.to_string()))?;
		config.root = path.parent().map(Path::to_path_buf).unwrap_or_default();

		tracing::debug!(path = %path.display(), "loaded config");

		Ok(config)
	}

	/// `exec_files` resolved against the config file's directory.
	pub fn resolved_exec_files(&self) -> Vec<PathBuf> {
		self.exec_files
			.iter()
			.map(|path| self.root.join(path))
			.collect()
	}
}
