//! Inclusion policy: a pure predicate deciding whether a relative path belongs
//! to a given backup mode. No I/O, no state — see the design rationale in
//! DESIGN.md (the table is data, not code, by deliberate choice).

use std::fmt;
use std::path::Path;

/// Selects which files an inclusion policy admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackupMode {
	/// Server configuration only: `server.properties`, whitelists, ops, `config/`.
	Normal,
	/// `Normal` plus mod/plugin directories (`mods/`, `plugins/`, `coremods/`, `jarmods/`).
	NormalPlusMods,
	/// Everything under the server root, including world data.
	Full,
}

impl fmt::Display for BackupMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			BackupMode::Normal => "NORMAL",
			BackupMode::NormalPlusMods => "NORMAL_PLUS_MODS",
			BackupMode::Full => "FULL",
		})
	}
}

/// Exact relative paths (or path components) admitted under `BackupMode::Normal`.
const NORMAL_EXACT: &[&str] = &[
	"server.properties",
	"ops.json",
	"whitelist.json",
	"banned-players.json",
	"banned-ips.json",
	"bukkit.yml",
	"spigot.yml",
	"paper.yml",
	"paper-global.yml",
	"paper-world-defaults.yml",
	"eula.txt",
	"server.json",
	"config",
];

/// Directory prefixes admitted under `BackupMode::Normal`.
const NORMAL_PREFIXES: &[&str] = &["config/"];

/// Exact names admitted additionally under `BackupMode::NormalPlusMods`.
const MODS_EXACT: &[&str] = &["mods", "plugins", "coremods", "jarmods"];

/// Directory prefixes admitted additionally under `BackupMode::NormalPlusMods`.
const MODS_PREFIXES: &[&str] = &["mods/", "plugins/", "coremods/", "jarmods/"];

/// Normalizes a path to a forward-slash relative string, as the rest of the
/// policy assumes. Windows-style separators are converted so that
/// `included("config\\foo.yml", mode) == included("config/foo.yml", mode)`.
pub fn normalize(path: &str) -> String {
	path.replace('\\', "/")
}

/// Returns whether `path` (a relative path within a server root) is admitted
/// by the inclusion policy for `mode`.
pub fn included(path: &str, mode: BackupMode) -> bool {
	let normalized = normalize(path);
	match mode {
		BackupMode::Normal => matches_normal(&normalized),
		BackupMode::NormalPlusMods => matches_normal(&normalized) || matches_mods(&normalized),
		BackupMode::Full => true,
	}
}

/// Same as [`included`], but takes a filesystem [`Path`] already known to be
/// relative to the server root.
pub fn included_path(path: &Path, mode: BackupMode) -> bool {
	match path.to_str() {
		Some(s) => included(s, mode),
		None => false,
	}
}

fn matches_normal(normalized: &str) -> bool {
	if NORMAL_EXACT.contains(&normalized) {
		return true;
	}
	NORMAL_PREFIXES.iter().any(|prefix| normalized.starts_with(prefix))
}

fn matches_mods(normalized: &str) -> bool {
	if MODS_EXACT.contains(&normalized) {
		return true;
	}
	MODS_PREFIXES.iter().any(|prefix| normalized.starts_with(prefix))
}

/// A short human-readable description of what a mode includes, suitable for
/// display in a profile list or confirmation prompt.
pub fn describe(mode: BackupMode) -> &'static str {
	match mode {
		BackupMode::Normal => "server configuration only (properties, whitelists, ops, config/)",
		BackupMode::NormalPlusMods => "configuration plus mods and plugins",
		BackupMode::Full => "the entire server directory, including world data",
	}
}

/// Whether `dir` (a relative directory path, no trailing slash) could possibly
/// contain files admitted by `mode` — used by the walker to decide whether a
/// subtree is worth recursing into at all under `Normal`/`NormalPlusMods`.
pub fn may_contain_included(dir: &str, mode: BackupMode) -> bool {
	if mode == BackupMode::Full {
		return true;
	}
	let normalized = normalize(dir);
	if normalized.is_empty() {
		return true;
	}
	let as_prefix = format!("{}/", normalized);
	let candidates: &[&str] = match mode {
		BackupMode::Normal => NORMAL_PREFIXES,
		BackupMode::NormalPlusMods => &[
			NORMAL_PREFIXES[0],
			MODS_PREFIXES[0],
			MODS_PREFIXES[1],
			MODS_PREFIXES[2],
			MODS_PREFIXES[3],
		],
		BackupMode::Full => unreachable!(),
	};
	candidates.iter().any(|prefix| prefix.starts_with(&as_prefix) || as_prefix.starts_with(prefix))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normal_matches_known_files() {
		assert!(included("server.properties", BackupMode::Normal));
		assert!(included("eula.txt", BackupMode::Normal));
		assert!(included("config/foo.yml", BackupMode::Normal));
		assert!(!included("mods/a.jar", BackupMode::Normal));
		assert!(!included("world/region/r.0.0.mca", BackupMode::Normal));
	}

	#[test]
	fn normal_plus_mods_adds_mod_dirs() {
		assert!(included("mods/a.jar", BackupMode::NormalPlusMods));
		assert!(included("plugins/p.jar", BackupMode::NormalPlusMods));
		assert!(included("server.properties", BackupMode::NormalPlusMods));
		assert!(!included("world/level.dat", BackupMode::NormalPlusMods));
	}

	#[test]
	fn full_matches_everything() {
		assert!(included("world/region/r.0.0.mca", BackupMode::Full));
		assert!(included("anything/at/all.txt", BackupMode::Full));
	}

	#[test]
	fn path_normalization_is_platform_independent() {
		assert_eq!(
			included("config\\foo.yml", BackupMode::Normal),
			included("config/foo.yml", BackupMode::Normal)
		);
	}

	/// Invariant: NORMAL ⊂ NORMAL_PLUS_MODS ⊂ FULL for every path we can think
	/// to throw at it.
	#[test]
	fn inclusion_is_monotonic() {
		let candidates = [
			"server.properties",
			"ops.json",
			"config/foo.yml",
			"mods/a.jar",
			"plugins/p.jar",
			"coremods/c.jar",
			"jarmods/j.jar",
			"world/level.dat",
			"world/region/r.0.0.mca",
			"logs/latest.log",
			"random-top-level-file.txt",
		];
		for path in candidates {
			if included(path, BackupMode::Normal) {
				assert!(
					included(path, BackupMode::NormalPlusMods),
					"{path} included in NORMAL but not NORMAL_PLUS_MODS"
				);
			}
			if included(path, BackupMode::NormalPlusMods) {
				assert!(
					included(path, BackupMode::Full),
					"{path} included in NORMAL_PLUS_MODS but not FULL"
				);
			}
		}
	}

	#[test]
	fn exact_dir_name_without_trailing_slash_matches() {
		assert!(included("config", BackupMode::Normal));
		assert!(included("mods", BackupMode::NormalPlusMods));
	}
}
