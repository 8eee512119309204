use atlsync::policy::{included, may_contain_included, BackupMode};

const NORMAL_ONLY: &[&str] =
	&["server.properties", "ops.json", "whitelist.json", "eula.txt", "config/paper-global.yml"];

const MODS_ONLY: &[&str] = &["mods/fancymenu.jar", "plugins/worldedit.jar", "coremods/loader.jar"];

const FULL_ONLY: &[&str] = &["world/level.dat", "world/region/r.0.0.mca", "logs/latest.log"];

#[test]
fn normal_mode_admits_only_configuration_files() {
	for path in NORMAL_ONLY {
		assert!(included(path, BackupMode::Normal), "{path} should be included under Normal");
	}
	for path in MODS_ONLY.iter().chain(FULL_ONLY) {
		assert!(!included(path, BackupMode::Normal), "{path} should not be included under Normal");
	}
}

#[test]
fn normal_plus_mods_is_a_strict_superset_of_normal() {
	for path in NORMAL_ONLY.iter().chain(MODS_ONLY) {
		assert!(included(path, BackupMode::NormalPlusMods), "{path} should be included under NormalPlusMods");
	}
	for path in FULL_ONLY {
		assert!(!included(path, BackupMode::NormalPlusMods), "{path} should not be included under NormalPlusMods");
	}
}

#[test]
fn full_mode_admits_everything() {
	for path in NORMAL_ONLY.iter().chain(MODS_ONLY).chain(FULL_ONLY) {
		assert!(included(path, BackupMode::Full), "{path} should be included under Full");
	}
}

#[test]
fn monotonicity_holds_across_a_broad_sample_of_paths() {
	let sample: Vec<&str> = NORMAL_ONLY.iter().chain(MODS_ONLY).chain(FULL_ONLY).copied().collect();
	for path in sample {
		let normal = included(path, BackupMode::Normal);
		let normal_plus_mods = included(path, BackupMode::NormalPlusMods);
		let full = included(path, BackupMode::Full);
		if normal {
			assert!(normal_plus_mods, "{path}: NORMAL implies NORMAL_PLUS_MODS");
		}
		if normal_plus_mods {
			assert!(full, "{path}: NORMAL_PLUS_MODS implies FULL");
		}
	}
}

#[test]
fn walker_pruning_agrees_with_inclusion_for_directory_prefixes() {
	assert!(may_contain_included("config", BackupMode::Normal));
	assert!(!may_contain_included("mods", BackupMode::Normal));
	assert!(may_contain_included("mods", BackupMode::NormalPlusMods));
	assert!(!may_contain_included("world", BackupMode::NormalPlusMods));
	assert!(may_contain_included("world", BackupMode::Full));
}
