use clap::{Arg, ArgAction, Command};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

use atlsync::change_detector;
use atlsync::config::Config;
use atlsync::error::AtlSyncError;
use atlsync::logging;
use atlsync::orchestrator::SyncOrchestrator;
use atlsync::policy::BackupMode;
use atlsync::profile::ProfileStore;
use atlsync::types::{Loader, RemoteSyncConfig, Server};
use atlsync::utils::ProfileLock;

fn main() -> ExitCode {
	logging::init_tracing();

	match run() {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			eprintln!("atlsync: {e}");
			ExitCode::FAILURE
		}
	}
}

fn run() -> Result<(), Box<dyn Error>> {
	let matches = Command::new("atlsync")
		.version(env!("CARGO_PKG_VERSION"))
		.author("Szilard Hajba <szilu@symbion.hu>")
		.about("Minecraft server profile snapshots and remote sync")
		.subcommand_required(true)
		.subcommand(
			Command::new("profile")
				.about("Manage content-addressed snapshots of a server directory")
				.subcommand_required(true)
				.subcommand(
					Command::new("save")
						.about("Save a new snapshot")
						.arg(Arg::new("server-root").required(true))
						.arg(Arg::new("name").long("name").required(true))
						.arg(Arg::new("description").long("description"))
						.arg(
							Arg::new("mode")
								.long("mode")
								.default_value("normal")
								.value_parser(["normal", "normal-plus-mods", "full"]),
						),
				)
				.subcommand(Command::new("list").about("List snapshots").arg(Arg::new("server-root").required(true)))
				.subcommand(
					Command::new("restore")
						.about("Overlay a snapshot back onto the server directory")
						.arg(Arg::new("server-root").required(true))
						.arg(Arg::new("profile-id").required(true)),
				)
				.subcommand(
					Command::new("delete")
						.about("Delete a snapshot")
						.arg(Arg::new("server-root").required(true))
						.arg(Arg::new("profile-id").required(true)),
				)
				.subcommand(
					Command::new("diff")
						.about("Compare the server directory to its active snapshot")
						.arg(Arg::new("server-root").required(true)),
				)
				.subcommand(
					Command::new("has-changes")
						.about("Fast probe: report only whether the server directory has unsaved changes")
						.arg(Arg::new("server-root").required(true)),
				),
		)
		.subcommand(
			Command::new("sync")
				.about("Push a server directory to a remote host")
				.subcommand_required(true)
				.subcommand(
					Command::new("run")
						.about("Run a sync against a remote-sync-config.json")
						.arg(Arg::new("server-root").required(true))
						.arg(Arg::new("config").long("config").required(true))
						.arg(Arg::new("mc-version").long("mc-version").default_value("1.21.1"))
						.arg(
							Arg::new("loader")
								.long("loader")
								.default_value("vanilla")
								.value_parser(["vanilla", "forge", "neoforge", "fabric", "quilt", "paper", "purpur"]),
						)
						.arg(Arg::new("loader-version").long("loader-version"))
						.arg(Arg::new("name").long("name"))
						.arg(Arg::new("verbose-progress").long("verbose-progress").action(ArgAction::SetTrue)),
				),
		)
		.get_matches();

	let config = Config::load_default().unwrap_or_default();

	match matches.subcommand() {
		Some(("profile", sub)) => run_profile(sub, &config),
		Some(("sync", sub)) => run_sync(sub, &config),
		_ => unreachable!("clap enforces subcommand_required"),
	}
}

fn run_profile(matches: &clap::ArgMatches, config: &Config) -> Result<(), Box<dyn Error>> {
	match matches.subcommand() {
		Some(("save", sub)) => {
			let server = server_from_root(sub)?;
			let mode = parse_mode(sub.get_one::<String>("mode").expect("has default"));
			let name = sub.get_one::<String>("name").expect("required").clone();
			let description = sub.get_one::<String>("description").cloned();

			let store = ProfileStore::new(&config.atlsync_dir);
			let _lock = ProfileLock::acquire(&store.server_profile_dir(&server))?;
			let profile = store.save(&server, &name, description, mode)?;
			println!(
				"saved profile '{}' ({}), {} files, {} bytes",
				profile.name, profile.id, profile.contents.total_file_count, profile.archive_size_bytes
			);
			Ok(())
		}
		Some(("list", sub)) => {
			let server = server_from_root(sub)?;
			let store = ProfileStore::new(&config.atlsync_dir);
			let active = store.active(&server)?.map(|p| p.id);
			for profile in store.list(&server)? {
				let marker = if Some(profile.id) == active { "*" } else { " " };
				println!(
					"{marker} {} {} [{}] created {}",
					profile.id, profile.name, profile.backup_mode, profile.created_at
				);
			}
			Ok(())
		}
		Some(("restore", sub)) => {
			let server = server_from_root(sub)?;
			let profile_id = parse_profile_id(sub)?;
			let store = ProfileStore::new(&config.atlsync_dir);
			let _lock = ProfileLock::acquire(&store.server_profile_dir(&server))?;
			store.restore(&server, profile_id)?;
			println!("restored profile {profile_id}");
			Ok(())
		}
		Some(("delete", sub)) => {
			let server = server_from_root(sub)?;
			let profile_id = parse_profile_id(sub)?;
			let store = ProfileStore::new(&config.atlsync_dir);
			let _lock = ProfileLock::acquire(&store.server_profile_dir(&server))?;
			store.delete(&server, profile_id)?;
			println!("deleted profile {profile_id}");
			Ok(())
		}
		Some(("diff", sub)) => {
			let server = server_from_root(sub)?;
			let store = ProfileStore::new(&config.atlsync_dir);
			let result = change_detector::detect_changes(&store, &server)?;
			if result.compared_to_profile_id.is_none() {
				println!("no active profile to compare against (untracked)");
			} else {
				println!(
					"compared to '{}': {} added, {} modified, {} deleted",
					result.compared_to_profile_name.as_deref().unwrap_or("?"),
					result.added_files.len(),
					result.modified_files.len(),
					result.deleted_files.len()
				);
				for path in &result.added_files {
					println!("  + {path}");
				}
				for path in &result.modified_files {
					println!("  ~ {path}");
				}
				for path in &result.deleted_files {
					println!("  - {path}");
				}
			}
			Ok(())
		}
		Some(("has-changes", sub)) => {
			let server = server_from_root(sub)?;
			let store = ProfileStore::new(&config.atlsync_dir);
			let has_changes = change_detector::has_unsaved_changes(&store, &server)?;
			println!("{has_changes}");
			Ok(())
		}
		_ => unreachable!("clap enforces subcommand_required"),
	}
}

fn run_sync(matches: &clap::ArgMatches, config: &Config) -> Result<(), Box<dyn Error>> {
	match matches.subcommand() {
		Some(("run", sub)) => {
			let server = server_from_sync_args(sub)?;
			let store = ProfileStore::new(&config.atlsync_dir);
			let _lock = ProfileLock::acquire(&store.server_profile_dir(&server))?;

			let config_path = PathBuf::from(sub.get_one::<String>("config").expect("required"));
			let contents = std::fs::read_to_string(&config_path)
				.map_err(|e| AtlSyncError::Config(format!("{}: {e}", config_path.display())))?;
			let remote_config: RemoteSyncConfig = serde_json::from_str(&contents)
				.map_err(|e| AtlSyncError::Config(format!("{}: {e}", config_path.display())))?;
			remote_config.validate().map_err(AtlSyncError::Config)?;

			let orchestrator = SyncOrchestrator::new(server, remote_config);
			let verbose = sub.get_flag("verbose-progress");
			let on_progress = if verbose {
				Some(std::sync::Arc::new(|progress: atlsync::types::SyncProgress| {
					println!(
						"[{}/{}] {}",
						progress.completed_tasks, progress.total_tasks, progress.current_task
					);
				}) as std::sync::Arc<dyn Fn(atlsync::types::SyncProgress) + Send + Sync>)
			} else {
				None
			};

			let result = orchestrator.sync(on_progress);
			println!("{}", result.message);
			if result.success {
				Ok(())
			} else {
				Err(Box::new(AtlSyncError::Other(result.message)))
			}
		}
		_ => unreachable!("clap enforces subcommand_required"),
	}
}

fn server_from_root(matches: &clap::ArgMatches) -> Result<Server, Box<dyn Error>> {
	let root = PathBuf::from(matches.get_one::<String>("server-root").expect("required"));
	let name = root
		.file_name()
		.map(|n| n.to_string_lossy().to_string())
		.unwrap_or_else(|| "server".to_string());
	Ok(Server { id: Uuid::new_v4(), name, root, mc_version: String::new(), loader: Loader::Vanilla, loader_version: None })
}

fn server_from_sync_args(matches: &clap::ArgMatches) -> Result<Server, Box<dyn Error>> {
	let root = PathBuf::from(matches.get_one::<String>("server-root").expect("required"));
	let name = matches.get_one::<String>("name").cloned().unwrap_or_else(|| {
		root.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| "server".to_string())
	});
	let mc_version = matches.get_one::<String>("mc-version").expect("has default").clone();
	let loader = parse_loader(matches.get_one::<String>("loader").expect("has default"));
	let loader_version = matches.get_one::<String>("loader-version").cloned();
	Ok(Server { id: Uuid::new_v4(), name, root, mc_version, loader, loader_version })
}

fn parse_mode(raw: &str) -> BackupMode {
	match raw {
		"normal-plus-mods" => BackupMode::NormalPlusMods,
		"full" => BackupMode::Full,
		_ => BackupMode::Normal,
	}
}

fn parse_loader(raw: &str) -> Loader {
	match raw {
		"forge" => Loader::Forge,
		"neoforge" => Loader::NeoForge,
		"fabric" => Loader::Fabric,
		"quilt" => Loader::Quilt,
		"paper" => Loader::Paper,
		"purpur" => Loader::Purpur,
		_ => Loader::Vanilla,
	}
}

fn parse_profile_id(matches: &clap::ArgMatches) -> Result<Uuid, Box<dyn Error>> {
	let raw = matches.get_one::<String>("profile-id").expect("required");
	Ok(Uuid::parse_str(raw)?)
}
