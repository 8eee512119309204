//! Version manifest rendering for the Sync Orchestrator's phase 2
//! (spec.md §4.8, §6): a key-value file written to
//! `<remotePath>/.atlauncher.env` describing the loader and versions the
//! remote container should run.

use crate::types::Server;

/// Delimits the heredoc body so the manifest writer tolerates arbitrary
/// content without needing to escape it.
const HEREDOC_SENTINEL: &str = "ATLSYNC_MANIFEST_EOF";

/// Renders the manifest body: header comment, `MC_VERSION`, `MC_TYPE`, and
/// (when the loader has one) its version variable.
pub fn render(server: &Server) -> String {
	let mut body = String::from("# Auto-generated\n");
	body.push_str(&format!("MC_VERSION={}\n", server.mc_version));
	body.push_str(&format!("MC_TYPE={}\n", server.loader.container_type_tag()));
	if let (Some(var), Some(version)) = (server.loader.version_env_var(), &server.loader_version) {
		body.push_str(&format!("{var}={version}\n"));
	}
	body
}

/// The remote shell command that writes `render(server)` to
/// `<remote_path>/.atlauncher.env` via a single-quoted heredoc, so the
/// manifest body is never shell-interpreted.
pub fn write_command(remote_path: &str, server: &Server) -> String {
	let body = render(server);
	let remote_path = remote_path.trim_end_matches('/');
	format!("cat > {remote_path}/.atlauncher.env <<'{HEREDOC_SENTINEL}'\n{body}{HEREDOC_SENTINEL}\n")
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::Loader;
	use uuid::Uuid;

	fn server_with(loader: Loader, loader_version: Option<&str>) -> Server {
		Server {
			id: Uuid::new_v4(),
			name: "S".to_string(),
			root: std::path::PathBuf::from("/tmp/s"),
			mc_version: "1.21.1".to_string(),
			loader,
			loader_version: loader_version.map(str::to_string),
		}
	}

	#[test]
	fn forge_manifest_has_loader_version() {
		let server = server_with(Loader::Forge, Some("50.0.1"));
		let rendered = render(&server);
		assert_eq!(rendered, "# Auto-generated\nMC_VERSION=1.21.1\nMC_TYPE=FORGE\nFORGE_VERSION=50.0.1\n");
	}

	#[test]
	fn vanilla_manifest_has_no_loader_version_line() {
		let server = server_with(Loader::Vanilla, None);
		let rendered = render(&server);
		assert_eq!(rendered, "# Auto-generated\nMC_VERSION=1.21.1\nMC_TYPE=VANILLA\n");
	}

	#[test]
	fn write_command_wraps_body_in_sentinel_delimited_heredoc() {
		let server = server_with(Loader::Fabric, Some("0.15.0"));
		let command = write_command("/srv/mc/", &server);
		assert!(command.starts_with("cat > /srv/mc/.atlauncher.env <<'ATLSYNC_MANIFEST_EOF'\n"));
		assert!(command.contains("FABRIC_LOADER_VERSION=0.15.0"));
		assert!(command.trim_end().ends_with("ATLSYNC_MANIFEST_EOF"));
	}
}
