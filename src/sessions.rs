use std::env;
use std::fs;
use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};

pub const STATE_DIR_ENV: &str = "SALES_DASHBOARD_STATE_DIR";
pub const DEFAULT_SESSION: &str = "default";
const APP_DIR: &str = "sales_dashboard";
const SESSIONS_DIR: &str = "sessions";
const LOG_FILE: &str = "dashboard.log";

pub fn resolve_state_dir(cli_path: Option<PathBuf>) -> PathBuf {
	if let Some(path) = cli_path {
		return absolutize(path);
	}

	if let Some(path) = env::var_os(STATE_DIR_ENV) {
		let path = PathBuf::from(path);
		if !path.as_os_str().is_empty() {
			return absolutize(path);
		}
	}

	default_state_dir()
}

/// Storage directory of one named session. Names become directory names, so
/// they are restricted to letters, digits, '-' and '_'.
pub fn session_dir(state_dir: &Path, name: &str) -> Result<PathBuf, Error> {
	let valid = !name.is_empty()
		&& name
			.chars()
			.all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
	if !valid {
		return Err(Error::new(
			ErrorKind::InvalidInput,
			format!("invalid session name '{name}': use letters, digits, '-' or '_'"),
		));
	}

	Ok(state_dir.join(SESSIONS_DIR).join(name))
}

pub fn list_sessions(state_dir: &Path) -> Result<Vec<String>, Error> {
	let root = state_dir.join(SESSIONS_DIR);
	let entries = match fs::read_dir(&root) {
		Ok(entries) => entries,
		Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
		Err(err) => return Err(err),
	};

	let mut names = Vec::new();
	for entry in entries {
		let entry = entry?;
		if !entry.file_type()?.is_dir() {
			continue;
		}
		if let Some(name) = entry.file_name().to_str() {
			names.push(name.to_string());
		}
	}
	names.sort();

	Ok(names)
}

pub fn log_file(state_dir: &Path) -> PathBuf {
	state_dir.join(LOG_FILE)
}

fn default_state_dir() -> PathBuf {
	#[cfg(target_os = "windows")]
	{
		if let Some(path) = env::var_os("LOCALAPPDATA") {
			return PathBuf::from(path).join(APP_DIR);
		}
	}

	if let Some(path) = env::var_os("XDG_STATE_HOME") {
		return PathBuf::from(path).join(APP_DIR);
	}

	if let Some(path) = env::var_os("HOME") {
		return PathBuf::from(path).join(".local").join("state").join(APP_DIR);
	}

	PathBuf::from(format!(".{APP_DIR}"))
}

fn absolutize(path: PathBuf) -> PathBuf {
	let path = if path.is_absolute() {
		path
	} else if let Ok(cwd) = env::current_dir() {
		cwd.join(path)
	} else {
		path
	};

	if path.exists() {
		fs::canonicalize(&path).unwrap_or(path)
	} else {
		path
	}
}

#[cfg(test)]
mod tests {
	use std::fs;
	use std::path::PathBuf;

	use super::{list_sessions, resolve_state_dir, session_dir};

	#[test]
	fn cli_state_dir_wins_and_is_absolute() {
		let dir = resolve_state_dir(Some(PathBuf::from("relative_state")));
		assert!(dir.is_absolute());
		assert!(dir.ends_with("relative_state"));
	}

	#[test]
	fn session_names_are_validated() {
		let root = PathBuf::from("/tmp/state");
		assert_eq!(
			session_dir(&root, "tab-2").expect("plain names are accepted"),
			root.join("sessions").join("tab-2")
		);
		assert!(session_dir(&root, "../other").is_err());
		assert!(session_dir(&root, "").is_err());
	}

	#[test]
	fn lists_session_directories_sorted() {
		let mut root = std::env::temp_dir();
		root.push(format!("sales_dashboard_sessions_{}", std::process::id()));
		assert!(list_sessions(&root).expect("missing root is empty").is_empty());

		for name in ["weekly", "default"] {
			let dir = session_dir(&root, name).expect("valid session name");
			fs::create_dir_all(dir).expect("session dir should be created");
		}
		fs::write(root.join("sessions").join("stray.txt"), "x").expect("stray file should be written");

		assert_eq!(
			list_sessions(&root).expect("sessions should list"),
			vec!["default".to_string(), "weekly".to_string()]
		);
		let _ = fs::remove_dir_all(root);
	}
}
