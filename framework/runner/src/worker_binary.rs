use std::env;
use std::path::{Path, PathBuf};

use anyhow::bail;
use anyhow::Context;

use crate::types::HarnessResult;

/// Environment variable to override the program started for each worker process.
pub const WORKER_PATH_ENV: &str = "EXEC_HARNESS_WORKER_PATH";

/// Get the path of the program to run as a worker.
///
/// A path configured on the [crate::context::RunConfig] wins and is used as given, so a bad path
/// shows up as a spawn failure of each worker. Otherwise [`WORKER_PATH_ENV`] is used when set: a
/// bare program name is looked up on the user's `PATH`, anything else must exist. Without either,
/// the worker is the current executable.
pub fn worker_path(configured: Option<&Path>) -> HarnessResult<PathBuf> {
    if let Some(path) = configured {
        return Ok(path.to_path_buf());
    }

    match env::var(WORKER_PATH_ENV).ok().as_deref() {
        Some("") => {
            bail!("'{WORKER_PATH_ENV}' set to empty string");
        }
        None => env::current_exe().context("Failed to locate the current executable"),
        Some(name) if !name.contains(std::path::MAIN_SEPARATOR) && !name.contains('/') => {
            log::warn!("'{WORKER_PATH_ENV}' is not a path so looking in user's 'PATH'");
            which::which(name).with_context(|| {
                format!(
                    "Worker binary '{name}' not found in PATH. Please install it or set '{WORKER_PATH_ENV}' to the correct path."
                )
            })
        }
        Some(path) => {
            let worker_path = PathBuf::from(path);
            if !worker_path.exists() {
                bail!(
                    "Path to worker binary overwritten with '{WORKER_PATH_ENV}={path}' but that path doesn't exist",
                    path = worker_path.display()
                );
            }
            Ok(worker_path)
        }
    }
}

#[cfg(test)]
mod tests {
    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt as _;

    use serial_test::serial;
    use tempfile::{NamedTempFile, TempDir};

    use super::*;

    #[test]
    #[serial]
    fn test_configured_path_wins() {
        env::set_var(WORKER_PATH_ENV, "/non/existent/path/to/worker");
        let result = worker_path(Some(Path::new("/configured/worker"))).unwrap();
        assert_eq!(PathBuf::from("/configured/worker"), result);
        env::remove_var(WORKER_PATH_ENV);
    }

    #[test]
    #[serial]
    fn test_should_not_get_worker_path_if_not_exist() {
        env::set_var(WORKER_PATH_ENV, "/non/existent/path/to/worker");
        let result = worker_path(None);
        env::remove_var(WORKER_PATH_ENV);
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_should_get_worker_path_from_env() {
        let temp = NamedTempFile::new().expect("failed to create temp file");
        let test_path = temp.path().to_str().expect("failed to get temp file path");
        env::set_var(WORKER_PATH_ENV, test_path);
        let result = worker_path(None).expect("failed to get worker path");
        env::remove_var(WORKER_PATH_ENV);
        assert_eq!(result, PathBuf::from(test_path));
    }

    #[test]
    #[serial]
    fn test_empty_env_is_an_error() {
        env::set_var(WORKER_PATH_ENV, "");
        let result = worker_path(None);
        env::remove_var(WORKER_PATH_ENV);
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_defaults_to_current_exe() {
        env::remove_var(WORKER_PATH_ENV);
        let result = worker_path(None).expect("failed to get worker path");
        assert_eq!(env::current_exe().unwrap(), result);
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn test_should_find_bare_name_on_path() {
        let temp = TempDir::new().expect("failed to create temp dir");
        let worker_file_path = temp.path().join("harness-worker");
        std::fs::write(&worker_file_path, "hello").expect("failed to create worker file");
        let mut perms = std::fs::metadata(&worker_file_path)
            .unwrap()
            .permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&worker_file_path, perms).unwrap();

        let original_path = env::var_os("PATH");
        env::set_var("PATH", temp.path());
        env::set_var(WORKER_PATH_ENV, "harness-worker");

        let result = worker_path(None);

        env::remove_var(WORKER_PATH_ENV);
        match original_path {
            Some(path) => env::set_var("PATH", path),
            None => env::remove_var("PATH"),
        }
        assert_eq!(result.expect("failed to get worker path"), worker_file_path);
    }
}
