use kvmbench_core::{Error, Result};
use std::path::{Path, PathBuf};

/// Finds an external tool: explicit path, then `env_var`, then next to the
/// current executable, then `PATH`.
pub fn find_binary(name: &str, env_var: &str, explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(Error::BinaryNotFound {
            name: path.display().to_string(),
        });
    }

    if let Ok(path) = std::env::var(env_var) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join(name);
            if sibling.exists() {
                return Ok(sibling);
            }
        }
    }

    which::which(name).map_err(|_| Error::BinaryNotFound {
        name: name.to_string(),
    })
}
