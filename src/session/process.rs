//! Spawning the monitored CLI.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command as AsyncCommand};
use tracing::{debug, info};

use crate::error::{OverseerError, Result};
use crate::monitor::ExitInfo;

/// Resolve the monitored executable on `PATH`.
pub fn locate(binary: &str) -> Result<PathBuf> {
    which::which(binary).map_err(|e| OverseerError::MissingExecutable {
        name: binary.to_string(),
        detail: e.to_string(),
    })
}

/// Spawn `binary` in `project_dir` with all three standard streams piped.
pub fn spawn_monitored(binary: &str, args: &[String], project_dir: &Path) -> Result<Child> {
    let program = locate(binary)?;
    debug!("Spawning {} {:?} in {}", program.display(), args, project_dir.display());

    let child = match AsyncCommand::new(&program)
        .args(args)
        .current_dir(project_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(OverseerError::MissingExecutable {
                name: binary.to_string(),
                detail: e.to_string(),
            });
        }
        Err(e) => return Err(OverseerError::spawn(binary, e.to_string())),
    };

    info!(
        "Monitored process {} started (pid {})",
        binary,
        child.id().map_or_else(|| "?".to_string(), |id| id.to_string())
    );
    Ok(child)
}

/// Exit information from a process status.
#[must_use]
pub fn exit_info(status: std::process::ExitStatus) -> ExitInfo {
    #[cfg(unix)]
    let signal = std::os::unix::process::ExitStatusExt::signal(&status);
    #[cfg(not(unix))]
    let signal = None;

    ExitInfo {
        code: status.code(),
        signal,
    }
}
