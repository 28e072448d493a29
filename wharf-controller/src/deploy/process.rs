//! Child process execution shared by the tool adapters

use std::path::Path;
use std::process::Output;

use tokio::process::Command;
use tracing::debug;

use super::DeployError;

/// Runs `program` with `args` to completion
///
/// The child is killed if the returned future is dropped, which is how an
/// abandoned image pull stops the underlying process. A non-zero exit status
/// is reported as [`DeployError::Exit`] with the trimmed stderr.
pub(crate) async fn run(
    program: &str,
    args: &[&str],
    dir: Option<&Path>,
    envs: &[(&str, &str)],
) -> Result<Output, DeployError> {
    let mut command = Command::new(program);
    command.args(args).kill_on_drop(true);

    if let Some(dir) = dir {
        command.current_dir(dir);
    }

    for (key, value) in envs {
        command.env(key, value);
    }

    debug!("Running {} {:?}", program, args);

    let output = command.output().await.map_err(|source| DeployError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !stdout.trim().is_empty() {
        debug!("{} stdout: {}", program, stdout.trim());
    }
    if !stderr.trim().is_empty() {
        debug!("{} stderr: {}", program, stderr.trim());
    }

    if !output.status.success() {
        return Err(DeployError::Exit {
            program: program.to_string(),
            code: output.status.code().unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(output)
}
