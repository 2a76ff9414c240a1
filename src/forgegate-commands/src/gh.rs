//! `gh` CLI passthrough for commands without a custom helper.
//!
//! The selected credential is injected via `GH_TOKEN` for the child process
//! only; it never appears in arguments or logs.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use forgegate_policy::Credential;

use crate::{CommandError, CommandOutput};

/// Deadline for one gh invocation.
const GH_TIMEOUT: Duration = Duration::from_secs(60);

/// Run `gh <args> -R <repo>` with the credential in the environment.
pub async fn execute(
    args: &[String],
    repo: &str,
    credential: &Credential,
) -> Result<CommandOutput, CommandError> {
    debug!(?args, repo, "running gh passthrough");

    let child = Command::new("gh")
        .args(args)
        .arg("-R")
        .arg(repo)
        .env("GH_TOKEN", credential.token())
        .env("GH_HOST", "github.com")
        .env("NO_COLOR", "1")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let output = tokio::time::timeout(GH_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| CommandError::Timeout)??;

    Ok(CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
