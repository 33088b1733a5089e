//! Bounded execution of the external programs RouteCrab drives (`certbot`, `nginx`).

use crate::error::Error;
use std::time::Duration;
use tokio::process::Command;

/// Run `program` with `args`, returning its combined stdout and stderr.
///
/// The child is killed if it outlives `timeout`.
///
/// # Errors
///
/// Returns [`Error::IO`] if the program can't be spawned, [`Error::CommandTimeout`] if it
/// doesn't exit in time and [`Error::CommandFailed`] if it exits unsuccessfully.
pub async fn run(program: &str, args: &[&str], timeout: Duration) -> Result<String, Error> {
    tracing::debug!("running {program} {}", args.join(" "));
    let child = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(timeout, child).await {
        Ok(res) => res?,
        Err(_) => {
            return Err(Error::CommandTimeout {
                program: program.to_string(),
                timeout,
            })
        }
    };

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(Error::CommandFailed {
            program: program.to_string(),
            status: output.status.to_string(),
            output: combined.trim().to_string(),
        });
    }
    Ok(combined)
}
