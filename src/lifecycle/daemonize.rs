//! Background-mode detachment.
//!
//! The runtime cannot survive a fork, so background mode re-spawns the
//! current executable as a detached child (own session, stdio redirected)
//! before any runtime exists, and the foreground parent exits. The child
//! carries a marker in its environment so it does not re-spawn in turn; it
//! is the one that writes the pid-file.

use std::io;
use std::process::Stdio;

use crate::config::schema::DaemonConfig;

const MARKER_ENV: &str = "RSHD_BACKGROUND";

/// Re-spawn into the background when configured to.
///
/// Returns `true` in the foreground parent, whose only remaining job is to
/// exit successfully; `false` when the caller should keep running (either
/// background mode is off, or this already is the detached child).
pub fn respawn_in_background(config: &DaemonConfig) -> io::Result<bool> {
    if !config.background || std::env::var_os(MARKER_ENV).is_some() {
        return Ok(false);
    }

    let exe = std::env::current_exe()?;

    let (stdout, stderr): (Stdio, Stdio) = match &config.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            (file.try_clone()?.into(), file.into())
        }
        None => (Stdio::null(), Stdio::null()),
    };

    let mut command = std::process::Command::new(exe);
    command
        .args(std::env::args_os().skip(1))
        .env(MARKER_ENV, "1")
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr);

    // Detach from the controlling terminal and the parent's session.
    unsafe {
        use std::os::unix::process::CommandExt;
        command.pre_exec(|| {
            if libc::setsid() < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }

    command.spawn()?;
    Ok(true)
}
