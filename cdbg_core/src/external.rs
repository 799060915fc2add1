//! The external-process boundary: BLAST, the R-driven association
//! engine, and the headless-browser renderer are spawned as opaque
//! subprocesses. This module only knows how to run a command line, capture
//! its output, and translate a non-zero exit into `PipelineError::ExternalTool`.

use crate::error::{PipelineError, Result};
use std::path::Path;
use std::process::Command;

/// The tail of stderr kept in an `ExternalTool` error message.
const STDERR_TAIL_BYTES: usize = 4096;

/// Runs `command` with `args`, waits for completion, and returns stdout as a
/// string. A non-zero exit status becomes an `ExternalTool` error carrying
/// the full command line and the tail of the child's stderr.
pub fn run(command: &str, args: &[&str]) -> Result<String> {
    let full_command = render_command(command, args);
    let output = Command::new(command)
        .args(args)
        .output()
        .map_err(|e| PipelineError::Io {
            path: Path::new(command).to_path_buf(),
            source: e,
        })?;

    if !output.status.success() {
        return Err(PipelineError::ExternalTool {
            command: full_command,
            stderr_tail: tail(&output.stderr),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn render_command(command: &str, args: &[&str]) -> String {
    std::iter::once(command)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

fn tail(bytes: &[u8]) -> String {
    let start = bytes.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&bytes[start..]).into_owned()
}
