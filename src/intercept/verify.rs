//! External signature verifier.

use std::ffi::OsString;
use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use crate::error::InterceptError;

/// Verifies a downloaded artifact against its companion signature.
///
/// Implementations are called from the blocking pool and may block.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, artifact: &Path) -> Result<(), InterceptError>;
}

/// Runs `<program> -verify <key> <artifact>`; the verifier locates the
/// companion file next to the artifact itself.
#[derive(Debug, Clone)]
pub struct CommandVerifier {
    program: String,
    key: String,
}

impl CommandVerifier {
    pub fn new(program: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            key: key.into(),
        }
    }

    /// Arguments passed to the verifier for `artifact`.
    pub fn args(&self, artifact: &Path) -> Vec<OsString> {
        vec![
            OsString::from("-verify"),
            OsString::from(&self.key),
            artifact.as_os_str().to_os_string(),
        ]
    }

    /// Run the verifier with stdout and stderr sharing one pipe, so the
    /// captured text keeps the order it was written in.
    fn run(&self, artifact: &Path) -> std::io::Result<(ExitStatus, String)> {
        let (mut reader, writer) = std::io::pipe()?;
        let mut command = Command::new(&self.program);
        command
            .args(self.args(artifact))
            .stdin(Stdio::null())
            .stdout(writer.try_clone()?)
            .stderr(writer);
        let mut child = command.spawn()?;
        // The command still owns our copies of the write end.
        drop(command);

        let mut output = Vec::new();
        let read = reader.read_to_end(&mut output);
        let status = child.wait()?;
        read?;

        Ok((status, String::from_utf8_lossy(&output).trim_end().to_string()))
    }
}

impl SignatureVerifier for CommandVerifier {
    fn verify(&self, artifact: &Path) -> Result<(), InterceptError> {
        let path = artifact.display().to_string();
        let (status, output) = self.run(artifact).map_err(|e| {
            InterceptError::verification(&path, format!("failed to run {}: {}", self.program, e))
        })?;

        if status.success() {
            return Ok(());
        }

        Err(InterceptError::verification(
            path,
            format!("{}: {}", status, output),
        ))
    }
}
