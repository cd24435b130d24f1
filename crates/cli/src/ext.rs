//! External secret stores
//!
//! An extension is any program named `redact-ext-<name>` on `PATH`. It is
//! invoked as `redact-ext-<name> <list|get|put> [key=value...]`:
//!
//! - `list` prints a human-readable status line
//! - `get` prints a serialized key store
//! - `put` reads a serialized key store from stdin
//!
//! A non-zero exit fails that call only.

use std::fmt;
use std::io;
use std::process::{Command, Output};
use std::str::FromStr;

use crate::subprocess;

pub const EXTENSION_PREFIX: &str = "redact-ext-";

#[derive(Debug, thiserror::Error)]
pub enum ExtError {
    #[error("invalid extension argument {0:?}: expected key=value")]
    InvalidArgument(String),
    #[error("invalid extension name {0:?}")]
    InvalidName(String),
    #[error("extension {0} is not installed (looked for redact-ext-{0} on PATH)")]
    NotInstalled(String),
    #[error("extension {name} {operation} exited with {status}: {stderr}")]
    Failed {
        name: String,
        operation: &'static str,
        status: String,
        stderr: String,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A `key=value` argument forwarded to the extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtArg {
    pub key: String,
    pub value: String,
}

impl FromStr for ExtArg {
    type Err = ExtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok(Self {
                key: key.to_string(),
                value: value.to_string(),
            }),
            _ => Err(ExtError::InvalidArgument(s.to_string())),
        }
    }
}

impl fmt::Display for ExtArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Somewhere outside the repository that can hold a copy of the key store
pub trait SecretStore {
    /// Human-readable status of the stored copy
    fn list(&self) -> Result<String, ExtError>;

    /// Fetch the serialized key store
    fn get(&self) -> Result<Vec<u8>, ExtError>;

    /// Replace the stored copy with `store`
    fn put(&self, store: &[u8]) -> Result<(), ExtError>;
}

/// [`SecretStore`] implemented by an external program
#[derive(Debug, Clone)]
pub struct ProcessExtension {
    name: String,
    args: Vec<ExtArg>,
}

impl ProcessExtension {
    pub fn new(name: impl Into<String>, args: Vec<ExtArg>) -> Result<Self, ExtError> {
        let name = name.into();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ExtError::InvalidName(name));
        }
        Ok(Self { name, args })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> String {
        format!("{}{}", EXTENSION_PREFIX, self.name)
    }

    fn command(&self, operation: &str) -> Command {
        let mut command = Command::new(self.program());
        command
            .arg(operation)
            .args(self.args.iter().map(|arg| arg.to_string()));
        command
    }

    fn spawn_error(&self, e: io::Error) -> ExtError {
        if e.kind() == io::ErrorKind::NotFound {
            ExtError::NotInstalled(self.name.clone())
        } else {
            ExtError::Io(e)
        }
    }

    fn finish(&self, operation: &'static str, output: Output) -> Result<Vec<u8>, ExtError> {
        if output.status.success() {
            return Ok(output.stdout);
        }
        Err(ExtError::Failed {
            name: self.name.clone(),
            operation,
            status: output.status.to_string(),
            stderr: subprocess::stderr_text(&output),
        })
    }
}

impl SecretStore for ProcessExtension {
    fn list(&self) -> Result<String, ExtError> {
        let output = subprocess::run(&mut self.command("list")).map_err(|e| self.spawn_error(e))?;
        let stdout = self.finish("list", output)?;
        Ok(String::from_utf8_lossy(&stdout).trim_end().to_string())
    }

    fn get(&self) -> Result<Vec<u8>, ExtError> {
        let output = subprocess::run(&mut self.command("get")).map_err(|e| self.spawn_error(e))?;
        self.finish("get", output)
    }

    fn put(&self, store: &[u8]) -> Result<(), ExtError> {
        let output = subprocess::run_with_input(&mut self.command("put"), store)
            .map_err(|e| self.spawn_error(e))?;
        self.finish("put", output)?;
        Ok(())
    }
}
