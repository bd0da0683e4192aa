use std::path::PathBuf;

/// Errors related to configuration loading and registry construction.
///
/// All of these are fatal at startup: the dashboard refuses to run before a
/// single worker has been spawned.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config at {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Instances file not found: {path}")]
    MissingFile { path: PathBuf },

    #[error("Instance `{name}` has no device address")]
    MissingDevice { name: String },

    #[error("Duplicate instance name `{name}`")]
    DuplicateName { name: String },

    #[error("No instances configured (add [[instances]] entries or pass --devices)")]
    EmptyRegistry,
}

/// Errors raised by the status line classifier for marker-prefixed lines
/// whose payload is malformed. Logged and dropped; the worker keeps running.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid status payload: {0}")]
    InvalidPayload(String),

    #[error("Status payload is not a JSON object")]
    NotAnObject,

    #[error("Status field `{key}` is not a scalar value")]
    NonScalarField { key: String },
}

/// Errors spawning a worker process. Instance-local: the affected instance
/// lands in a terminal exited state, other instances are untouched.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("Failed to spawn `{command}`: {source}")]
    SpawnFailed {
        command: String,
        source: std::io::Error,
    },

    #[error("Spawned worker has no capturable {stream} handle")]
    MissingStream { stream: &'static str },
}

/// A worker output stream failed mid-run. Treated as an exit event: the
/// process group is killed and the resulting exit flows through the normal
/// restart policy.
#[derive(Debug, thiserror::Error)]
#[error("Worker stream read failed: {source}")]
pub struct ProcessIOError {
    #[from]
    pub source: std::io::Error,
}
