use std::time::Duration;

use thiserror::Error;

/// Top-level error for everything the node can report.
#[derive(Error, Debug)]
pub enum ChordError {
    #[error("identifier {id} is outside the ring space [0, {modulus})")]
    IdentifierOutOfRange { id: u64, modulus: u64 },

    #[error("finger index {index} is outside [1, {bits}]")]
    IndexOutOfRange { index: u32, bits: u8 },

    #[error("ring bit width {bits} is outside [1, 63]")]
    InvalidBitWidth { bits: u8 },

    #[error("node {node} has not been initialized")]
    NotInitialized { node: u64 },

    #[error("routing for target {target} did not converge after {hops} hops")]
    RoutingDiverged { target: u64, hops: u32 },

    #[error("remote call failed: {0}")]
    Remote(#[from] RemoteError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("server error: {0}")]
    Server(String),
}

impl ChordError {
    /// Whether retrying the whole top-level operation could succeed.
    /// Validation failures are permanent; transport trouble is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChordError::Remote(RemoteError::Unreachable { .. })
                | ChordError::Remote(RemoteError::Timeout { .. })
        )
    }
}

/// Failure of a single outbound call to another node. Kept separate from the
/// validation variants so callers can tell a bad argument from a bad network.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("peer {node} unreachable: {reason}")]
    Unreachable { node: u64, reason: String },

    #[error("call to peer {node} timed out after {timeout:?}")]
    Timeout { node: u64, timeout: Duration },

    #[error("peer {node} returned a malformed response: {reason}")]
    MalformedResponse { node: u64, reason: String },

    #[error("peer {node} rejected the call: {status}")]
    Rejected { node: u64, status: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("address space exhausted: base port {base_port} + modulus {modulus} exceeds 65535")]
    PortRangeOverflow { base_port: u16, modulus: u64 },
}
