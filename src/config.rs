use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::chord::ring::{Ident, RingSpace};
use crate::chord::types::FingerUpdatePolicy;
use crate::error::{ChordError, ConfigError};

pub const DEFAULT_BITS: u8 = 6;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_BASE_PORT: u16 = 8000;
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 5_000;

/// Deployment configuration for one node. The same file is expected to be
/// handed to every node of a ring: the ring width and the identifier→address
/// convention must agree across all members.
///
/// A node with identifier `n` listens on `base_port + n`. That mapping is a
/// deployment convention, not part of the protocol; swapping it for a real
/// directory only touches this type.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    /// Ring bit width M; the identifier space is `[0, 2^M)`.
    pub bits: u8,
    /// Host every ring member resolves on.
    pub host: String,
    /// Port of identifier 0; node `n` listens on `base_port + n`.
    pub base_port: u16,
    /// Upper bound on each outbound remote call.
    pub rpc_timeout_ms: u64,
    /// Interval semantics for `update_finger_table`; see `FingerUpdatePolicy`.
    pub finger_update_policy: FingerUpdatePolicy,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            bits: DEFAULT_BITS,
            host: DEFAULT_HOST.to_string(),
            base_port: DEFAULT_BASE_PORT,
            rpc_timeout_ms: DEFAULT_RPC_TIMEOUT_MS,
            finger_update_policy: FingerUpdatePolicy::default(),
        }
    }
}

impl NodeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Checks internal consistency and returns the ring space this config
    /// describes. The port convention must be able to address every
    /// identifier the ring can produce.
    pub fn ring(&self) -> Result<RingSpace, ChordError> {
        let ring = RingSpace::new(self.bits)?;
        let highest = self.base_port as u64 + ring.modulus() - 1;
        if highest > u16::MAX as u64 {
            return Err(ChordError::Config(ConfigError::PortRangeOverflow {
                base_port: self.base_port,
                modulus: ring.modulus(),
            }));
        }
        Ok(ring)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn port_of(&self, id: Ident) -> u16 {
        self.base_port + id as u16
    }

    /// Dialable URL of the node owning `id`.
    pub fn url_of(&self, id: Ident) -> String {
        format!("http://{}:{}", self.host, self.port_of(id))
    }

    /// Local bind address for the node owning `id`.
    pub fn bind_addr_of(&self, id: Ident) -> String {
        format!("{}:{}", self.host, self.port_of(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_a_valid_ring() {
        let config = NodeConfig::default();
        let ring = config.ring().unwrap();
        assert_eq!(ring.bits(), DEFAULT_BITS);
        assert_eq!(config.url_of(5), "http://127.0.0.1:8005");
        assert_eq!(config.bind_addr_of(0), "127.0.0.1:8000");
    }

    #[test]
    fn wide_rings_overflow_the_port_convention() {
        let config = NodeConfig {
            bits: 32,
            ..NodeConfig::default()
        };
        assert!(matches!(
            config.ring(),
            Err(ChordError::Config(ConfigError::PortRangeOverflow { .. }))
        ));
    }

    #[test]
    fn parses_partial_json_with_defaults() {
        let config: NodeConfig =
            serde_json::from_str(r#"{"bits": 4, "finger_update_policy": "paper"}"#).unwrap();
        assert_eq!(config.bits, 4);
        assert_eq!(config.finger_update_policy, FingerUpdatePolicy::Paper);
        assert_eq!(config.base_port, DEFAULT_BASE_PORT);
        assert_eq!(config.host, DEFAULT_HOST);
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(serde_json::from_str::<NodeConfig>(r#"{"bitz": 4}"#).is_err());
    }
}
