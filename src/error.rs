//! Startup error taxonomy.
//!
//! These are fatal: they stop the service before it serves a request. Probe
//! failures never use them; a failing probe becomes a failed report entry.

use std::io;

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("ping.json requires build_date_key and commit_id_key to be provided (missing {0})")]
    MissingPingKey(&'static str),

    #[error("Unknown default probe reference: {0}")]
    UnknownProbe(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid listen address: {0}")]
    Address(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            SetupError::MissingPingKey("commit_id_key").to_string(),
            "ping.json requires build_date_key and commit_id_key to be provided (missing commit_id_key)"
        );
        assert_eq!(
            SetupError::UnknownProbe("cache".into()).to_string(),
            "Unknown default probe reference: cache"
        );
        let config = SetupError::from(ConfigError::Validation("bad".into()));
        assert_eq!(config.to_string(), "Configuration error: bad");
    }
}
