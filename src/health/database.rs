//! Default database reachability probe.
//!
//! The probe only proves that a connection to the primary backend can be
//! acquired and released. Drivers are reached through the [`Connector`]
//! adapter; the bundled [`TcpConnector`] opens and drops a TCP connection.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

use super::probe::{Probe, ProbeError};
use super::result::Outcome;

/// Name the default database probe reports under.
pub const DATABASE_PROBE_NAME: &str = "database";

/// Acquires (and immediately releases) a connection to a persistence backend.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<(), ProbeError>;
}

/// Connects to `address` over TCP, bounded by `timeout`.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
    timeout: Duration,
}

impl TcpConnector {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<(), ProbeError> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await??;
        drop(stream);
        Ok(())
    }
}

/// Passes when the connector succeeds; its error otherwise propagates to the registry.
pub struct DatabaseProbe<C> {
    connector: C,
}

impl<C: Connector> DatabaseProbe<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }
}

#[async_trait]
impl<C: Connector> Probe for DatabaseProbe<C> {
    fn name(&self) -> String {
        DATABASE_PROBE_NAME.to_string()
    }

    async fn check(&self) -> Result<Outcome, ProbeError> {
        self.connector.connect().await?;
        Ok(true.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_connector_reaches_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let probe = DatabaseProbe::new(TcpConnector::new(address, Duration::from_secs(1)));
        assert_eq!(probe.name(), "database");
        assert_eq!(probe.check().await.unwrap(), Outcome::Status(true));
    }

    #[tokio::test]
    async fn test_tcp_connector_refused() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let probe = DatabaseProbe::new(TcpConnector::new(address, Duration::from_secs(1)));
        let err = probe.check().await.unwrap_err();
        assert_eq!(err.kind(), "Error");
    }
}
