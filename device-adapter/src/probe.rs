//! Pre-connect liveness probe
//!
//! Adapters call this before opening their real session so that a powered-off
//! device surfaces as [`AdapterError::DevicePoweredOff`] instead of a slow
//! protocol timeout.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;

use crate::error::{AdapterError, Result};

/// Open and immediately drop a TCP connection to `addr`
pub async fn tcp_probe(device: &str, addr: SocketAddr, timeout: Duration) -> Result<()> {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => {
            tracing::trace!("Liveness probe to {} ({}) succeeded", device, addr);
            Ok(())
        }
        Ok(Err(e)) => Err(AdapterError::DevicePoweredOff {
            device: device.to_string(),
            reason: format!("{}: {}", addr, e),
        }),
        Err(_) => Err(AdapterError::DevicePoweredOff {
            device: device.to_string(),
            reason: format!("{}: no answer within {:?}", addr, timeout),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_probe_reaches_listening_device() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio_test::assert_ok!(tcp_probe("Avr", addr, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_probe_reports_powered_off() {
        // Bind then drop to get a port nobody listens on
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let err = tcp_probe("Avr", addr, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::DevicePoweredOff { ref device, .. } if device == "Avr"));
        assert!(err.is_connection_error());
    }
}
