// src/probe.rs

//! Connectivity probing.
//!
//! A probe answers one question: can we reach the outside world right now?
//! Every failure mode (DNS error, refused connection, no route, timeout) is
//! folded into [`Connectivity::Offline`]; nothing here returns an error.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::net::{TcpStream, lookup_host};
use tokio::time::timeout;
use tracing::debug;

use crate::types::Connectivity;

/// Upper bound applied to every probe regardless of configuration.
pub const MAX_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Trait abstracting the reachability check.
///
/// Production code uses [`TcpProbe`]; tests replay scripted readings.
/// Implementations must tolerate overlapping calls.
pub trait ConnectivityProbe: Send + Sync {
    fn check(&self) -> Pin<Box<dyn Future<Output = Connectivity> + Send + '_>>;
}

/// Resolves a well-known host and opens a TCP connection to it.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: timeout.min(MAX_PROBE_TIMEOUT),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new("google.com", 443, MAX_PROBE_TIMEOUT)
    }
}

impl ConnectivityProbe for TcpProbe {
    fn check(&self) -> Pin<Box<dyn Future<Output = Connectivity> + Send + '_>> {
        Box::pin(async move {
            let target = format!("{}:{}", self.host, self.port);
            if tcp_reachable(&target, self.timeout).await {
                Connectivity::Online
            } else {
                Connectivity::Offline
            }
        })
    }
}

/// Resolve `target` (`host:port`) and try each address until one accepts a
/// TCP connection. The whole attempt, DNS included, is bounded by `limit`.
pub async fn tcp_reachable(target: &str, limit: Duration) -> bool {
    let attempt = async {
        let addrs = match lookup_host(target).await {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!(%target, error = %e, "address resolution failed");
                return false;
            }
        };
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(_) => return true,
                Err(e) => debug!(%target, %addr, error = %e, "connect failed"),
            }
        }
        false
    };

    match timeout(limit, attempt).await {
        Ok(reachable) => reachable,
        Err(_) => {
            debug!(%target, timeout_ms = limit.as_millis() as u64, "reachability check timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn local_listener_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let probe = TcpProbe::new("127.0.0.1", addr.port(), Duration::from_secs(1));
        assert_eq!(probe.check().await, Connectivity::Online);
    }

    #[tokio::test]
    async fn closed_port_maps_to_offline() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let probe = TcpProbe::new("127.0.0.1", port, Duration::from_secs(1));
        assert_eq!(probe.check().await, Connectivity::Offline);
    }

    #[tokio::test]
    async fn unresolvable_host_maps_to_offline() {
        let probe = TcpProbe::new("host.invalid", 443, Duration::from_secs(2));
        assert_eq!(probe.check().await, Connectivity::Offline);
    }

    #[test]
    fn timeout_is_capped() {
        let probe = TcpProbe::new("example.com", 443, Duration::from_secs(60));
        assert_eq!(probe.timeout(), MAX_PROBE_TIMEOUT);
    }
}
