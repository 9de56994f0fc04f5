use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    time::Duration,
};

use tokio::{net::TcpStream, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::error::SupervisorError;

pub async fn ping_backend(port: u16, timeout: Duration) -> bool {
    let timeout = timeout.max(Duration::from_millis(50));
    for ip in [
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(Ipv6Addr::LOCALHOST),
    ] {
        let address = SocketAddr::new(ip, port);
        if let Ok(Ok(_)) = tokio::time::timeout(timeout, TcpStream::connect(address)).await {
            return true;
        }
    }
    false
}

#[derive(Debug, Clone, Copy)]
pub struct ReadinessCheck {
    pub port: u16,
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
    pub ping_timeout: Duration,
}

/// Polls until the backend accepts connections.
///
/// `child_exit` reports `Some(status)` once the backend process has exited;
/// that ends the wait early instead of running into the deadline.
pub async fn wait_for_backend<F>(
    check: ReadinessCheck,
    cancel: &CancellationToken,
    mut child_exit: F,
) -> Result<(), SupervisorError>
where
    F: FnMut() -> Result<Option<String>, SupervisorError>,
{
    let start_time = Instant::now();

    loop {
        if cancel.is_cancelled() {
            return Err(SupervisorError::Cancelled);
        }
        if ping_backend(check.port, check.ping_timeout).await {
            tracing::info!(
                port = check.port,
                elapsed_ms = start_time.elapsed().as_millis() as u64,
                "backend is reachable"
            );
            return Ok(());
        }

        if let Some(status) = child_exit()? {
            return Err(SupervisorError::ExitedBeforeReady(status));
        }

        if let Some(limit) = check.timeout {
            if start_time.elapsed() >= limit {
                return Err(SupervisorError::ReadinessTimeout(limit.as_millis()));
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(SupervisorError::Cancelled),
            _ = tokio::time::sleep(check.poll_interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    fn readiness(port: u16, timeout_ms: u64) -> ReadinessCheck {
        ReadinessCheck {
            port,
            timeout: Some(Duration::from_millis(timeout_ms)),
            poll_interval: Duration::from_millis(20),
            ping_timeout: Duration::from_millis(100),
        }
    }

    async fn unused_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn wait_for_backend_returns_once_port_accepts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let result =
            wait_for_backend(readiness(port, 2_000), &CancellationToken::new(), || Ok(None)).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn wait_for_backend_times_out() {
        let port = unused_port().await;

        let result =
            wait_for_backend(readiness(port, 100), &CancellationToken::new(), || Ok(None)).await;

        assert!(matches!(result, Err(SupervisorError::ReadinessTimeout(100))));
    }

    #[tokio::test]
    async fn wait_for_backend_stops_when_child_exits() {
        let port = unused_port().await;

        let result = wait_for_backend(readiness(port, 5_000), &CancellationToken::new(), || {
            Ok(Some("exit status: 1".to_string()))
        })
        .await;

        match result {
            Err(SupervisorError::ExitedBeforeReady(status)) => {
                assert_eq!(status, "exit status: 1")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn wait_for_backend_honors_cancellation() {
        let port = unused_port().await;
        let cancel = CancellationToken::new();
        let mut check = readiness(port, 0);
        check.timeout = None;

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let result = wait_for_backend(check, &cancel, || Ok(None)).await;

        assert!(matches!(result, Err(SupervisorError::Cancelled)));
    }
}
