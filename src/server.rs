use anyhow::Result;
use axum::{middleware, routing::any, Router};
use std::future::{Future, IntoFuture};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::config::ServerConfig;
use crate::handler::greeting::greeting;
use crate::handler::middleware as handler_middleware;
use crate::handler::proxy::proxy;
use crate::handler::state::ProxyState;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Shutdown {
    Graceful,
    TimedOut,
}

pub(crate) fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/proxy", any(proxy))
        .fallback(greeting)
        .layer(middleware::from_fn(handler_middleware::metrics))
        .with_state(state)
}

/// Binds, serves until SIGINT/SIGTERM and drains. Failures are logged, not returned.
pub(crate) async fn run(config: &ServerConfig, state: ProxyState) {
    let socket_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.port);
    let listener = match TcpListener::bind(socket_addr).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%error, "HTTP server couldn't bind on :{}", config.port);
            return;
        }
    };

    tracing::info!("HTTP server start and bind on :{}", config.port);

    match serve(listener, router(state), shutdown_signal(), config.shutdown_timeout).await {
        Ok(Shutdown::Graceful) => tracing::info!("HTTP server success gracefully shutdown"),
        Ok(Shutdown::TimedOut) => tracing::warn!(
            timeout = ?config.shutdown_timeout,
            "HTTP server gracefully shutdown: in-flight requests did not finish in time"
        ),
        Err(error) => {
            tracing::error!("HTTP server: {error:#}");
            return;
        }
    }

    tracing::info!("HTTP server closed");
}

/// Serves `router` until `signal` resolves, then waits up to `drain_timeout`
/// for in-flight requests. Connections still open after that are left to be
/// dropped with the runtime.
pub(crate) async fn serve<S>(
    listener: TcpListener,
    router: Router,
    signal: S,
    drain_timeout: Duration,
) -> Result<Shutdown>
where
    S: Future<Output = ()> + Send + 'static,
{
    let (signalled_tx, mut signalled_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            signal.await;
            let _ = signalled_tx.send(());
        })
        .into_future();
    let mut server = std::pin::pin!(server);

    let stopped_early = tokio::select! {
        biased;
        _ = &mut signalled_rx => None,
        result = &mut server => Some(result),
    };
    if let Some(result) = stopped_early {
        result?;
        // The drain may finish in the same poll that saw the signal.
        if signalled_rx.try_recv().is_err() {
            anyhow::bail!("stopped without a shutdown signal");
        }
        return Ok(Shutdown::Graceful);
    }

    match tokio::time::timeout(drain_timeout, server).await {
        Ok(result) => {
            result?;
            Ok(Shutdown::Graceful)
        }
        Err(_) => Ok(Shutdown::TimedOut),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(%error, "Couldn't listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "Couldn't listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    fn slow_router(delay: Duration) -> Router {
        Router::new().route(
            "/slow",
            get(move || async move {
                tokio::time::sleep(delay).await;
                "done"
            }),
        )
    }

    async fn start(
        router: Router,
        drain_timeout: Duration,
    ) -> (
        SocketAddr,
        oneshot::Sender<()>,
        tokio::task::JoinHandle<Result<Shutdown>>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (trigger_tx, trigger_rx) = oneshot::channel::<()>();
        let signal = async move {
            let _ = trigger_rx.await;
        };
        let handle = tokio::spawn(serve(listener, router, signal, drain_timeout));
        (addr, trigger_tx, handle)
    }

    fn test_client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    #[tokio::test]
    async fn shutdown_without_requests_is_graceful() {
        let (_, trigger, handle) = start(slow_router(Duration::ZERO), Duration::from_secs(5)).await;
        trigger.send(()).unwrap();
        assert_eq!(handle.await.unwrap().unwrap(), Shutdown::Graceful);
    }

    #[tokio::test]
    async fn in_flight_request_completes_during_shutdown() {
        let (addr, trigger, handle) =
            start(slow_router(Duration::from_secs(1)), Duration::from_secs(5)).await;

        let request = tokio::spawn(test_client().get(format!("http://{addr}/slow")).send());
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.send(()).unwrap();

        let response = request.await.unwrap().unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "done");
        assert_eq!(handle.await.unwrap().unwrap(), Shutdown::Graceful);
    }

    #[tokio::test]
    async fn slow_request_exceeds_drain_timeout() {
        let (addr, trigger, handle) =
            start(slow_router(Duration::from_secs(30)), Duration::from_millis(300)).await;

        let request = tokio::spawn(test_client().get(format!("http://{addr}/slow")).send());
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.send(()).unwrap();

        assert_eq!(handle.await.unwrap().unwrap(), Shutdown::TimedOut);
        request.abort();
    }

    #[tokio::test]
    async fn run_returns_when_port_is_taken() {
        let occupied = TcpListener::bind("0.0.0.0:0").await.unwrap();
        let config = ServerConfig {
            port: occupied.local_addr().unwrap().port(),
            log_level: crate::config::LogLevel::Info,
            json: false,
            metrics_port: None,
            shutdown_timeout: Duration::from_secs(5),
        };
        let state = ProxyState {
            http_client: test_client(),
        };

        tokio::time::timeout(Duration::from_secs(5), run(&config, state))
            .await
            .expect("run should give up on a port that is already bound");
    }

    #[tokio::test]
    async fn new_connections_refused_after_shutdown() {
        let (addr, trigger, handle) = start(slow_router(Duration::ZERO), Duration::from_secs(5)).await;
        trigger.send(()).unwrap();
        handle.await.unwrap().unwrap();

        assert!(test_client()
            .get(format!("http://{addr}/slow"))
            .send()
            .await
            .is_err());
    }
}
