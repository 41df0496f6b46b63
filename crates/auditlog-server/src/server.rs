// ABOUTME: HTTP server loop with graceful shutdown and a bounded grace period.
// ABOUTME: After the grace period, in-flight storage calls are cancelled and the server task is dropped.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::app_state::SharedState;
use crate::routes::create_router;

/// Serve the router on `listener` until `shutdown` resolves.
///
/// Once `shutdown` fires the listener stops accepting, in-flight requests get
/// `grace` to finish, and then the state's force-close token is cancelled.
pub async fn serve<F>(
    listener: TcpListener,
    state: SharedState,
    shutdown: F,
    grace: Duration,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let force_close = state.force_close.clone();
    let stop = CancellationToken::new();
    let stop_signal = stop.clone();

    let app = create_router(state).into_make_service_with_connect_info::<SocketAddr>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { stop_signal.cancelled().await });
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut server => {
            return joined.map_err(std::io::Error::other)?;
        }
        _ = shutdown => {}
    }

    tracing::info!(?grace, "shutdown requested, draining in-flight requests");
    stop.cancel();

    match tokio::time::timeout(grace, &mut server).await {
        Ok(joined) => {
            tracing::info!("server stopped");
            joined.map_err(std::io::Error::other)?
        }
        Err(_) => {
            tracing::warn!(?grace, "grace period elapsed, cancelling in-flight requests");
            force_close.cancel();
            server.abort();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::AppState;
    use async_trait::async_trait;
    use auditlog_core::Event;
    use auditlog_store::{EventRepository, MemoryRepository, OpContext, StoreError};
    use chrono::{DateTime, Utc};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    async fn raw_get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8_lossy(&response).into_owned()
    }

    #[tokio::test]
    async fn serves_until_shutdown_signal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(AppState::new(Arc::new(MemoryRepository::new(
            Duration::from_secs(60),
        ))));
        let (tx, rx) = oneshot::channel::<()>();

        let task = tokio::spawn(serve(
            listener,
            state,
            async move {
                let _ = rx.await;
            },
            Duration::from_secs(5),
        ));

        let response = raw_get(addr, "/health").await;
        assert!(response.starts_with("HTTP/1.1 200"), "got: {}", response);
        assert!(response.ends_with("OK"));

        tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    /// Repository whose reads block until the caller's context gives up.
    struct StuckRepository;

    #[async_trait]
    impl EventRepository for StuckRepository {
        async fn create(&self, _ctx: &OpContext) -> Result<(), StoreError> {
            Ok(())
        }
        async fn save(&self, _ctx: &OpContext, event: Event) -> Result<Event, StoreError> {
            Ok(event)
        }
        async fn delete(&self, _ctx: &OpContext, _id: &str) -> Result<Option<Event>, StoreError> {
            Ok(None)
        }
        async fn get(&self, ctx: &OpContext, _id: &str) -> Result<Option<Event>, StoreError> {
            ctx.run(std::future::pending()).await
        }
        async fn find_by_date_and_return_code(
            &self,
            _ctx: &OpContext,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
            _status_code: i64,
        ) -> Result<Vec<Event>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn grace_period_bounds_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(
            AppState::new(Arc::new(StuckRepository)).with_request_timeout(Duration::from_secs(600)),
        );
        let force_close = state.force_close.clone();
        let (tx, rx) = oneshot::channel::<()>();

        let task = tokio::spawn(serve(
            listener,
            state,
            async move {
                let _ = rx.await;
            },
            Duration::from_millis(200),
        ));

        let in_flight = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream
                .write_all(b"GET /events/stuck HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .await
                .unwrap();
            let mut buf = Vec::new();
            let _ = stream.read_to_end(&mut buf).await;
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();

        assert!(result.is_ok());
        assert!(force_close.is_cancelled());
        in_flight.abort();
    }
}
