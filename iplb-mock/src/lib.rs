//! In-memory fake of the IP load-balancer HTTP frontend API.
//!
//! Serves the frontend collection of every provisioned service with the
//! remote's canonicalization (sorted ports, `/32` on bare addresses), rejects
//! duplicate `(zone, port)` pairs and can inject failures on demand.

pub mod routes;
pub mod state;

use std::net::SocketAddr;

use axum::{Router, middleware, routing::get};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

pub use axum::http::Method;
pub use state::{Frontend, FrontendInput, MockError, MockState, ZONES};

/// Build the router over `state`.
pub fn router(state: MockState) -> Router {
    Router::new()
        .route(
            "/ipLoadbalancing/{service}/http/frontend",
            get(routes::list_frontends).post(routes::create_frontend),
        )
        .route(
            "/ipLoadbalancing/{service}/http/frontend/{id}",
            get(routes::get_frontend)
                .put(routes::update_frontend)
                .delete(routes::delete_frontend),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            routes::inject_faults,
        ))
        .with_state(state)
}

/// A mock server running on a background task. Stops when dropped.
pub struct MockServer {
    addr: SocketAddr,
    state: MockState,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MockServer {
    /// Serve `state` on an ephemeral localhost port.
    pub async fn spawn(state: MockState) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel();

        let app = router(state.clone());
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!("Mock server failed: {}", e);
            }
        });

        info!(%addr, "Mock server listening");
        Ok(Self {
            addr,
            state,
            shutdown: Some(tx),
            handle: Some(handle),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Root URL to hand to a client, without trailing slash.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn state(&self) -> &MockState {
        &self.state
    }

    /// Stop serving and wait for the server task to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
