// HTTP routes

mod http;

use axum::{
    Router,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::device_limits::DeviceLimiter;
use crate::inventory::Inventory;
use crate::load::LoadGuard;
use crate::orchestrator::Tracer;
use crate::transport::Connector;
use crate::vlan::VlanWorkflow;

pub(crate) struct AppState<C: Connector> {
    pub(crate) tracer: Arc<Tracer<C>>,
    pub(crate) vlan: Arc<VlanWorkflow<C>>,
    pub(crate) inventory: Arc<dyn Inventory>,
    pub(crate) load: Arc<LoadGuard>,
    pub(crate) limiter: Arc<DeviceLimiter>,
}

// Manual impl: derive would demand `C: Clone`.
impl<C: Connector> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            tracer: Arc::clone(&self.tracer),
            vlan: Arc::clone(&self.vlan),
            inventory: Arc::clone(&self.inventory),
            load: Arc::clone(&self.load),
            limiter: Arc::clone(&self.limiter),
        }
    }
}

/// Services the router dispatches to.
pub struct Services<C: Connector> {
    pub tracer: Arc<Tracer<C>>,
    pub vlan: Arc<VlanWorkflow<C>>,
    pub inventory: Arc<dyn Inventory>,
    pub load: Arc<LoadGuard>,
    pub limiter: Arc<DeviceLimiter>,
}

pub fn app<C: Connector>(services: Services<C>) -> Router {
    let state = AppState {
        tracer: services.tracer,
        vlan: services.vlan,
        inventory: services.inventory,
        load: services.load,
        limiter: services.limiter,
    };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/groups", get(http::groups_handler::<C>)) // GET /api/groups
        .route("/api/trace", post(http::trace_handler::<C>)) // POST /api/trace
        .route("/api/vlan", post(http::vlan_handler::<C>)) // POST /api/vlan
        .route("/api/load", get(http::load_handler::<C>)) // GET /api/load
        .route("/api/devices/health", get(http::health_handler::<C>)) // GET /api/devices/health
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

/// Serves until `shutdown` resolves, then stops accepting and lets open connections finish.
/// Idle keep-alive connections close at once, so every state clone is gone on return.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
