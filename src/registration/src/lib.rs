use axum::Router;
use common::CatalogClient;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod endpoints;
pub mod mapper;

pub use endpoints::registration::REGISTRATION_PREFIX;
pub use mapper::{RegistrationHost, RegistrationHostTags, RegistrationResponse};

pub trait RegistrationState: std::fmt::Debug + Clone + Send + Sync + 'static {
    fn catalog(&self) -> &dyn CatalogClient;
}

/// Shared handler state: the catalog client, nothing mutable
#[derive(Clone)]
pub struct CatalogState {
    catalog: Arc<dyn CatalogClient>,
}

impl std::fmt::Debug for CatalogState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogState")
            .field("catalog", &"CatalogClient")
            .finish()
    }
}

impl CatalogState {
    pub fn new<C: CatalogClient + 'static>(catalog: C) -> Self {
        Self {
            catalog: Arc::new(catalog),
        }
    }
}

impl RegistrationState for CatalogState {
    fn catalog(&self) -> &dyn CatalogClient {
        self.catalog.as_ref()
    }
}

/// Create a new router instance with the registration routes configured
pub fn create_router<S: RegistrationState>(state: S) -> Router {
    endpoints::registration::router::<S>()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
