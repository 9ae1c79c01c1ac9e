use crate::RegistrationState;
use crate::mapper::RegistrationResponse;
use axum::{
    Router,
    extract::State,
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use common::CatalogClient;
use percent_encoding::percent_decode_str;

/// Route prefix; everything after it is the service name
pub const REGISTRATION_PREFIX: &str = "/v1/registration/";

/// Service name taken from the request path, forwarded to the catalog as-is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceQuery {
    pub name: String,
}

impl ServiceQuery {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Everything after the prefix, percent-decoded. Bytes that are not valid
    /// UTF-8 are replaced rather than rejected.
    pub fn from_path(path: &str) -> Self {
        let raw = path.strip_prefix(REGISTRATION_PREFIX).unwrap_or_default();
        Self::new(percent_decode_str(raw).decode_utf8_lossy())
    }
}

/// Create registration routes
pub fn router<S: RegistrationState>() -> Router<S> {
    Router::new()
        // `/*rest` does not match an empty name
        .route("/v1/registration/", get(get_registration::<S>))
        .route("/v1/registration/*rest", get(get_registration::<S>))
}

/// GET /v1/registration/:service_name
///
/// List the hosts registered in the catalog under `service_name`
#[tracing::instrument(skip(state))]
pub async fn get_registration<S: RegistrationState>(State(state): State<S>, uri: Uri) -> Response {
    lookup_registration(state.catalog(), &ServiceQuery::from_path(uri.path())).await
}

/// Query the catalog once and render the registration document.
///
/// A failed query becomes a 500 whose plain-text body is the error message.
pub async fn lookup_registration(catalog: &dyn CatalogClient, query: &ServiceQuery) -> Response {
    let instances = match catalog.query_instances(&query.name).await {
        Ok(instances) => instances,
        Err(e) => {
            log::warn!("Catalog query for service {:?} failed: {e}", query.name);
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    log::debug!(
        "Catalog returned {} instance(s) for service {:?}",
        instances.len(),
        query.name
    );

    match RegistrationResponse::from_instances(&instances).to_json() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(e) => {
            log::error!("Failed to serialize registration for {:?}: {e}", query.name);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
