use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Offering;
use crate::handlers::{
    health_check_handler, issue_credential_handler, root_handler, verify_handler, AppState,
};
use crate::models::{ErrorBody, HealthResponse, IssueRequest, VerifyRequest, VerifyResponse};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health_check_handler,
        crate::handlers::issue_credential_handler,
        crate::handlers::verify_handler
    ),
    components(
        schemas(IssueRequest, VerifyRequest, VerifyResponse, HealthResponse, ErrorBody)
    ),
    tags(
        (name = "Vouch Issuer API", description = "Issues and verifies achievement credentials")
    )
)]
struct ApiDoc;

/// Build the router. Each offering is mounted as its own `POST` route.
pub fn create_app(state: AppState, offerings: &[Offering]) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .route("/", get(root_handler))
        .route("/health", get(health_check_handler))
        .route("/verify", post(verify_handler));

    for offering in offerings {
        router = router.route(
            &offering.path,
            post(issue_credential_handler).layer(Extension(Arc::new(offering.clone()))),
        );
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
