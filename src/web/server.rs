use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::limit::ConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::{debug, error};

use crate::cli::{load_library, ServeArgs};
use crate::core::token::format_position;
use crate::library::TileLibrary;
use crate::provider::CallProvider;
use crate::query::{AroundQuery, QueryConfig, QueryEngine, QueryError, RangeQuery};

/// Query bodies are a handful of fields plus an optional sample list
pub const MAX_BODY_SIZE: usize = 1024 * 1024; // 1MB

/// Upper bound on one request, provider round trips included
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

type SharedProvider = dyn CallProvider + Send + Sync;

/// Shared application state
pub struct AppState {
    pub library: TileLibrary,
    pub provider: Box<SharedProvider>,
    pub config: QueryConfig,
}

/// Error payload returned to clients
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// A failed request: 4xx with an actionable message, or an opaque 5xx
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Log the detailed diagnostic server side; the client only sees `user_message`
    fn internal(user_message: &str, internal_error: &str) -> Self {
        error!("Internal error: {internal_error}");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: user_message.to_string(),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        if e.is_client_error() {
            debug!(error = %e, "Rejected query");
            Self {
                status: StatusCode::BAD_REQUEST,
                message: e.to_string(),
            }
        } else {
            Self::internal("The query could not be answered", &e.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                message: self.message,
            }),
        )
            .into_response()
    }
}

/// Run the web server
///
/// # Errors
///
/// Returns an error if the library or call provider cannot be loaded, the
/// tokio runtime cannot be created, or the server fails to start.
pub fn run(args: ServeArgs) -> anyhow::Result<()> {
    // Blocking HTTP clients must be built and dropped outside the runtime
    let library = load_library(&args.library, false)?;
    let provider = args.provider.build(&library.config().address)?;
    let state = Arc::new(AppState {
        library,
        provider,
        config: args.engine.config(),
    });

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_server(&args, Arc::clone(&state)))
}

/// Create the application router with all routes and middleware configured.
///
/// # Errors
///
/// Returns an error if the rate limiter configuration is rejected.
pub fn create_router(state: Arc<AppState>) -> anyhow::Result<Router> {
    // Configure IP-based rate limiting
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(10) // 10 requests per second per IP
        .burst_size(50) // Allow bursts of 50 requests
        .finish()
        .ok_or_else(|| anyhow::anyhow!("Invalid rate limit configuration"))?;

    let app = Router::new()
        .route("/api/library", get(library_handler))
        .route("/api/samples", get(samples_handler))
        .route("/api/resolve", post(resolve_handler))
        .route("/api/sequences", post(sequences_handler))
        .route("/api/around", post(around_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("x-content-type-options"),
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("x-frame-options"),
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("strict-transport-security"),
                    HeaderValue::from_static("max-age=31536000; includeSubDomains"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("referrer-policy"),
                    HeaderValue::from_static("no-referrer"),
                ))
                .layer(GovernorLayer {
                    config: Arc::new(governor_conf),
                })
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    REQUEST_TIMEOUT,
                ))
                // Each query holds a blocking worker while it assembles
                .layer(ConcurrencyLimitLayer::new(32))
                .layer(DefaultBodyLimit::max(MAX_BODY_SIZE)),
        );

    Ok(app)
}

async fn run_server(args: &ServeArgs, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state)?;

    let addr = format!("{}:{}", args.address, args.port);
    println!("Starting tile-library query server at http://{addr}");

    if args.open {
        let _ = open::that(format!("http://{addr}/api/library"));
    }

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Run a query on a blocking worker; providers and assembly are synchronous
async fn run_query<T, F>(state: Arc<AppState>, query: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&QueryEngine<'_, SharedProvider>) -> Result<T, QueryError> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(move || {
        let engine = QueryEngine::new(&state.library, state.provider.as_ref(), state.config);
        query(&engine)
    })
    .await
    .map_err(|e| ApiError::internal("The query could not be answered", &e.to_string()))?;

    Ok(result?)
}

/// Settings and contents of the loaded library
async fn library_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let library = &state.library;
    let assemblies: Vec<String> = library.assemblies().iter().map(ToString::to_string).collect();
    Json(serde_json::json!({
        "tag_length": library.tag_length(),
        "address": library.config().address,
        "path_version": library.path_version(),
        "tile_variants": library.len(),
        "loci": library.num_loci(),
        "assemblies": assemblies,
        "paths": library.populated_paths(),
    }))
}

async fn samples_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let samples = run_query(state, |engine| engine.samples()).await?;
    Ok(Json(serde_json::json!({ "samples": samples })))
}

async fn resolve_handler(
    State(state): State<Arc<AppState>>,
    Json(query): Json<RangeQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let address = state.library.config().address;
    let range = run_query(state, move |engine| engine.resolve(&query)).await?;

    let positions: Vec<_> = range
        .loci
        .iter()
        .map(|locus| {
            serde_json::json!({
                "position": format_position(locus.position, &address),
                "begin": locus.begin,
                "end": locus.end,
            })
        })
        .collect();
    Ok(Json(serde_json::json!({
        "assembly": range.assembly,
        "chromosome": range.chromosome,
        "low": range.low,
        "high": range.high,
        "positions": positions,
    })))
}

/// Both haplotypes of each requested sample over a base range
async fn sequences_handler(
    State(state): State<Arc<AppState>>,
    Json(query): Json<RangeQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = query.clone();
    let sequences = run_query(state, move |engine| engine.sequences_in_range(&request)).await?;
    Ok(Json(serde_json::json!({
        "assembly": query.assembly,
        "chromosome": query.chromosome,
        "low": query.low,
        "high": query.high,
        "indexing": query.indexing,
        "sequences": sequences,
    })))
}

/// Bases either side of a target base, per haplotype
async fn around_handler(
    State(state): State<Arc<AppState>>,
    Json(query): Json<AroundQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = query.clone();
    let sequences = run_query(state, move |engine| engine.sequences_around(&request)).await?;
    Ok(Json(serde_json::json!({
        "assembly": query.assembly,
        "chromosome": query.chromosome,
        "target": query.target,
        "number_around": query.number_around,
        "indexing": query.indexing,
        "sequences": sequences,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Assembly, Phase, SampleId};
    use crate::query::{AssemblyError, ResolveError};

    #[test]
    fn test_client_errors_map_to_bad_request() {
        let e = QueryError::Resolve(ResolveError::UnsupportedLiftover {
            from: Assembly::Grch37,
            to: Assembly::Grch38,
        });
        let api: ApiError = e.into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert!(api.message.contains("GRCh38"));
    }

    #[test]
    fn test_internal_errors_are_opaque() {
        let e = QueryError::Assembly(AssemblyError::UnknownToken {
            sample: SampleId::new("hu001"),
            phase: Phase::A,
            call: "2c5.00.0001.0ff".to_string(),
        });
        let api: ApiError = e.into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api.message.contains("2c5"));
    }
}
