use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pharma_catalog::config::AppConfig;
use pharma_catalog::handlers::{catalog, ingredients, pdf_import};

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    tracing::info!("{} {} -> {}", method, uri, response.status());
    response
}

pub fn create_app(config: AppConfig) -> Router {
    let allowed_origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let catalog_routes = Router::new()
        .route("/", post(catalog::ingest_catalog).get(catalog::list_catalog))
        .route("/:id", get(catalog::get_drug))
        .route("/:id", put(catalog::update_drug))
        .route("/:id", delete(catalog::delete_drug));

    let ingredient_routes = Router::new()
        .route(
            "/",
            get(ingredients::list_ingredients).post(ingredients::add_ingredients),
        )
        .route("/top", get(ingredients::top_ingredients))
        .route("/search", get(ingredients::search_ingredients));

    let pdf_routes = Router::new()
        .route("/upload", post(pdf_import::upload_pdf))
        .route("/jobs/:id", get(pdf_import::get_job_status))
        .layer(DefaultBodyLimit::max(pdf_import::MAX_UPLOAD_BYTES));

    Router::new()
        .nest("/api/catalog", catalog_routes)
        .nest("/api/ingredients", ingredient_routes)
        .nest("/api/pdf", pdf_routes)
        .route("/health", get(|| async { "OK" }))
        .layer(axum::middleware::from_fn(log_request))
        .layer(cors)
        .with_state(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "pharma_catalog=info,tower_http=info,sqlx=warn".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().await?;
    let address = config.server_address();

    let app = create_app(config);

    tracing::info!("Pharma catalog server listening on http://{}", address);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
