//! JobBoard HTTP service
//!
//! Serves the account area (job postings, pictures, resumes), the public
//! listings and account sign-in.
//! Handles:
//! - Authentication
//! - Rate limiting
//! - Request routing
//! - Observability (logging, metrics)

mod handlers;
mod middleware;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{delete, get, post},
    Router,
};
use jobboard_common::{
    auth::JwtManager,
    config::AppConfig,
    db::DbPool,
    metrics::{self, LATENCY_BUCKETS, METRICS_PREFIX, UPLOAD_BUCKETS},
    uploads::UploadStore,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::{signal, sync::Notify};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use middleware::rate_limit::{rate_limit_middleware, RateLimit};

/// Multipart framing allowance on top of the picture size limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Application state shared across handlers
#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub uploads: UploadStore,
    pub jwt: Arc<JwtManager>,
    pub metrics: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    init_tracing(&config);

    info!("Starting JobBoard v{}", jobboard_common::VERSION);

    // Initialize metrics
    let metrics_handle = install_metrics()?;
    metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    if config.database.run_migrations {
        db.migrate().await?;
    }

    let uploads = UploadStore::new(&config.uploads);
    uploads.ensure_dirs().await?;

    let jwt = Arc::new(JwtManager::new(
        &config.auth.jwt_secret,
        config.auth.jwt_expiration_secs,
    ));

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        uploads,
        jwt,
        metrics: metrics_handle,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let draining = Arc::new(Notify::new());
    let server = axum::serve(listener, app).with_graceful_shutdown({
        let draining = draining.clone();
        async move {
            shutdown_signal().await;
            draining.notify_one();
        }
    });

    run_until_drained(server.into_future(), draining, config.shutdown_timeout()).await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn install_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_request_duration_seconds", METRICS_PREFIX)),
            LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_upload_duration_seconds", METRICS_PREFIX)),
            UPLOAD_BUCKETS,
        )?
        .install_recorder()?;

    Ok(handle)
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let upload_limit = DefaultBodyLimit::max(config.upload_limit_bytes() + MULTIPART_OVERHEAD);

    // Account area (bearer token required)
    let account_routes = Router::new()
        .route(
            "/jobs",
            get(handlers::jobs::index).post(handlers::jobs::store),
        )
        .route("/jobs/create", get(handlers::jobs::create))
        .route("/jobs/{id}/edit", get(handlers::jobs::edit))
        .route(
            "/jobs/{id}",
            axum::routing::put(handlers::jobs::update).delete(handlers::jobs::destroy),
        )
        .route(
            "/jobs/{id}/upload",
            post(handlers::uploads::post_upload).layer(upload_limit),
        )
        .route("/jobs/pictures/{id}", delete(handlers::uploads::delete_upload))
        .route("/resumes", get(handlers::resumes::index))
        .route("/resumes/{id}", delete(handlers::resumes::destroy))
        .route("/categories", post(handlers::categories::store));

    // Public listings
    let public_routes = Router::new()
        .route("/jobs", get(handlers::listings::index))
        .route("/jobs/category/{id}", get(handlers::listings::category))
        .route("/jobs/{slug}", get(handlers::listings::show))
        .route("/jobs/{slug}/resume", post(handlers::listings::post_resume))
        .route("/categories", get(handlers::categories::list));

    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/me", get(handlers::auth::me));

    let mut app = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/metrics", get(handlers::health::metrics))
        .nest("/account", account_routes)
        .nest("/auth", auth_routes)
        .merge(public_routes)
        .route_layer(axum::middleware::from_fn(
            middleware::metrics::track_requests,
        ))
        .nest_service("/uploads", ServeDir::new(state.uploads.root()));

    if config.rate_limit.enabled {
        app = app.layer(axum::middleware::from_fn_with_state(
            RateLimit::from_config(&config.rate_limit),
            rate_limit_middleware,
        ));
    }

    // Compose the app
    app.layer(ConcurrencyLimitLayer::new(config.server.max_concurrent_requests))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Drive `server` to completion, giving up `grace` after `draining` fires
async fn run_until_drained<F>(
    server: F,
    draining: Arc<Notify>,
    grace: Duration,
) -> std::io::Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    let deadline = async {
        draining.notified().await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => result,
        _ = deadline => {
            warn!(
                grace_secs = grace.as_secs(),
                "Shutdown timeout elapsed, dropping open connections"
            );
            Ok(())
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use http_body_util::BodyExt;
    use jobboard_common::{
        config::UploadConfig,
        db::models::{Job, JobResume},
    };
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
    use std::collections::BTreeMap;
    use tower::ServiceExt;

    /// State without a live database; only paths that stop before the
    /// repository can succeed.
    fn test_state(upload_root: &std::path::Path) -> AppState {
        state_with_db(upload_root, DatabaseConnection::Disconnected)
    }

    fn state_with_db(upload_root: &std::path::Path, conn: DatabaseConnection) -> AppState {
        let mut config = AppConfig::default();
        config.uploads = UploadConfig {
            root: upload_root.to_path_buf(),
            ..UploadConfig::default()
        };
        let config = Arc::new(config);

        AppState {
            uploads: UploadStore::new(&config.uploads),
            jwt: Arc::new(JwtManager::new(
                &config.auth.jwt_secret,
                config.auth.jwt_expiration_secs,
            )),
            db: DbPool {
                primary: conn,
                replica: None,
            },
            metrics: PrometheusBuilder::new().build_recorder().handle(),
            config,
        }
    }

    fn bearer(state: &AppState, user_id: i32) -> String {
        format!("Bearer {}", state.jwt.generate_token(user_id).unwrap())
    }

    fn json_request(method: Method, uri: &str, auth: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(test_state(dir.path()));

        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key("x-request-id"));

        let json = body_json(resp).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "jobboard");
    }

    #[tokio::test]
    async fn test_ready_without_database() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(test_state(dir.path()));

        let resp = app
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let json = body_json(resp).await;
        assert_eq!(json["status"], "not_ready");
        assert_eq!(json["checks"]["database"]["status"], "down");
        assert_eq!(json["checks"]["uploads"]["status"], "up");
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(test_state(dir.path()));

        let resp = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_account_requires_token() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(test_state(dir.path()));

        let resp = app
            .oneshot(Request::get("/account/jobs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let json = body_json(resp).await;
        assert_eq!(json["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_invalid_token_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(test_state(dir.path()));

        let req = json_request(
            Method::DELETE,
            "/account/resumes/1",
            Some("Bearer not-a-jwt"),
            "",
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_store_without_title_reports_field_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let token = bearer(&state, 7);
        let app = create_router(state);

        let req = json_request(
            Method::POST,
            "/account/jobs",
            Some(&token),
            r#"{"title":"  ","location":"Berlin","content":"Backend work","category":1}"#,
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let json = body_json(resp).await;
        let details = json["error"]["details"].as_array().unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0]["field"], "title");
        assert_eq!(details[0]["message"], "Please enter a title.");
    }

    #[tokio::test]
    async fn test_index_rejects_unknown_sort_column() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let token = bearer(&state, 7);
        let app = create_router(state);

        let req = json_request(
            Method::GET,
            "/account/jobs?sort_up=password_hash",
            Some(&token),
            "",
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let json = body_json(resp).await;
        assert_eq!(json["error"]["details"]["field"], "sort");
    }

    #[tokio::test]
    async fn test_short_resume_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let token = bearer(&state, 3);
        let app = create_router(state);

        let req = json_request(
            Method::POST,
            "/jobs/10.00.00-abc.html/resume",
            Some(&token),
            r#"{"content":"hi"}"#,
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let json = body_json(resp).await;
        assert_eq!(
            json["error"]["details"][0]["message"],
            "Resume must be at least 3 characters."
        );
    }

    #[tokio::test]
    async fn test_resume_requires_token() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(test_state(dir.path()));

        let req = json_request(
            Method::POST,
            "/jobs/10.00.00-abc.html/resume",
            None,
            r#"{"content":"I would like to apply"}"#,
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_validates_before_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(test_state(dir.path()));

        let req = json_request(
            Method::POST,
            "/auth/register",
            None,
            r#"{"email":"not-an-email","display_name":"Ada","password":"short"}"#,
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let json = body_json(resp).await;
        let details = json["error"]["details"].as_array().unwrap();
        assert_eq!(details[0]["field"], "email");
        assert_eq!(details[1]["field"], "password");
    }

    #[tokio::test]
    async fn test_category_form_validated() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let token = bearer(&state, 1);
        let app = create_router(state);

        let req = json_request(
            Method::POST,
            "/account/categories",
            Some(&token),
            r#"{"name":"","cat_status":"open"}"#,
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_uploaded_files_are_served() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        state.uploads.ensure_dirs().await.unwrap();
        std::fs::write(state.uploads.thumbnail_path("a.png"), b"png").unwrap();
        let app = create_router(state);

        let resp = app
            .oneshot(
                Request::get("/uploads/jobs_thumbnails/a.png")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    fn job_owned_by(user_id: i32) -> Job {
        let now = chrono::Utc::now().into();
        Job {
            id: 42,
            user_id,
            category_id: 1,
            title: "Line cook".to_string(),
            slug: "10.00.00-abc.html".to_string(),
            location: "Paris".to_string(),
            content: "Prep and service".to_string(),
            meta_title: String::new(),
            meta_description: String::new(),
            meta_keywords: String::new(),
            thumbnails: None,
            resume_count: 0,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn multipart_request(uri: &str, auth: &str, filename: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--BOUNDARY\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n--BOUNDARY--\r\n");

        Request::post(uri)
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=BOUNDARY")
            .header(header::AUTHORIZATION, auth)
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_edit_of_another_users_job_is_forbidden() {
        let dir = tempfile::tempdir().unwrap();
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![job_owned_by(1)]])
            .into_connection();
        let state = state_with_db(dir.path(), conn);
        let token = bearer(&state, 2);
        let app = create_router(state);

        let req = json_request(Method::GET, "/account/jobs/42/edit", Some(&token), "");
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let json = body_json(resp).await;
        assert_eq!(json["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_upload_to_another_users_job_is_forbidden() {
        let dir = tempfile::tempdir().unwrap();
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![job_owned_by(1)]])
            .into_connection();
        let state = state_with_db(dir.path(), conn);
        let token = bearer(&state, 2);
        let app = create_router(state);

        let req = multipart_request("/account/jobs/42/upload", &token, "a.png", b"\x89PNG");
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_upload_of_non_image_is_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![job_owned_by(2)]])
            .into_connection();
        let state = state_with_db(dir.path(), conn);
        state.uploads.ensure_dirs().await.unwrap();
        let token = bearer(&state, 2);
        let app = create_router(state);

        let req = multipart_request(
            "/account/jobs/42/upload",
            &token,
            "notes.txt",
            b"just some text",
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"The file must be an image.");
    }

    #[tokio::test]
    async fn test_post_resume_reports_new_count() {
        let dir = tempfile::tempdir().unwrap();
        let now = chrono::Utc::now().into();
        let resume = JobResume {
            id: 5,
            content: "I would like to apply".to_string(),
            job_id: 42,
            user_id: 3,
            created_at: now,
            updated_at: now,
        };
        let count: BTreeMap<&str, sea_orm::Value> =
            [("resume_count", 4i32.into())].into_iter().collect();
        // slug lookup, row lock, insert, count refresh
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![job_owned_by(1)], vec![job_owned_by(1)]])
            .append_query_results([vec![resume]])
            .append_query_results([vec![count]])
            .into_connection();
        let state = state_with_db(dir.path(), conn);
        let token = bearer(&state, 3);
        let app = create_router(state);

        let req = json_request(
            Method::POST,
            "/jobs/10.00.00-abc.html/resume",
            Some(&token),
            r#"{"content":"I would like to apply"}"#,
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let json = body_json(resp).await;
        assert_eq!(json["flash"]["level"], "success");
        assert_eq!(json["data"]["resume_count"], 4);
    }

    #[tokio::test]
    async fn test_shutdown_gives_up_after_grace() {
        let draining = Arc::new(Notify::new());
        draining.notify_one();

        let stuck = std::future::pending::<std::io::Result<()>>();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            run_until_drained(stuck, draining, Duration::from_millis(10)),
        )
        .await;
        assert!(matches!(result, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_server() {
        let draining = Arc::new(Notify::new());
        let server = async { Err(std::io::Error::other("closed")) };

        let result = run_until_drained(server, draining, Duration::from_secs(60)).await;
        assert!(result.is_err());
    }
}
