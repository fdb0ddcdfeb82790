//! Regression tracker server - main entry point.
//!
//! Starts the Actix-web server with configured routes and middleware.

use std::path::PathBuf;
use std::sync::Arc;

use actix_cors::Cors;
use actix_files::{Files, NamedFile};
use actix_web::http::header::{self, HeaderName};
use actix_web::{App, HttpRequest, HttpServer, Result as ActixResult, web};
use secrecy::ExposeSecret;
use tokio::sync::Semaphore;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use regtrack_lib::api::{self, ApiDoc};
use regtrack_lib::auth::{AdminKey, ParserToken, SessionSigner};
use regtrack_lib::config::Config;
use regtrack_lib::db::DbPool;
use regtrack_lib::middleware::RequestLogger;
use regtrack_lib::services::parser::ParserLauncher;
use regtrack_lib::services::storage::LogStore;
use regtrack_lib::services::watchdog::start_watchdog_task;

/// Body limit for JSON requests.
const JSON_PAYLOAD_LIMIT: usize = 32 * 1024 * 1024;

/// SPA fallback handler - serves index.html for client-side routing.
async fn spa_fallback(req: HttpRequest) -> ActixResult<NamedFile> {
    let static_dir = req
        .app_data::<web::Data<PathBuf>>()
        .ok_or_else(|| actix_web::error::ErrorNotFound("Static dir not configured"))?;
    Ok(NamedFile::open(static_dir.join("index.html"))?)
}

/// Health check for container HEALTHCHECK: configuration loads and the
/// database answers.
async fn health_check() -> bool {
    let Ok(config) = Config::from_env() else {
        return false;
    };
    match DbPool::new(&config).await {
        Ok(pool) => pool.connection().ping().await.is_ok(),
        Err(_) => false,
    }
}

fn io_error(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(e.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Check for --health-check flag (used by Docker HEALTHCHECK)
    if std::env::args().any(|arg| arg == "--health-check") {
        dotenvy::dotenv().ok();
        std::process::exit(if health_check().await { 0 } else { 1 });
    }

    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).map_err(io_error)?;

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV must be set to 'development' or 'production'");
            error!("  - In production, DATABASE_URL, REGTRACK_JWT_SECRET and REGTRACK_PARSER_TOKEN must be set");
            error!("  - In production, values must not match development defaults");
            std::process::exit(1);
        }
    };

    info!("========================================");
    info!("  Regression Tracker Server");
    info!("  Environment: {}", config.environment);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
        info!("Using development defaults for secrets that are not set");
    }

    // Upload root (absolute, since the parser may run in another directory)
    LogStore::new(&config.upload_dir)
        .ensure_root()
        .await
        .map_err(io_error)?;
    let upload_root = tokio::fs::canonicalize(&config.upload_dir).await?;
    let store = LogStore::new(upload_root);
    info!("Upload root: {}", store.root().display());

    // Database
    let pool = DbPool::new(&config).await.map_err(io_error)?;
    info!("Database connection established");
    pool.run_migrations().await.map_err(io_error)?;

    // Stuck-run watchdog
    start_watchdog_task(Arc::new(pool.clone()), config.watchdog.clone());

    // Shared state
    let bind_address = config.bind_address();
    let signer = SessionSigner::from_settings(&config.auth);
    let admin_key = AdminKey::new(config.auth.admin_key.clone());
    let parser_token = ParserToken::new(Some(
        config.parser.token.expose_secret().to_string(),
    ));
    let launcher = ParserLauncher::new(config.parser.clone(), pool.clone());
    let static_dir = config.static_dir.clone();
    let is_development = config.is_development();

    if !admin_key.0.is_set() {
        info!("Bootstrap admin key disabled");
    }

    // Limit concurrent uploads
    let upload_semaphore = Arc::new(Semaphore::new(config.max_concurrent_uploads));
    info!(
        "Upload limits: {} concurrent uploads; parser '{}' (timeout {}s)",
        config.max_concurrent_uploads, config.parser.program, config.parser.timeout_secs
    );

    if static_dir.is_some() {
        info!("Static file serving enabled from {:?}", static_dir);
    }

    let worker_count = if is_development {
        info!(
            "Starting server at http://{} (4 workers - development mode)",
            bind_address
        );
        4
    } else {
        let cpus = num_cpus::get();
        info!(
            "Starting server at http://{} ({} workers)",
            bind_address, cpus
        );
        cpus
    };

    let openapi = ApiDoc::openapi();

    // Start HTTP server
    let server = HttpServer::new(move || {
        let allowed_headers = vec![
            header::AUTHORIZATION,
            header::ACCEPT,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-admin-key"),
            HeaderName::from_static("x-parser-token"),
        ];

        let cors = if is_development {
            Cors::default()
                .allowed_origin("http://localhost:3000")
                .allowed_origin("http://127.0.0.1:3000")
                .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
                .allowed_headers(allowed_headers)
                .max_age(3600)
        } else {
            // Same-origin only in production
            Cors::default()
                .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
                .allowed_headers(allowed_headers)
                .max_age(3600)
        };

        let mut app = App::new()
            // CORS must wrap before other middleware
            .wrap(cors)
            .wrap(RequestLogger)
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(signer.clone()))
            .app_data(web::Data::new(admin_key.clone()))
            .app_data(web::Data::new(parser_token.clone()))
            .app_data(web::Data::new(launcher.clone()))
            .app_data(web::Data::new(upload_semaphore.clone()))
            // Parser result payloads carry one record per test
            .app_data(web::JsonConfig::default().limit(JSON_PAYLOAD_LIMIT))
            .service(
                SwaggerUi::new("/api/docs/{_:.*}").url("/api/openapi.json", openapi.clone()),
            )
            .service(web::scope("/api").configure(api::configure_routes));

        // Serve the frontend build when REGTRACK_STATIC_DIR is set
        if let Some(ref dir) = static_dir {
            app = app
                .app_data(web::Data::new(dir.clone()))
                .service(Files::new("/assets", dir.join("assets")).prefer_utf8(true))
                .default_service(web::route().to(spa_fallback));
        }

        app
    });

    server
        .workers(worker_count)
        .bind(&bind_address)?
        .run()
        .await
}
