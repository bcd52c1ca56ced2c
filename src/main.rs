use assessment_backend::{
    config::{get_config, init_config, LogFormat},
    database::{
        memory::MemoryStore,
        pg_attempt_store::PgAttemptStore,
        pg_question_bank::PgQuestionBank,
        pool::{create_pool, run_migrations},
        AttemptStore, QuestionBank,
    },
    routes,
    services::course_access::HttpCourseAccess,
    utils::time::SystemClock,
    AppState,
};
use axum::extract::DefaultBodyLimit;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("assessment_backend=info,tower_http=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_config()?;
    let config = get_config();
    init_tracing(config.log_format);

    let (bank, store): (Arc<dyn QuestionBank>, Arc<dyn AttemptStore>) =
        match &config.database_url {
            Some(url) => {
                let pool = create_pool(url).await?;
                run_migrations(&pool).await?;
                info!("Using Postgres storage");
                let bank: Arc<dyn QuestionBank> = Arc::new(PgQuestionBank::new(pool.clone()));
                let store: Arc<dyn AttemptStore> = Arc::new(PgAttemptStore::new(pool));
                (bank, store)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, attempts are kept in memory only");
                let memory = Arc::new(MemoryStore::new());
                let bank: Arc<dyn QuestionBank> = memory.clone();
                let store: Arc<dyn AttemptStore> = memory;
                (bank, store)
            }
        };

    let access = HttpCourseAccess::new(
        config.course_access_url.clone(),
        config.course_access_token.clone(),
    )?;
    if config.course_access_url.is_none() {
        tracing::warn!("COURSE_ACCESS_URL not set, every course access check will be refused");
    }

    let state = AppState::new(
        bank,
        store,
        Arc::new(access),
        Arc::new(SystemClock),
        &config.jwt_secret,
    );

    let app = routes::api_router(state, config.public_rps)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
