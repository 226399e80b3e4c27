use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use common::{cache, database};
use hub::{AppState, coordinator, jwt, mailer, oauth, routes, verification};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting hub service");

    // Initialize database connection pool
    let db_config = database::DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    // Check database connectivity
    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    // Apply schema migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Initialize Redis connection pool
    let redis_config = cache::RedisConfig::from_env()?;
    let redis_pool = cache::RedisPool::new(&redis_config).await?;

    // Initialize JWT service
    let jwt_config = jwt::JwtConfig::from_env()?;
    let jwt_service = jwt::JwtService::new(jwt_config);

    let mailer = mailer::Mailer::new(mailer::MailerConfig::from_env()?);
    let oauth = oauth::OAuthRegistry::from_env()?;
    let verification = verification::VerificationStore::new(redis_pool.clone());
    let coordinator = coordinator::Coordinator::new(pool.clone());

    let app_state = AppState {
        db_pool: pool,
        redis_pool,
        jwt_service,
        coordinator,
        verification,
        mailer,
        oauth,
    };

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    info!("Hub service listening on 0.0.0.0:3000");

    axum::serve(listener, app).await?;

    Ok(())
}
