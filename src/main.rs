use sqlx::postgres::PgPoolOptions;
use tracker_core::configuration::get_configuration;
use tracker_core::telemetry::get_subscriber;
use tracker_core::telemetry::init_subscriber;

/// This binary is deliberately thin: the HTTP/JSON API, OAuth layer, email
/// transport, and webhook delivery worker are all out of scope for this
/// crate (see `SPEC_FULL.md` §A). What's left to do at process start is
/// load configuration, wire up telemetry, and run migrations against a
/// fresh pool — everything else is a library call a host application makes.
#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let subscriber = get_subscriber("tracker-core", "info", std::io::stdout);
    init_subscriber(subscriber);

    let cfg = get_configuration()?;

    let pool = PgPoolOptions::new()
        .connect_with(cfg.database.connection())
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!("migrations applied, tracker-core ready to be embedded");

    Ok(())
}
