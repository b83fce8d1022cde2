use fake::faker::internet::en::Username;
use fake::Fake;
use once_cell::sync::Lazy;
use sqlx::Connection;
use sqlx::Executor;
use sqlx::PgConnection;
use sqlx::PgPool;
use tracker_core::configuration::get_configuration;
use tracker_core::configuration::DatabaseSettings;
use tracker_core::domain::AccessSet;
use tracker_core::domain::User;
use tracker_core::domain::Visibility;
use tracker_core::telemetry::get_subscriber;
use tracker_core::telemetry::init_subscriber;

/// Initialized once per test binary; opt in to verbose logging with
/// `TEST_LOG=true cargo test | bunyan`.
static TRACING: Lazy<()> = Lazy::new(|| match std::env::var("TEST_LOG") {
    Ok(_) => init_subscriber(get_subscriber("test", "debug", std::io::stdout)),
    Err(_) => init_subscriber(get_subscriber("test", "debug", std::io::sink)),
});

/// Creates a randomly named database and runs migrations against it, the
/// same per-test isolation scheme the teacher uses.
async fn configure_database(cfg: &DatabaseSettings) -> PgPool {
    let mut conn = PgConnection::connect_with(&cfg.without_db())
        .await
        .expect("postgres must be running");

    conn.execute(format!(r#"CREATE DATABASE "{}";"#, cfg.database_name).as_str())
        .await
        .unwrap();

    let pool = PgPool::connect_with(cfg.connection()).await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

pub async fn test_pool() -> PgPool {
    Lazy::force(&TRACING);

    let mut cfg = get_configuration().expect("failed to read configuration");
    cfg.database.database_name = uuid::Uuid::new_v4().to_string();

    configure_database(&cfg.database).await
}

/// Inserts a user row directly (OAuth provisioning is out of scope) and
/// returns the domain type the engine expects.
pub async fn insert_user(pool: &PgPool, username: &str) -> User {
    let r = sqlx::query!(
        r#"INSERT INTO users (username) VALUES ($1) RETURNING id, username, notify_self, created"#,
        username,
    )
    .fetch_one(pool)
    .await
    .unwrap();
    User {
        id: r.id,
        username: r.username,
        notify_self: r.notify_self,
        created: r.created,
    }
}

/// Inserts a user with a fake-generated username, for tests where the exact
/// value doesn't matter but collisions across runs must not happen.
pub async fn insert_random_user(pool: &PgPool) -> User {
    let username: String = Username().fake();
    insert_user(pool, &format!("{username}-{}", uuid::Uuid::new_v4())).await
}

pub async fn create_tracker(
    pool: &PgPool,
    owner: &User,
    name: &str,
) -> tracker_core::domain::Tracker {
    tracker_core::admin::create_tracker(pool, owner.id, name, Visibility::Public, AccessSet::all())
        .await
        .unwrap()
}
