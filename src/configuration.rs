//! Engine configuration, loaded the same way the teacher app loads
//! `configuration.yaml`: a base file plus an environment-specific overlay,
//! merged by the `config` crate and deserialized into strongly typed structs.

use config::Config;
use config::ConfigError;
use config::FileFormat;
use secrecy::ExposeSecret;
use secrecy::Secret;
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::PgConnectOptions;
use sqlx::postgres::PgSslMode;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    /// This service's own external URL. Embedded in mention URLs (§4.3/§6)
    /// and in export/import signature canonicalization (§4.7).
    pub origin: String,
    /// Authority used to construct posting-domain addresses for inbound
    /// comment-by-email routing (§4.5 Reply-To, §6).
    pub posting_domain: String,
    /// Envelope `From` address used for outbound notification email (§4.5).
    pub notify_from: String,
    /// Envelope `Sender` header (§4.5 email envelope contract).
    pub smtp_user: String,
    /// Broker URL for the webhook delivery worker. Opaque to the engine —
    /// only used to tag enqueued rows with a destination class.
    pub webhooks_broker: String,
    pub oauth_client_id: String,
    pub oauth_client_secret: Secret<String>,
    /// HMAC key backing the detached signatures used by export/import
    /// (§4.7). Not named in the distilled config table because the
    /// distillation treats signing as an implementation detail of export;
    /// it is still a secret the host process must provision.
    pub signing_key: Secret<String>,
    /// Whether admin edits to tracker metadata bump `tracker.updated`.
    /// Resolves the open question in `spec.md` §9 by making the behavior a
    /// config flag rather than guessing; see DESIGN.md.
    pub admin_edits_touch_tracker_updated: bool,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub require_ssl: bool,
}

impl DatabaseSettings {
    /// Connection options without a database selected, for provisioning /
    /// `CREATE DATABASE` in test setup.
    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };
        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(self.password.expose_secret())
            .port(self.port)
            .ssl_mode(ssl_mode)
    }

    pub fn connection(&self) -> PgConnectOptions {
        self.without_db().database(&self.database_name)
    }

    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username,
            self.password.expose_secret(),
            self.host,
            self.port,
            self.database_name,
        )
    }
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{other} is not a supported environment; use `local` or `production`"
            )),
        }
    }
}

/// Loads `configuration/base.yaml`, then layers
/// `configuration/{APP_ENVIRONMENT}.yaml` on top, then `TRACKER_` prefixed
/// environment variables, same precedence order as the teacher app.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .expect("Failed to parse APP_ENVIRONMENT");
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = Config::builder()
        .add_source(config::File::new(
            configuration_directory.join("base.yaml").to_str().unwrap(),
            FileFormat::Yaml,
        ))
        .add_source(config::File::new(
            configuration_directory
                .join(environment_filename)
                .to_str()
                .unwrap(),
            FileFormat::Yaml,
        ))
        .add_source(
            config::Environment::with_prefix("TRACKER")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize()
}
