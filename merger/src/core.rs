use std::str::FromStr;

use config::shared::{IntoConnectOptions, PgConnectionConfig};
use rivers::pipeline::{PipelineContext, run_pipeline};
use rivers::store::postgres::PostgresRiverStore;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use tracing::{info, warn};

use crate::config::load_merger_config;

/// Environment variable overriding the configured database endpoint.
const DATABASE_URL_ENV_NAME: &str = "DATABASE_URL";

pub async fn start_merger() -> anyhow::Result<()> {
    let config = load_merger_config()?;

    let database_url = std::env::var(DATABASE_URL_ENV_NAME).ok();
    let connect_options = resolve_connect_options(&config.database, database_url.as_deref())?;
    info!(
        host = connect_options.get_host(),
        port = connect_options.get_port(),
        database = connect_options.get_database(),
        "connecting to rivers database"
    );

    let store = PostgresRiverStore::connect(connect_options, &config.merge).await?;
    let ctx = PipelineContext::new(store, config.merge);

    let summary = run_pipeline(&ctx).await?;

    if summary.has_skipped_keys() {
        warn!(
            skipped_gnis_ids = ?summary.identity.skipped_keys,
            skipped_huc8s = ?summary.fallback.skipped_keys,
            "some rivers were not merged"
        );
    }

    Ok(())
}

/// Returns the connect options of `database_url` if set, of `config` otherwise.
///
/// `database_url` is either a `postgres://` URL or a libpq key/value string such
/// as `dbname=rivers`.
fn resolve_connect_options(
    config: &PgConnectionConfig,
    database_url: Option<&str>,
) -> anyhow::Result<PgConnectOptions> {
    match database_url {
        Some(url) if url.contains("://") => {
            let options = PgConnectOptions::from_str(url)
                .map_err(|err| anyhow::anyhow!("invalid {DATABASE_URL_ENV_NAME}: {err}"))?;
            Ok(options)
        }
        Some(conninfo) => parse_conninfo(conninfo),
        None => Ok(config.with_db()),
    }
}

/// Parses whitespace separated `key=value` pairs over the libpq defaults.
fn parse_conninfo(conninfo: &str) -> anyhow::Result<PgConnectOptions> {
    let mut options = PgConnectOptions::new();

    for pair in conninfo.split_whitespace() {
        let Some((key, value)) = pair.split_once('=') else {
            anyhow::bail!("invalid {DATABASE_URL_ENV_NAME}: expected key=value, got `{pair}`");
        };

        options = match key {
            "host" | "hostaddr" => options.host(value),
            "port" => {
                let port = value.parse::<u16>().map_err(|err| {
                    anyhow::anyhow!("invalid {DATABASE_URL_ENV_NAME}: bad port `{value}`: {err}")
                })?;
                options.port(port)
            }
            "dbname" => options.database(value),
            "user" => options.username(value),
            "password" => options.password(value),
            "sslmode" => {
                let mode = PgSslMode::from_str(value).map_err(|err| {
                    anyhow::anyhow!("invalid {DATABASE_URL_ENV_NAME}: bad sslmode `{value}`: {err}")
                })?;
                options.ssl_mode(mode)
            }
            "application_name" => options.application_name(value),
            _ => anyhow::bail!("invalid {DATABASE_URL_ENV_NAME}: unsupported key `{key}`"),
        };
    }

    Ok(options)
}
