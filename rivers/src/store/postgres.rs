use config::shared::MergeConfig;
use postgres::schema::TableName;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Executor, PgPool};
use tracing::{debug, warn};

use crate::error::{ErrorKind, RiversResult, sqlx_error};
use crate::rivers_error;
use crate::store::base::RiverStore;

/// Inserts are never issued concurrently, the pipeline is the only writer.
const NUM_POOL_CONNECTIONS: u32 = 1;

/// [`RiverStore`] backed by a PostGIS database.
///
/// Source segments are read from a table with the NHDPlus column layout
/// (`gnis_id`, `name`, `huc8`, `strahler`, `geometry`) and the destination table
/// is created with the same columns. Statements run on the pool outside of any
/// explicit transaction, so each grouped insert is committed when it returns.
#[derive(Debug, Clone)]
pub struct PostgresRiverStore {
    pool: PgPool,
    source: TableName,
    destination: TableName,
}

impl PostgresRiverStore {
    /// Creates a store over an existing pool.
    pub fn new(pool: PgPool, source: TableName, destination: TableName) -> Self {
        Self {
            pool,
            source,
            destination,
        }
    }

    /// Connects to the database and resolves the tables named in `config`.
    pub async fn connect(
        options: PgConnectOptions,
        config: &MergeConfig,
    ) -> RiversResult<PostgresRiverStore> {
        let source = parse_table_name(&config.source_table)?;
        let destination = parse_table_name(&config.destination_table)?;

        let pool = PgPoolOptions::new()
            .max_connections(NUM_POOL_CONNECTIONS)
            .min_connections(NUM_POOL_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|err| {
                sqlx_error(
                    ErrorKind::SourceConnectionFailed,
                    "Failed to connect to the rivers database",
                    err,
                )
            })?;

        Ok(Self::new(pool, source, destination))
    }

    async fn execute_ddl(&self, sql: String, description: &'static str) -> RiversResult<()> {
        debug!(%sql, "executing statement");

        self.pool
            .execute(sql.as_str())
            .await
            .map_err(|err| sqlx_error(ErrorKind::DestinationQueryFailed, description, err))?;

        Ok(())
    }

    async fn insert_group(
        &self,
        sql: String,
        key: &str,
        description: &'static str,
    ) -> RiversResult<u64> {
        let result = sqlx::query(&sql)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|err| sqlx_error(ErrorKind::DestinationQueryFailed, description, err))?;

        Ok(result.rows_affected())
    }
}

fn parse_table_name(name: &str) -> RiversResult<TableName> {
    name.parse().map_err(|err| {
        rivers_error!(
            ErrorKind::InvalidTableName,
            "Configured table name is invalid",
            name,
            source: err
        )
    })
}

impl RiverStore for PostgresRiverStore {
    async fn recreate_destination(&self) -> RiversResult<()> {
        let destination = self.destination.as_quoted_identifier();

        self.execute_ddl(
            format!("drop table if exists {destination};"),
            "Failed to drop the merged rivers table",
        )
        .await?;
        self.execute_ddl(
            format!(
                r#"
                create table {destination} (
                    gnis_id text,
                    name text,
                    huc8 text,
                    strahler smallint,
                    geometry geometry
                );"#
            ),
            "Failed to create the merged rivers table",
        )
        .await
    }

    async fn identity_keys(&self) -> RiversResult<Vec<String>> {
        let sql = format!(
            "select distinct gnis_id from {} where gnis_id is not null;",
            self.source.as_quoted_identifier()
        );

        sqlx::query_scalar::<_, String>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| {
                sqlx_error(
                    ErrorKind::SourceQueryFailed,
                    "Failed to list identity keys",
                    err,
                )
            })
    }

    async fn fallback_watershed_codes(&self) -> RiversResult<Vec<String>> {
        let sql = format!(
            "select distinct huc8 from {} where gnis_id is null;",
            self.source.as_quoted_identifier()
        );

        let codes = sqlx::query_scalar::<_, Option<String>>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| {
                sqlx_error(
                    ErrorKind::SourceQueryFailed,
                    "Failed to list watershed codes",
                    err,
                )
            })?;

        let total = codes.len();
        let codes: Vec<String> = codes.into_iter().flatten().collect();
        if codes.len() != total {
            warn!(
                source = %self.source,
                "segments without gnis_id and without huc8 exist and will not be merged"
            );
        }

        Ok(codes)
    }

    async fn insert_identity_group(&self, identity_key: &str) -> RiversResult<u64> {
        let sql = format!(
            r#"
            insert into {}(gnis_id, name, strahler, huc8, geometry)
            select
                max(gnis_id) as gnis_id,
                max(name) as name,
                max(strahler) as strahler,
                min(huc8) as huc8,
                ST_LineMerge(ST_Union(geometry)) as geometry
            from {}
            where gnis_id = $1
            group by strahler;"#,
            self.destination.as_quoted_identifier(),
            self.source.as_quoted_identifier()
        );

        self.insert_group(sql, identity_key, "Failed to merge rivers by gnis_id")
            .await
    }

    async fn insert_fallback_group(&self, watershed_code: &str) -> RiversResult<u64> {
        let sql = format!(
            r#"
            insert into {}(gnis_id, name, strahler, huc8, geometry)
            select
                max(gnis_id) as gnis_id,
                max(name) as name,
                max(strahler) as strahler,
                max(huc8) as huc8,
                ST_LineMerge(ST_Union(geometry)) as geometry
            from {}
            where gnis_id is null and huc8 = $1
            group by strahler;"#,
            self.destination.as_quoted_identifier(),
            self.source.as_quoted_identifier()
        );

        self.insert_group(sql, watershed_code, "Failed to merge rivers by HUC8")
            .await
    }

    async fn create_indexes(&self) -> RiversResult<()> {
        let destination = self.destination.as_quoted_identifier();

        self.execute_ddl(
            format!(
                "create index {} on {destination} using gist(geometry);",
                self.destination.quoted_index_name("geometry_gist")
            ),
            "Failed to create the geometry index",
        )
        .await?;
        self.execute_ddl(
            format!(
                "create index {} on {destination}(strahler);",
                self.destination.quoted_index_name("strahler_idx")
            ),
            "Failed to create the strahler index",
        )
        .await
    }

    async fn refresh_statistics(&self) -> RiversResult<()> {
        // Runs on a pooled connection in autocommit mode, vacuum rejects transactions.
        self.execute_ddl(
            format!(
                "vacuum analyze {};",
                self.destination.as_quoted_identifier()
            ),
            "Failed to vacuum the merged rivers table",
        )
        .await
    }
}
