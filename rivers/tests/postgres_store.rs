#![cfg(feature = "test-utils")]

use config::shared::{PgConnectionConfig, TlsConfig};
use postgres::schema::TableName;
use postgres::sqlx::test_utils::{create_pg_database, drop_pg_database};
use rivers::pipeline::{PipelineContext, run_pipeline};
use rivers::store::RiverStore;
use rivers::store::postgres::PostgresRiverStore;
use rivers::test_utils::test_merge_config;
use secrecy::SecretString;
use sqlx::PgPool;
use telemetry::tracing::init_test_tracing;
use uuid::Uuid;

/// Builds the connection settings of a fresh, uniquely named test database.
///
/// Reads `TESTS_DATABASE_HOST`, `TESTS_DATABASE_PORT`, `TESTS_DATABASE_USERNAME`
/// and optionally `TESTS_DATABASE_PASSWORD`.
fn local_pg_connection_config() -> PgConnectionConfig {
    PgConnectionConfig {
        host: std::env::var("TESTS_DATABASE_HOST").expect("TESTS_DATABASE_HOST must be set"),
        port: std::env::var("TESTS_DATABASE_PORT")
            .expect("TESTS_DATABASE_PORT must be set")
            .parse()
            .expect("TESTS_DATABASE_PORT must be a valid port number"),
        name: Uuid::new_v4().to_string(),
        username: std::env::var("TESTS_DATABASE_USERNAME")
            .expect("TESTS_DATABASE_USERNAME must be set"),
        password: std::env::var("TESTS_DATABASE_PASSWORD")
            .ok()
            .map(SecretString::new),
        tls: TlsConfig::default(),
    }
}

async fn create_source_table(pool: &PgPool) {
    sqlx::query(
        r#"
        create table rivers (
            gnis_id text,
            name text,
            huc8 text,
            strahler smallint,
            geometry geometry
        );"#,
    )
    .execute(pool)
    .await
    .unwrap();

    sqlx::query(
        r#"
        insert into rivers(gnis_id, name, huc8, strahler, geometry) values
            ('756422', 'Missouri River', '10300101', 5, 'LINESTRING(0 0, 1 0)'),
            ('756422', 'Missouri River', '10300102', 5, 'LINESTRING(1 0, 2 0)'),
            ('756422', 'Missouri River', '10300103', 3, 'LINESTRING(10 0, 11 0)'),
            (null, null, '10300101', 2, 'LINESTRING(-96.1 41.2, -96 41.3, -95.9 41.3)');"#,
    )
    .execute(pool)
    .await
    .unwrap();
}

fn store(pool: PgPool) -> PostgresRiverStore {
    PostgresRiverStore::new(
        pool,
        "rivers".parse::<TableName>().unwrap(),
        "merged_rivers".parse::<TableName>().unwrap(),
    )
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a PostGIS server configured through TESTS_DATABASE_* variables"]
async fn merges_rivers_in_postgis() {
    init_test_tracing();

    let config = local_pg_connection_config();
    let pool = create_pg_database(&config).await;
    create_source_table(&pool).await;

    let ctx = PipelineContext::new(store(pool.clone()), test_merge_config());
    let summary = run_pipeline(&ctx).await.unwrap();

    assert_eq!(summary.identity.rows_inserted, 2);
    assert_eq!(summary.fallback.rows_inserted, 1);
    assert!(summary.finalized);

    let fused: String = sqlx::query_scalar(
        "select ST_AsText(geometry) from merged_rivers where gnis_id = '756422' and strahler = 5;",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(fused, "LINESTRING(0 0,1 0,2 0)");

    let huc8: String = sqlx::query_scalar(
        "select huc8 from merged_rivers where gnis_id = '756422' and strahler = 5;",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(huc8, "10300101");

    let fallback_rows: i64 = sqlx::query_scalar(
        "select count(*) from merged_rivers where gnis_id is null and huc8 = '10300101';",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(fallback_rows, 1);

    let indexes: i64 = sqlx::query_scalar(
        "select count(*) from pg_indexes where tablename = 'merged_rivers';",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(indexes, 2);

    pool.close().await;
    drop_pg_database(&config).await;
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a PostGIS server configured through TESTS_DATABASE_* variables"]
async fn recreating_the_destination_discards_previous_rows() {
    init_test_tracing();

    let config = local_pg_connection_config();
    let pool = create_pg_database(&config).await;
    create_source_table(&pool).await;
    let store = store(pool.clone());

    store.recreate_destination().await.unwrap();
    assert_eq!(store.insert_identity_group("756422").await.unwrap(), 2);
    assert_eq!(store.identity_keys().await.unwrap(), vec!["756422".to_owned()]);
    assert_eq!(
        store.fallback_watershed_codes().await.unwrap(),
        vec!["10300101".to_owned()]
    );

    store.recreate_destination().await.unwrap();
    let rows: i64 = sqlx::query_scalar("select count(*) from merged_rivers;")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 0);

    pool.close().await;
    drop_pg_database(&config).await;
}
