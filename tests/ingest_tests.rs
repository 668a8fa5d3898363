//! Integration tests for CSV ingestion into PostgreSQL.
//!
//! # Prerequisites
//!
//! A PostgreSQL server the test user may create databases on:
//!
//! ```bash
//! docker run -d --name postgres-test -p 5432:5432 \
//!   -e POSTGRES_PASSWORD=postgres postgres:16
//! ```
//!
//! # Running Tests
//!
//! All tests are marked with `#[ignore]` and skip themselves when `PGHOST`
//! is unset:
//!
//! ```bash
//! PGHOST=localhost PGUSER=postgres PGPASSWORD=postgres \
//!   cargo test --test ingest_tests -- --ignored
//! ```

mod common;

use std::path::Path;
use std::sync::Arc;

use arrow::array::{BinaryArray, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use common::{postgres_params, unique_name, write_file};
use csvlake::types::{qualified_name, quote_identifier};
use csvlake::{
    read_csv_file, CsvReadOptions, ErrorKind, ExistingDatabase, IngestOptions,
    InferredTableSchema, PgSession, RelationalIngestor, SqlType, Table,
};
use sqlx::{Connection, Executor, PgConnection};
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

fn ingestor() -> RelationalIngestor {
    RelationalIngestor::new(postgres_params())
}

/// Whether `schema.table` exists in the session's database.
async fn table_exists(
    ingestor: &RelationalIngestor,
    session: &mut PgSession,
    schema: &str,
    table: &str,
) -> bool {
    ingestor.count_rows(session, schema, table).await.is_ok()
}

/// Plain sqlx connection for checks the ingestor does not expose.
async fn raw_connection(database: &str) -> Result<PgConnection, sqlx::Error> {
    let params = postgres_params();
    let options = sqlx::postgres::PgConnectOptions::new()
        .host(&params.host)
        .port(params.port)
        .username(&params.username)
        .password(params.password())
        .database(database);
    PgConnection::connect_with(&options).await
}

/// Drop a test database, ignoring failures.
async fn cleanup_database(database: &str) {
    let Ok(mut conn) = raw_connection(&postgres_params().maintenance_database).await else {
        return;
    };

    let sql = format!(
        "DROP DATABASE IF EXISTS {} WITH (FORCE)",
        quote_identifier(database)
    );
    let _ = conn.execute(sql.as_str()).await;
    let _ = conn.close().await;
}

// ============================================================================
// Section 1: Table Creation
// ============================================================================

#[tokio::test]
#[ignore]
async fn test_load_creates_table_with_csv_columns() {
    skip_if_no_postgres!();

    let ingestor = ingestor();
    let database = unique_name("csvlake");
    let dir = TempDir::new().unwrap();
    let csv = write_file(
        dir.path(),
        "mixed_types.csv",
        "id,price,label,active,created\n\
         1,9.99,first,true,2024-01-01 00:00:00\n\
         2,0.5,second,false,2024-01-02 12:30:00\n",
    );

    let report = ingestor
        .load_csv_as_table(&database, "staging", &csv)
        .await
        .expect("load should succeed");

    assert_eq!(report.table, "mixed_types");
    assert_eq!(
        report.columns,
        vec![
            ("id".to_string(), SqlType::Integer),
            ("price".to_string(), SqlType::Float),
            ("label".to_string(), SqlType::Text),
            ("active".to_string(), SqlType::Boolean),
            ("created".to_string(), SqlType::Timestamp),
        ]
    );
    assert_eq!(report.verified_row_count, 2);

    cleanup_database(&database).await;
}

#[tokio::test]
#[ignore]
async fn test_unmapped_column_creates_no_table() {
    skip_if_no_postgres!();

    let ingestor = ingestor();
    let database = unique_name("csvlake");

    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, true),
        Field::new("payload", DataType::Binary, true),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(vec![1, 2])),
            Arc::new(BinaryArray::from_vec(vec![b"a".as_slice(), b"b".as_slice()])),
        ],
    )
    .unwrap();
    let data = Table::try_new(schema, vec![batch]).unwrap();

    let err = ingestor
        .load_table(&database, "staging", "blobs", &data)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Malformed);

    let mut session = ingestor.connect(&database).await.unwrap();
    assert!(!table_exists(&ingestor, &mut session, "staging", "blobs").await);
    session.close().await.unwrap();

    cleanup_database(&database).await;
}

#[tokio::test]
#[ignore]
async fn test_blank_column_loads_as_float_nulls() {
    skip_if_no_postgres!();

    let ingestor = ingestor();
    let database = unique_name("csvlake");
    let dir = TempDir::new().unwrap();
    let csv = write_file(
        dir.path(),
        "sparse.csv",
        "id,comment,score\n1,,2.5\n2,,3.5\n",
    );

    let report = ingestor
        .load_csv_as_table(&database, "staging", &csv)
        .await
        .expect("load should succeed");

    assert_eq!(report.columns[1], ("comment".to_string(), SqlType::Float));
    assert_eq!(report.verified_row_count, 2);

    let mut conn = raw_connection(&database).await.unwrap();
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {} IS NULL",
        qualified_name("staging", "sparse"),
        quote_identifier("comment")
    );
    let nulls: i64 = sqlx::query_scalar(&sql).fetch_one(&mut conn).await.unwrap();
    assert_eq!(nulls, 2);
    conn.close().await.unwrap();

    cleanup_database(&database).await;
}

#[tokio::test]
#[ignore]
async fn test_duplicate_headers_load_with_suffixes() {
    skip_if_no_postgres!();

    let ingestor = ingestor();
    let database = unique_name("csvlake");
    let dir = TempDir::new().unwrap();
    let csv = write_file(dir.path(), "repeated.csv", "a,b,a\n1,x,2\n");

    let report = ingestor
        .load_csv_as_table(&database, "staging", &csv)
        .await
        .expect("load should succeed");

    let names: Vec<&str> = report.columns.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "a.1"]);
    assert_eq!(report.verified_row_count, 1);

    cleanup_database(&database).await;
}

// ============================================================================
// Section 2: Row Counts
// ============================================================================

#[tokio::test]
#[ignore]
async fn test_row_count_matches_data_rows() {
    skip_if_no_postgres!();

    let ingestor = RelationalIngestor::new(postgres_params()).with_options(
        IngestOptions::new()
            .with_insert_batch_size(7)
            .with_existing_database(ExistingDatabase::Continue),
    );
    let database = unique_name("csvlake");
    let dir = TempDir::new().unwrap();

    let many: String = std::iter::once("n,s\n".to_string())
        .chain((0..250).map(|i| format!("{i},row{i}\n")))
        .collect();
    let cases = [
        ("zero_rows.csv", "n,s\n".to_string(), 0),
        ("one_row.csv", "n,s\n1,a\n".to_string(), 1),
        ("many_rows.csv", many, 250),
    ];

    for (name, contents, expected) in cases {
        let csv = write_file(dir.path(), name, &contents);
        let report = ingestor
            .load_csv_as_table(&database, "counts", &csv)
            .await
            .unwrap_or_else(|e| panic!("loading {name} failed: {e}"));

        assert_eq!(report.rows_inserted, expected as u64, "{name}");
        assert_eq!(report.verified_row_count, expected, "{name}");
    }

    cleanup_database(&database).await;
}

#[tokio::test]
#[ignore]
async fn test_failed_insert_rolls_back_all_rows() {
    skip_if_no_postgres!();

    let ingestor = ingestor().with_options(IngestOptions::new().with_insert_batch_size(1));
    let database = unique_name("csvlake");
    ingestor.create_database(&database).await.unwrap();

    let dir = TempDir::new().unwrap();
    // The last value does not fit a 32-bit INTEGER column.
    let csv = write_file(dir.path(), "overflow.csv", "n\n1\n2\n9999999999\n");
    let data = read_csv_file(&csv, &CsvReadOptions::default()).unwrap();
    let columns = InferredTableSchema::from_arrow_schema(&data.schema()).unwrap();

    let mut session = ingestor.connect(&database).await.unwrap();
    ingestor.create_schema(&mut session, "tx").await.unwrap();
    ingestor
        .create_table(&mut session, "tx", "overflow", &columns)
        .await
        .unwrap();

    let err = ingestor
        .insert_table(&mut session, "tx", "overflow", &data)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Malformed);
    assert_eq!(err.sqlstate(), Some("22003"));

    assert_eq!(
        ingestor.count_rows(&mut session, "tx", "overflow").await.unwrap(),
        0
    );
    session.close().await.unwrap();

    cleanup_database(&database).await;
}

// ============================================================================
// Section 3: Existing Databases
// ============================================================================

#[tokio::test]
#[ignore]
async fn test_existing_database_is_conflict_and_untouched() {
    skip_if_no_postgres!();

    let ingestor = ingestor();
    let database = unique_name("csvlake");
    let dir = TempDir::new().unwrap();
    let first = write_file(dir.path(), "first.csv", "id\n1\n2\n3\n");

    ingestor
        .load_csv_as_table(&database, "public", &first)
        .await
        .unwrap();

    let err = ingestor.create_database(&database).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.sqlstate(), Some("42P04"));

    let second = write_file(dir.path(), "second.csv", "id\n9\n");
    let err = ingestor
        .load_csv_as_table(&database, "public", &second)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let mut session = ingestor.connect(&database).await.unwrap();
    assert_eq!(
        ingestor.count_rows(&mut session, "public", "first").await.unwrap(),
        3
    );
    assert!(!table_exists(&ingestor, &mut session, "public", "second").await);
    session.close().await.unwrap();

    cleanup_database(&database).await;
}

#[tokio::test]
#[ignore]
async fn test_continue_policy_loads_into_existing_database() {
    skip_if_no_postgres!();

    let ingestor = ingestor().with_options(
        IngestOptions::new().with_existing_database(ExistingDatabase::Continue),
    );
    let database = unique_name("csvlake");
    ingestor.create_database(&database).await.unwrap();

    let dir = TempDir::new().unwrap();
    let csv = write_file(dir.path(), "later.csv", "id\n1\n");
    let report = ingestor
        .load_csv_as_table(&database, "public", &csv)
        .await
        .unwrap();
    assert_eq!(report.verified_row_count, 1);

    cleanup_database(&database).await;
}

// ============================================================================
// Section 4: Server Operations
// ============================================================================

#[tokio::test]
#[ignore]
async fn test_list_databases_includes_created() {
    skip_if_no_postgres!();

    let ingestor = ingestor();
    let database = unique_name("csvlake");
    ingestor.create_database(&database).await.unwrap();

    let mut session = ingestor
        .connect(&ingestor.params().maintenance_database)
        .await
        .unwrap();
    let databases = ingestor.list_databases(&mut session).await.unwrap();
    assert!(databases.contains(&database));
    assert!(databases.iter().any(|d| d == "postgres"));
    session.close().await.unwrap();

    cleanup_database(&database).await;
}

#[tokio::test]
#[ignore]
async fn test_connect_to_missing_database_is_not_found() {
    skip_if_no_postgres!();

    let err = ingestor()
        .connect(&unique_name("csvlake-missing"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
#[ignore]
fn test_blocking_load() {
    skip_if_no_postgres!();

    let ingestor = ingestor();
    let database = unique_name("csvlake");
    let dir = TempDir::new().unwrap();
    let csv = write_file(dir.path(), "blocking.csv", "a,b\nx,1\ny,2\n");

    let report = ingestor
        .blocking_load_csv_as_table(&database, "public", Path::new(&csv))
        .unwrap();
    assert_eq!(report.verified_row_count, 2);

    let mut session = ingestor.blocking_connect(&database).unwrap();
    assert_eq!(
        ingestor
            .blocking_count_rows(&mut session, "public", "blocking")
            .unwrap(),
        2
    );
    drop(session);

    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(cleanup_database(&database));
}
