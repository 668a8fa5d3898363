//! CSV-to-table loader.

use std::path::Path;

use serde::Serialize;
use sqlx::{Connection, Postgres, QueryBuilder};
use tracing::{debug, info, warn};

use super::session::PgSession;
use super::values::{batch_rows, rows_per_statement, SqlValue};
use super::{ExistingDatabase, IngestError, IngestOptions};
use crate::codec::read_csv_file;
use crate::config::DatabaseParams;
use crate::error::ErrorKind;
use crate::runtime::blocking_runtime;
use crate::table::Table;
use crate::types::{
    qualified_name, quote_identifier, table_name_from_path, InferredTableSchema, SqlType,
    TypeMapper,
};

/// Outcome of [`RelationalIngestor::load_csv_as_table`] and
/// [`RelationalIngestor::load_table`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub database: String,
    pub schema: String,
    pub table: String,
    /// Column names and destination types, in source order.
    pub columns: Vec<(String, SqlType)>,
    pub rows_inserted: u64,
    /// Result of `SELECT COUNT(*)` after the load.
    pub verified_row_count: i64,
}

/// Loads CSV files into PostgreSQL tables.
///
/// # Example
///
/// ```no_run
/// use csvlake::{DatabaseParams, RelationalIngestor};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), csvlake::IngestError> {
/// let params = DatabaseParams::new("localhost", "postgres", "password");
/// let ingestor = RelationalIngestor::new(params);
///
/// let report = ingestor
///     .load_csv_as_table("analytics", "raw", Path::new("data/orders.csv"))
///     .await?;
/// println!("{} rows in {}", report.verified_row_count, report.table);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RelationalIngestor {
    params: DatabaseParams,
    options: IngestOptions,
}

impl RelationalIngestor {
    #[must_use]
    pub fn new(params: DatabaseParams) -> Self {
        Self {
            params,
            options: IngestOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn params(&self) -> &DatabaseParams {
        &self.params
    }

    #[must_use]
    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// Open a session on `database`.
    pub async fn connect(&self, database: &str) -> Result<PgSession, IngestError> {
        PgSession::open(&self.params, database)
            .await
            .inspect_err(|e| warn!(database, kind = %e.kind(), error = %e, "Connection failed"))
    }

    /// Create a database through the maintenance database.
    ///
    /// # Errors
    ///
    /// Kind `Conflict` (SQLSTATE 42P04) if the database already exists.
    pub async fn create_database(&self, name: &str) -> Result<(), IngestError> {
        let mut session = self.connect(&self.params.maintenance_database).await?;

        let sql = format!("CREATE DATABASE {}", quote_identifier(name));
        let result = sqlx::raw_sql(&sql)
            .execute(session.connection())
            .await
            .map_err(|e| IngestError::from_sqlx("create_database", e));

        if let Err(e) = session.close().await {
            debug!(error = %e, "Closing maintenance session failed");
        }

        result.inspect_err(|e| warn!(database = name, kind = %e.kind(), error = %e, "Database creation failed"))?;
        info!(database = name, "Created database");
        Ok(())
    }

    /// Names of all databases on the server.
    pub async fn list_databases(&self, session: &mut PgSession) -> Result<Vec<String>, IngestError> {
        sqlx::query_scalar::<_, String>("SELECT datname FROM pg_database ORDER BY datname")
            .fetch_all(session.connection())
            .await
            .map_err(|e| IngestError::from_sqlx("list_databases", e))
            .inspect_err(|e| warn!(kind = %e.kind(), error = %e, "Listing databases failed"))
    }

    /// `CREATE SCHEMA IF NOT EXISTS`.
    pub async fn create_schema(&self, session: &mut PgSession, schema: &str) -> Result<(), IngestError> {
        let sql = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_identifier(schema));
        sqlx::raw_sql(&sql)
            .execute(session.connection())
            .await
            .map_err(|e| IngestError::from_sqlx("create_schema", e))
            .inspect_err(|e| warn!(schema, kind = %e.kind(), error = %e, "Schema creation failed"))?;
        debug!(database = session.database(), schema, "Schema ready");
        Ok(())
    }

    /// `CREATE TABLE IF NOT EXISTS` with one column per inferred column.
    pub async fn create_table(
        &self,
        session: &mut PgSession,
        schema: &str,
        table: &str,
        columns: &InferredTableSchema,
    ) -> Result<(), IngestError> {
        let ddl = columns.to_ddl(schema, table);
        sqlx::raw_sql(&ddl)
            .execute(session.connection())
            .await
            .map_err(|e| IngestError::from_sqlx("create_table", e))
            .inspect_err(|e| warn!(schema, table, kind = %e.kind(), error = %e, "Table creation failed"))?;
        info!(
            schema,
            table,
            columns = columns.columns.len(),
            "Created table"
        );
        Ok(())
    }

    /// Insert every row of `data` in source order, inside one transaction.
    ///
    /// Rows are grouped into multi-row `INSERT ... VALUES` statements of
    /// `insert_batch_size` rows. Any failure rolls back all rows inserted by
    /// this call.
    ///
    /// Returns the number of rows inserted.
    pub async fn insert_table(
        &self,
        session: &mut PgSession,
        schema: &str,
        table: &str,
        data: &Table,
    ) -> Result<u64, IngestError> {
        self.insert_rows(session, schema, table, data)
            .await
            .inspect_err(|e| warn!(schema, table, kind = %e.kind(), error = %e, "Insert failed, rolled back"))
    }

    async fn insert_rows(
        &self,
        session: &mut PgSession,
        schema: &str,
        table: &str,
        data: &Table,
    ) -> Result<u64, IngestError> {
        let data_schema = data.schema();
        let types = data_schema
            .fields()
            .iter()
            .map(|f| TypeMapper::arrow_to_sql(f.name(), f.data_type()))
            .collect::<Result<Vec<_>, _>>()?;
        let column_list = data_schema
            .fields()
            .iter()
            .map(|f| quote_identifier(f.name()))
            .collect::<Vec<_>>()
            .join(", ");
        let insert_prefix = format!(
            "INSERT INTO {} ({}) ",
            qualified_name(schema, table),
            column_list
        );
        let chunk_rows = rows_per_statement(self.options.insert_batch_size, types.len());
        let interval = self.options.progress_interval;

        let mut tx = session
            .connection()
            .begin()
            .await
            .map_err(|e| IngestError::from_sqlx("begin", e))?;

        let mut inserted: u64 = 0;
        for batch in data.batches() {
            let mut rows = batch_rows(batch, &types)?.into_iter().peekable();

            while rows.peek().is_some() {
                let chunk: Vec<Vec<SqlValue>> = rows.by_ref().take(chunk_rows).collect();
                let count = chunk.len() as u64;

                let mut builder = QueryBuilder::<Postgres>::new(&insert_prefix);
                builder.push_values(chunk, |mut tuple, row| {
                    for value in row {
                        value.push_bind_to(&mut tuple);
                    }
                });
                builder
                    .build()
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| IngestError::from_sqlx("insert", e))?;

                let before = inserted;
                inserted += count;
                if interval > 0 && inserted / interval > before / interval {
                    info!(schema, table, rows = inserted, "Insert progress");
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| IngestError::from_sqlx("commit", e))?;

        debug!(schema, table, rows = inserted, "Committed inserts");
        Ok(inserted)
    }

    /// `SELECT COUNT(*)` on a table.
    pub async fn count_rows(
        &self,
        session: &mut PgSession,
        schema: &str,
        table: &str,
    ) -> Result<i64, IngestError> {
        let sql = format!("SELECT COUNT(*) FROM {}", qualified_name(schema, table));
        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(session.connection())
            .await
            .map_err(|e| IngestError::from_sqlx("count_rows", e))
            .inspect_err(|e| warn!(schema, table, kind = %e.kind(), error = %e, "Row count failed"))
    }

    /// Load one CSV file into `database.schema.<file stem>`.
    ///
    /// Creates the database, the schema and the table, inserts all rows in
    /// one transaction and verifies the row count.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the database exists and the policy is
    ///   [`ExistingDatabase::Abort`]; nothing is written in that case
    /// - `Malformed` if the CSV cannot be parsed (checked before anything is
    ///   created) or a column's inferred type has no mapping (no table is
    ///   created)
    /// - any error from the individual steps
    pub async fn load_csv_as_table(
        &self,
        database: &str,
        schema: &str,
        csv_path: &Path,
    ) -> Result<IngestReport, IngestError> {
        self.run_load(database, schema, csv_path)
            .await
            .inspect_err(|e| {
                warn!(
                    database,
                    schema,
                    path = %csv_path.display(),
                    kind = %e.kind(),
                    error = %e,
                    "CSV load failed"
                )
            })
    }

    async fn run_load(
        &self,
        database: &str,
        schema: &str,
        csv_path: &Path,
    ) -> Result<IngestReport, IngestError> {
        let table = table_name_from_path(csv_path)
            .ok_or_else(|| IngestError::InvalidTableName(csv_path.to_path_buf()))?;

        let data = read_csv_file(csv_path, &self.options.csv_options)?;
        info!(
            path = %csv_path.display(),
            rows = data.num_rows(),
            columns = data.num_columns(),
            "Read CSV"
        );

        self.load_table(database, schema, &table, &data).await
    }

    /// Load an in-memory table into `database.schema.table`.
    ///
    /// Same steps as [`load_csv_as_table`](Self::load_csv_as_table) once the
    /// CSV has been read: create the database, connect, create the schema,
    /// map the column types, create the table, insert and verify.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the database exists and the policy is
    ///   [`ExistingDatabase::Abort`]
    /// - `Malformed` if a column type has no mapping; no table is created
    pub async fn load_table(
        &self,
        database: &str,
        schema: &str,
        table: &str,
        data: &Table,
    ) -> Result<IngestReport, IngestError> {
        match self.create_database(database).await {
            Ok(()) => {}
            Err(e)
                if e.kind() == ErrorKind::Conflict
                    && self.options.existing_database == ExistingDatabase::Continue =>
            {
                info!(database, "Database exists, loading into it");
            }
            Err(e) => return Err(e),
        }

        let mut session = self.connect(database).await?;
        self.create_schema(&mut session, schema).await?;

        let columns = InferredTableSchema::from_arrow_schema(&data.schema()).inspect_err(|e| {
            warn!(database, schema, table, error = %e, "Unmapped column type")
        })?;

        self.create_table(&mut session, schema, table, &columns).await?;
        let rows_inserted = self.insert_table(&mut session, schema, table, data).await?;
        let verified_row_count = self.count_rows(&mut session, schema, table).await?;

        if let Err(e) = session.close().await {
            debug!(error = %e, "Closing session failed");
        }

        info!(
            database,
            schema,
            table,
            rows = verified_row_count,
            "Loaded table"
        );

        Ok(IngestReport {
            database: database.to_string(),
            schema: schema.to_string(),
            table: table.to_string(),
            columns: columns
                .columns
                .into_iter()
                .map(|c| (c.name, c.sql_type))
                .collect(),
            rows_inserted,
            verified_row_count,
        })
    }

    // ========================================================================
    // Blocking wrappers
    // ========================================================================

    /// Blocking variant of [`load_csv_as_table`](Self::load_csv_as_table).
    ///
    /// Must not be called from within an async runtime.
    pub fn blocking_load_csv_as_table(
        &self,
        database: &str,
        schema: &str,
        csv_path: &Path,
    ) -> Result<IngestReport, IngestError> {
        blocking_runtime().block_on(self.load_csv_as_table(database, schema, csv_path))
    }

    pub fn blocking_load_table(
        &self,
        database: &str,
        schema: &str,
        table: &str,
        data: &Table,
    ) -> Result<IngestReport, IngestError> {
        blocking_runtime().block_on(self.load_table(database, schema, table, data))
    }

    pub fn blocking_connect(&self, database: &str) -> Result<PgSession, IngestError> {
        blocking_runtime().block_on(self.connect(database))
    }

    pub fn blocking_create_database(&self, name: &str) -> Result<(), IngestError> {
        blocking_runtime().block_on(self.create_database(name))
    }

    pub fn blocking_list_databases(
        &self,
        session: &mut PgSession,
    ) -> Result<Vec<String>, IngestError> {
        blocking_runtime().block_on(self.list_databases(session))
    }

    pub fn blocking_create_schema(
        &self,
        session: &mut PgSession,
        schema: &str,
    ) -> Result<(), IngestError> {
        blocking_runtime().block_on(self.create_schema(session, schema))
    }

    pub fn blocking_create_table(
        &self,
        session: &mut PgSession,
        schema: &str,
        table: &str,
        columns: &InferredTableSchema,
    ) -> Result<(), IngestError> {
        blocking_runtime().block_on(self.create_table(session, schema, table, columns))
    }

    pub fn blocking_insert_table(
        &self,
        session: &mut PgSession,
        schema: &str,
        table: &str,
        data: &Table,
    ) -> Result<u64, IngestError> {
        blocking_runtime().block_on(self.insert_table(session, schema, table, data))
    }

    pub fn blocking_count_rows(
        &self,
        session: &mut PgSession,
        schema: &str,
        table: &str,
    ) -> Result<i64, IngestError> {
        blocking_runtime().block_on(self.count_rows(session, schema, table))
    }
}
