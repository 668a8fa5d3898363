//! Explicit per-database PostgreSQL session.

use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use tokio::time::timeout;
use tracing::debug;

use super::IngestError;
use crate::config::DatabaseParams;

/// An open connection to one PostgreSQL database.
///
/// Sessions are not pooled: each [`RelationalIngestor::connect`] call opens a
/// new connection, and dropping the session closes it.
///
/// [`RelationalIngestor::connect`]: super::RelationalIngestor::connect
#[derive(Debug)]
pub struct PgSession {
    conn: PgConnection,
    database: String,
}

impl PgSession {
    /// Connect to `database` with the given server parameters.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::ConnectTimeout` if the connect timeout elapses,
    /// or `IngestError::Database` if the server refuses the connection.
    pub(crate) async fn open(params: &DatabaseParams, database: &str) -> Result<Self, IngestError> {
        let options = PgConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .username(&params.username)
            .password(params.password())
            .database(database);

        let conn = timeout(params.connect_timeout, PgConnection::connect_with(&options))
            .await
            .map_err(|_| IngestError::ConnectTimeout {
                host: params.host.clone(),
                port: params.port,
                database: database.to_string(),
                timeout: params.connect_timeout,
            })?
            .map_err(|e| IngestError::from_sqlx("connect", e))?;

        debug!(host = %params.host, port = params.port, database, "Connected");

        Ok(Self {
            conn,
            database: database.to_string(),
        })
    }

    /// Name of the database this session is connected to.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    pub(crate) fn connection(&mut self) -> &mut PgConnection {
        &mut self.conn
    }

    /// Close the connection gracefully.
    pub async fn close(self) -> Result<(), IngestError> {
        self.conn
            .close()
            .await
            .map_err(|e| IngestError::from_sqlx("close", e))
    }
}
