//! Connection settings for the object store and the PostgreSQL server.
//!
//! Both structs are plain values passed at construction time. Fields left
//! unset fall back to the client libraries' own defaults (for S3, the
//! standard AWS credential and region chain).

use std::fmt;
use std::time::Duration;

/// Default PostgreSQL port.
pub const DEFAULT_POSTGRES_PORT: u16 = 5432;

/// Database used for server-level statements such as `CREATE DATABASE`.
pub const DEFAULT_MAINTENANCE_DATABASE: &str = "postgres";

/// Default connect timeout for PostgreSQL sessions.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for an S3-compatible object store.
///
/// # Example
///
/// ```
/// use csvlake::ObjectStoreConfig;
/// use std::time::Duration;
///
/// let config = ObjectStoreConfig::new()
///     .with_endpoint("http://localhost:9000")
///     .with_region("eu-west-1")
///     .with_credentials("minio", "minio123")
///     .with_timeout(Duration::from_secs(10));
///
/// assert!(config.force_path_style);
/// ```
#[derive(Clone, Default)]
pub struct ObjectStoreConfig {
    /// Custom endpoint URL (MinIO, LocalStack, ...). `None` uses AWS.
    pub endpoint: Option<String>,
    /// Region for requests and bucket creation.
    pub region: Option<String>,
    /// Access key id. Used only together with `secret_key`.
    pub access_key: Option<String>,
    /// Secret access key.
    pub secret_key: Option<String>,
    /// Per-operation timeout.
    pub timeout: Option<Duration>,
    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`.
    pub force_path_style: bool,
}

impl ObjectStoreConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom endpoint. Path-style addressing is enabled as well, which
    /// is what self-hosted S3 implementations expect.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self.force_path_style = true;
        self
    }

    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    #[must_use]
    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_force_path_style(mut self, force_path_style: bool) -> Self {
        self.force_path_style = force_path_style;
        self
    }

    /// Explicit static credentials, if both halves are set.
    #[must_use]
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) => Some((access.as_str(), secret.as_str())),
            _ => None,
        }
    }

    /// Whether `CreateBucket` needs an explicit location constraint.
    ///
    /// `us-east-1` is the default location and rejects an explicit constraint.
    #[must_use]
    pub fn location_constraint(&self) -> Option<&str> {
        match self.region.as_deref() {
            None | Some("us-east-1") => None,
            Some(region) => Some(region),
        }
    }
}

impl fmt::Debug for ObjectStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("force_path_style", &self.force_path_style)
            .finish()
    }
}

/// Settings for a PostgreSQL server.
///
/// The database name is not part of these parameters: sessions are opened
/// against an explicit database (see `RelationalIngestor::connect`).
///
/// # Example
///
/// ```
/// use csvlake::DatabaseParams;
///
/// let params = DatabaseParams::new("localhost", "postgres", "password").with_port(5433);
/// assert_eq!(params.port, 5433);
/// assert_eq!(params.maintenance_database, "postgres");
/// ```
#[derive(Clone)]
pub struct DatabaseParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    password: String,
    /// Database used when creating other databases (default: `postgres`).
    pub maintenance_database: String,
    pub connect_timeout: Duration,
}

impl DatabaseParams {
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_POSTGRES_PORT,
            username: username.into(),
            password: password.into(),
            maintenance_database: DEFAULT_MAINTENANCE_DATABASE.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_maintenance_database(mut self, database: impl Into<String>) -> Self {
        self.maintenance_database = database.into();
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for DatabaseParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("maintenance_database", &self.maintenance_database)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}
