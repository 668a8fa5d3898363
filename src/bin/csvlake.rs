//! Command-line front end for csvlake.
//!
//! Connection settings come from flags or the usual environment variables
//! (`AWS_*`, `PG*`). Set `RUST_LOG` to change log verbosity (default: info).

use std::path::PathBuf;
use std::time::Duration;

use arrow::util::pretty::pretty_format_batches;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use csvlake::{
    object_key_for, DatabaseParams, ExistingDatabase, IngestOptions, ObjectStoreConfig,
    ObjectStoreGateway, ParquetCompression, ParquetOptions, RelationalIngestor, Table,
};

#[derive(Parser, Debug)]
#[command(name = "csvlake")]
#[command(version, about = "Load CSV files into S3 as Parquet or into PostgreSQL tables")]
struct Cli {
    #[command(flatten)]
    s3: S3Args,

    #[command(flatten)]
    pg: PgArgs,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct S3Args {
    /// Custom S3 endpoint (MinIO, LocalStack, ...)
    #[arg(long, global = true, env = "CSVLAKE_S3_ENDPOINT")]
    endpoint: Option<String>,

    #[arg(long, global = true, env = "AWS_REGION")]
    region: Option<String>,

    #[arg(long, global = true, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    access_key: Option<String>,

    #[arg(long, global = true, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Parquet compression for uploads (none, snappy, gzip, lz4, zstd)
    #[arg(long, global = true, default_value = "snappy")]
    compression: ParquetCompression,
}

#[derive(Args, Debug)]
struct PgArgs {
    #[arg(long = "pg-host", global = true, env = "PGHOST", default_value = "localhost")]
    host: String,

    #[arg(long = "pg-port", global = true, env = "PGPORT", default_value = "5432")]
    port: u16,

    #[arg(long = "pg-user", global = true, env = "PGUSER", default_value = "postgres")]
    user: String,

    #[arg(
        long = "pg-password",
        global = true,
        env = "PGPASSWORD",
        hide_env_values = true,
        default_value = ""
    )]
    password: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a bucket
    CreateBucket { bucket: String },

    /// List buckets
    Buckets,

    /// Upload one CSV file as a Parquet object
    Upload {
        bucket: String,
        file: PathBuf,
        /// Object key (default: <prefix>/<file stem>.parquet)
        #[arg(long)]
        key: Option<String>,
        #[arg(long, default_value = "")]
        prefix: String,
    },

    /// Upload every *.csv file in a directory as Parquet objects
    UploadDir {
        bucket: String,
        dir: PathBuf,
        #[arg(long, default_value = "")]
        prefix: String,
    },

    /// List object keys under a prefix
    Ls {
        bucket: String,
        #[arg(default_value = "")]
        prefix: String,
    },

    /// Show object keys under a prefix as a table
    Keys {
        bucket: String,
        #[arg(default_value = "")]
        prefix: String,
    },

    /// Download a Parquet object and print its first rows
    Read {
        bucket: String,
        key: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Load a CSV file into <database>.<schema>.<file stem>
    LoadTable {
        database: String,
        schema: String,
        file: PathBuf,
        /// Rows per INSERT statement
        #[arg(long, default_value_t = 1000)]
        batch_size: usize,
        /// Load into the database even if it already exists
        #[arg(long)]
        continue_existing: bool,
    },

    /// List databases on the PostgreSQL server
    Databases,
}

impl S3Args {
    fn config(&self) -> ObjectStoreConfig {
        let mut config = ObjectStoreConfig::new();
        if let Some(endpoint) = &self.endpoint {
            config = config.with_endpoint(endpoint);
        }
        if let Some(region) = &self.region {
            config = config.with_region(region);
        }
        if let (Some(access), Some(secret)) = (&self.access_key, &self.secret_key) {
            config = config.with_credentials(access, secret);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config
    }
}

impl PgArgs {
    fn params(&self) -> DatabaseParams {
        DatabaseParams::new(&self.host, &self.user, &self.password).with_port(self.port)
    }
}

fn print_report<T: Serialize>(
    json: bool,
    report: &T,
    text: impl FnOnce(&T),
) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        text(report);
    }
    Ok(())
}

fn print_table(table: &Table, limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let batch = table.to_record_batch()?;
    let shown = batch.slice(0, limit.min(batch.num_rows()));
    println!("{}", pretty_format_batches(&[shown])?);
    if table.num_rows() > limit {
        println!("({} of {} rows shown)", limit, table.num_rows());
    }
    Ok(())
}

async fn gateway(s3: &S3Args) -> ObjectStoreGateway {
    ObjectStoreGateway::connect(&s3.config())
        .await
        .with_parquet_options(ParquetOptions::new().with_compression(s3.compression))
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::CreateBucket { bucket } => {
            gateway(&cli.s3).await.create_bucket(&bucket).await?;
            println!("Created bucket {bucket}");
        }
        Command::Buckets => {
            let buckets = gateway(&cli.s3).await.list_buckets().await?;
            print_report(cli.json, &buckets, |b| b.iter().for_each(|name| println!("{name}")))?;
        }
        Command::Upload {
            bucket,
            file,
            key,
            prefix,
        } => {
            let key = match key {
                Some(key) => key,
                None => {
                    let name = file.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                    object_key_for(&prefix, name)
                }
            };
            let report = gateway(&cli.s3).await.upload_file(&bucket, &file, &key).await?;
            print_report(cli.json, &report, |r| {
                println!(
                    "Uploaded {} -> s3://{}/{} ({} rows, {} bytes)",
                    file.display(),
                    r.bucket,
                    r.key,
                    r.rows,
                    r.bytes
                )
            })?;
        }
        Command::UploadDir {
            bucket,
            dir,
            prefix,
        } => {
            let report = gateway(&cli.s3)
                .await
                .upload_directory(&bucket, &dir, &prefix)
                .await?;
            print_report(cli.json, &report, |r| {
                for uploaded in &r.uploaded {
                    println!("uploaded  s3://{}/{} ({} rows)", uploaded.bucket, uploaded.key, uploaded.rows);
                }
                for failed in &r.failed {
                    println!("FAILED    {} ({}): {}", failed.source.display(), failed.kind, failed.message);
                }
            })?;
            if !report.is_complete() {
                return Err(format!("{} file(s) failed to upload", report.failed.len()).into());
            }
        }
        Command::Ls { bucket, prefix } => {
            let keys = gateway(&cli.s3).await.list_objects(&bucket, &prefix).await?;
            print_report(cli.json, &keys, |k| k.iter().for_each(|key| println!("{key}")))?;
        }
        Command::Keys { bucket, prefix } => {
            let table = gateway(&cli.s3)
                .await
                .load_object_keys_as_table(&bucket, &prefix)
                .await?;
            print_table(&table, table.num_rows())?;
        }
        Command::Read { bucket, key, limit } => {
            let table = gateway(&cli.s3).await.read_file(&bucket, &key).await?;
            print_table(&table, limit)?;
        }
        Command::LoadTable {
            database,
            schema,
            file,
            batch_size,
            continue_existing,
        } => {
            let policy = if continue_existing {
                ExistingDatabase::Continue
            } else {
                ExistingDatabase::Abort
            };
            let ingestor = RelationalIngestor::new(cli.pg.params()).with_options(
                IngestOptions::new()
                    .with_insert_batch_size(batch_size)
                    .with_existing_database(policy),
            );
            let report = ingestor.load_csv_as_table(&database, &schema, &file).await?;
            print_report(cli.json, &report, |r| {
                println!(
                    "Loaded {} rows into {}.{}.{} (verified: {})",
                    r.rows_inserted, r.database, r.schema, r.table, r.verified_row_count
                );
                for (name, sql_type) in &r.columns {
                    println!("  {name}: {sql_type}");
                }
            })?;
        }
        Command::Databases => {
            let params = cli.pg.params();
            let ingestor = RelationalIngestor::new(params.clone());
            let mut session = ingestor.connect(&params.maintenance_database).await?;
            let databases = ingestor.list_databases(&mut session).await?;
            session.close().await?;
            print_report(cli.json, &databases, |d| d.iter().for_each(|name| println!("{name}")))?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_load_table() {
        let cli = Cli::try_parse_from([
            "csvlake",
            "load-table",
            "analytics",
            "raw",
            "orders.csv",
            "--batch-size",
            "1",
            "--continue-existing",
            "--pg-host",
            "db.internal",
        ])
        .unwrap();

        assert_eq!(cli.pg.host, "db.internal");
        match cli.command {
            Command::LoadTable {
                database,
                batch_size,
                continue_existing,
                ..
            } => {
                assert_eq!(database, "analytics");
                assert_eq!(batch_size, 1);
                assert!(continue_existing);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_s3_args_to_config() {
        let cli = Cli::try_parse_from([
            "csvlake",
            "ls",
            "bucket",
            "--endpoint",
            "http://localhost:9000",
            "--access-key",
            "ak",
            "--secret-key",
            "sk",
            "--compression",
            "zstd",
        ])
        .unwrap();

        let config = cli.s3.config();
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:9000"));
        assert!(config.force_path_style);
        assert_eq!(config.static_credentials(), Some(("ak", "sk")));
        assert_eq!(cli.s3.compression, ParquetCompression::Zstd);
    }
}
