//! Command-line entry point for the Silo pipeline.
//!
//! The external scheduler invokes `silo etl`, then on success `silo
//! validate`, serialized with overlap prevention. Storage backends are
//! constructed fresh for each invocation; there is no cached client state.
//!
//! ```bash
//! # One consolidation run
//! silo --source-bucket raw --destination-bucket curated etl
//!
//! # One validation pass over published artifacts
//! silo --destination-bucket curated validate
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use silo_core::storage::{S3Backend, S3Options, StorageBackend};
use silo_core::{init_logging, LogFormat};
use silo_etl::{pipeline, EtlConfig};

/// Silo batch consolidation pipeline.
#[derive(Debug, Parser)]
#[command(name = "silo")]
#[command(about = "Consolidates raw JSONL objects into Parquet artifacts")]
#[command(version)]
struct Args {
    /// Bucket holding pending raw input objects.
    #[arg(long, env = "SILO_SOURCE_BUCKET")]
    source_bucket: Option<String>,

    /// Bucket receiving consolidated artifacts.
    #[arg(long, env = "SILO_DESTINATION_BUCKET")]
    destination_bucket: String,

    /// Key prefix for raw input discovery.
    #[arg(long, env = "SILO_SOURCE_PREFIX", default_value = "data/")]
    source_prefix: String,

    /// Key prefix for published artifacts.
    #[arg(long, env = "SILO_DESTINATION_PREFIX", default_value = "consolidated/")]
    destination_prefix: String,

    /// AWS region.
    #[arg(long, env = "AWS_REGION", default_value = "eu-west-1")]
    region: String,

    /// Endpoint override for S3-compatible stores (MinIO, LocalStack).
    #[arg(long, env = "SILO_S3_ENDPOINT")]
    endpoint: Option<String>,

    /// Static access key ID; falls back to the default credential chain.
    #[arg(long, env = "AWS_ACCESS_KEY_ID")]
    access_key_id: Option<String>,

    /// Static secret access key.
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    secret_access_key: Option<String>,

    /// Use path-style addressing (required by MinIO).
    #[arg(long, env = "SILO_S3_FORCE_PATH_STYLE")]
    force_path_style: bool,

    /// Emit JSON logs instead of pretty-printed ones.
    #[arg(long, env = "SILO_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one consolidation pass: discover, fetch, merge, publish, cleanup.
    Etl,
    /// Run one validation pass over published artifacts.
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(if args.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    });

    let config = EtlConfig {
        source_prefix: args.source_prefix.clone(),
        destination_prefix: args.destination_prefix.clone(),
    };

    match args.command {
        Commands::Etl => {
            let source_bucket = args
                .source_bucket
                .as_deref()
                .context("--source-bucket is required for the etl command")?;
            let source = connect(&args, source_bucket).await?;
            let destination = connect(&args, &args.destination_bucket).await?;

            let outcome = pipeline::run_etl(&source, &destination, &config)
                .await
                .context("consolidation run failed")?;
            tracing::info!(?outcome, "etl finished");
        }
        Commands::Validate => {
            let destination = connect(&args, &args.destination_bucket).await?;

            let outcome = pipeline::run_validation(&destination, &config)
                .await
                .context("validation pass failed")?;
            tracing::info!(?outcome, "validation finished");
        }
    }

    Ok(())
}

async fn connect(args: &Args, bucket: &str) -> Result<Arc<dyn StorageBackend>> {
    let backend = S3Backend::connect(S3Options {
        bucket: bucket.to_string(),
        region: args.region.clone(),
        endpoint: args.endpoint.clone(),
        access_key_id: args.access_key_id.clone(),
        secret_access_key: args.secret_access_key.clone(),
        force_path_style: args.force_path_style,
    })
    .await
    .with_context(|| format!("failed to initialize storage for bucket {bucket}"))?;

    Ok(Arc::new(backend))
}
