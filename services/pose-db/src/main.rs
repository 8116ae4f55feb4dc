use anyhow::{Context, Result};
use bson::Bson;
use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use futures::TryStreamExt;
use pose_db::config::Config;
use pose_db::{PoseHandle, PoseQuery};
use std::io::Write;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[clap(
    name = "pose-db",
    version = env!("CARGO_PKG_VERSION"),
    about = "Query 2D pose detections from the pose store"
)]
struct Cli {
    /// MongoDB URI (defaults to MONGO_POSE_URI / configuration)
    #[clap(long, global = true)]
    uri: Option<String>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print matching poses as flattened rows, one JSON object per line
    Fetch(FilterArgs),
    /// Print matching raw documents as relaxed extended JSON, one per line
    Stream(FilterArgs),
}

#[derive(clap::Args, Debug)]
struct FilterArgs {
    /// Inference run to include (repeatable)
    #[clap(long = "inference-run-id")]
    inference_run_ids: Vec<String>,
    #[clap(long)]
    environment_id: Option<String>,
    /// Camera to include (repeatable)
    #[clap(long = "camera-id")]
    camera_ids: Vec<String>,
    /// Inclusive lower bound, RFC 3339
    #[clap(long, value_parser = parse_rfc3339)]
    start: Option<DateTime<FixedOffset>>,
    /// Exclusive upper bound, RFC 3339
    #[clap(long, value_parser = parse_rfc3339)]
    end: Option<DateTime<FixedOffset>>,
    /// IANA zone the stored timestamps were written in
    #[clap(long, value_parser = parse_time_zone)]
    store_time_zone: Option<Tz>,
}

impl FilterArgs {
    fn to_query(&self) -> PoseQuery {
        let mut query = PoseQuery::new();
        if !self.inference_run_ids.is_empty() {
            query = query.inference_run_ids(self.inference_run_ids.iter().cloned());
        }
        if let Some(environment_id) = &self.environment_id {
            query = query.environment_id(environment_id.clone());
        }
        if !self.camera_ids.is_empty() {
            query = query.camera_ids(self.camera_ids.iter().cloned());
        }
        if let Some(start) = self.start {
            query = query.start(start);
        }
        if let Some(end) = self.end {
            query = query.end(end);
        }
        if let Some(tz) = self.store_time_zone {
            query = query.store_time_zone(tz);
        }
        query
    }
}

fn parse_rfc3339(s: &str) -> Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_rfc3339(s).map_err(|e| e.to_string())
}

fn parse_time_zone(s: &str) -> Result<Tz, String> {
    s.parse::<Tz>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = Config::load()
        .map(|config| config.service.log_level)
        .unwrap_or_else(|_| "info".to_string());
    init_tracing(&log_level);

    let mut handle = PoseHandle::connect(cli.uri.as_deref())
        .await
        .context("Failed to connect to pose store")?;

    let result = run(&handle, &cli.command).await;
    handle.cleanup().await;
    result
}

async fn run(handle: &PoseHandle, command: &Command) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match command {
        Command::Fetch(args) => {
            let table = handle
                .fetch_poses_2d(&args.to_query())
                .await
                .context("Failed to fetch poses")?;
            for row in table.rows() {
                serde_json::to_writer(&mut out, row)?;
                writeln!(out)?;
            }
            info!(rows = table.len(), "Fetch complete");
        }
        Command::Stream(args) => {
            let mut cursor = handle
                .generate_poses_2d_find_iterator(&args.to_query())
                .await
                .context("Failed to query poses")?;
            let mut count = 0usize;
            while let Some(document) = cursor.try_next().await? {
                let json = Bson::Document(document).into_relaxed_extjson();
                serde_json::to_writer(&mut out, &json)?;
                writeln!(out)?;
                count += 1;
            }
            info!(documents = count, "Stream complete");
        }
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();
}
