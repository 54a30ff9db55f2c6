//! clue-query: list projects and users, and search projects by map region.
//!
//! Results are printed as JSON on stdout; logs go to stderr or `LOG_FILE`.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clue_core::clue_geo::{BoundingBox, CoordinateTransformer, RegionPolygonBuilder};
use clue_core::defaults::{SOFT_DELETE_ALL, SOFT_DELETE_PARAM};
use clue_core::{
    EntitySortSchema, PaginationRequest, QueryComposer, SortDirection, SpatialQueryExecutor,
    PROJECT_SCHEMA, USER_SCHEMA,
};
use clue_db::{Database, DbConfig};

#[derive(Parser)]
#[command(name = "clue-query")]
#[command(author, version, about = "Query clue projects and users")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// GCJ-02 map viewport corners.
#[derive(clap::Args, Debug)]
struct Viewport {
    #[arg(allow_negative_numbers = true)]
    ne_lat: f64,
    #[arg(allow_negative_numbers = true)]
    ne_lng: f64,
    #[arg(allow_negative_numbers = true)]
    sw_lat: f64,
    #[arg(allow_negative_numbers = true)]
    sw_lng: f64,

    /// Use the single-step GCJ-02 inverse instead of the refined one
    #[arg(long)]
    rough: bool,
}

impl Viewport {
    fn bbox(&self) -> anyhow::Result<BoundingBox> {
        Ok(BoundingBox::from_path_params(
            self.ne_lat,
            self.ne_lng,
            self.sw_lat,
            self.sw_lng,
        )?)
    }

    fn builder(&self) -> RegionPolygonBuilder {
        if self.rough {
            RegionPolygonBuilder::new(CoordinateTransformer::rough())
        } else {
            RegionPolygonBuilder::default()
        }
    }
}

#[derive(clap::Args, Debug)]
struct Listing {
    #[arg(long, default_value_t = clue_core::defaults::PAGE_SKIP)]
    skip: i64,

    #[arg(long, default_value_t = clue_core::defaults::PAGE_LIMIT)]
    limit: i64,

    /// Sort key as `field:ASC|DESC`, repeatable, applied in order
    #[arg(long = "order")]
    order: Vec<String>,

    /// Free-text search over the entity's searchable names
    #[arg(long)]
    name: Option<String>,

    /// Filter as `key=value`, repeatable
    #[arg(long = "filter", short = 'f')]
    filters: Vec<String>,

    /// Include soft-deleted rows
    #[arg(long)]
    include_deleted: bool,
}

impl Listing {
    fn request(&self, schema: &EntitySortSchema) -> anyhow::Result<PaginationRequest> {
        let mut request = PaginationRequest::new(self.skip, self.limit);
        for spec in &self.order {
            let (field, dir) = spec.split_once(':').unwrap_or((spec.as_str(), "ASC"));
            let direction: SortDirection = dir.parse()?;
            request = request.order_by(field, direction);
        }
        if let Some(name) = &self.name {
            let search = schema
                .search
                .ok_or_else(|| anyhow!("{} has no free-text search", schema.entity))?;
            request = request.with_param(search.param, name.as_str());
        }
        for filter in &self.filters {
            let (key, value) = filter
                .split_once('=')
                .ok_or_else(|| anyhow!("filter '{}' is not key=value", filter))?;
            request = request.with_param(key, value);
        }
        if self.include_deleted {
            request = request.with_param(SOFT_DELETE_PARAM, SOFT_DELETE_ALL);
        }
        Ok(request)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the WGS-84 ring for a viewport (no database access)
    Ring {
        #[command(flatten)]
        viewport: Viewport,
    },

    /// List projects
    Projects {
        #[command(flatten)]
        listing: Listing,
    },

    /// List users
    Users {
        #[command(flatten)]
        listing: Listing,
    },

    /// Projects located inside a viewport
    Area {
        #[command(flatten)]
        viewport: Viewport,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors
    //   RUST_LOG    - standard env filter (default: "clue_db=info,clue_core=info")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "clue_db=info,clue_core=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("clue-query.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // stdout carries results
        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    let cli = Cli::parse();

    let output = match cli.command {
        Commands::Ring { viewport } => {
            let ring = viewport.builder().build_ring(&viewport.bbox()?)?;
            serde_json::to_value(&ring)?
        }
        Commands::Projects { listing } => {
            let (config, db) = connect().await?;
            let page = QueryComposer::new(config.query_config())
                .list(&listing.request(&PROJECT_SCHEMA)?, &PROJECT_SCHEMA, &db.projects)
                .await?;
            serde_json::to_value(&page)?
        }
        Commands::Users { listing } => {
            let (config, db) = connect().await?;
            let page = QueryComposer::new(config.query_config())
                .list(&listing.request(&USER_SCHEMA)?, &USER_SCHEMA, &db.users)
                .await?;
            serde_json::to_value(&page)?
        }
        Commands::Area { viewport } => {
            let (config, db) = connect().await?;
            let items = SpatialQueryExecutor::new(config.query_config())
                .with_builder(viewport.builder())
                .search_area(&viewport.bbox()?, &PROJECT_SCHEMA, &db.projects)
                .await?;
            serde_json::to_value(&items)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn connect() -> anyhow::Result<(DbConfig, Database)> {
    let config = DbConfig::from_env()?;
    info!(
        subsystem = "cli",
        op = "connect",
        max_connections = config.pool.max_connections,
        timeout_ms = config.statement_timeout.as_millis() as u64,
        "Connecting to database"
    );
    let db = Database::connect(&config)
        .await
        .context("failed to connect to database")?;
    Ok((config, db))
}
