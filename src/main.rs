use accessreq::config::Config;
use accessreq::graph::http::format_graph_error;
use accessreq::graph::models::{AccessPackageAssignmentRequest, AccessPackageRequestType};
use accessreq::graph::odata::ConsistencyLevel;
use accessreq::graph::{
    AccessPackageAssignmentRequestClient, ApiVersion, GraphClient, GraphError, Query,
};
use accessreq::VERSION;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Manage Microsoft Graph access package assignment requests
#[derive(Parser, Debug)]
#[command(name = "accessreq", version, about, long_about = None)]
struct Args {
    /// Directory (tenant) ID
    #[arg(short, long, global = true)]
    tenant: Option<String>,

    /// Graph API version (v1.0 or beta)
    #[arg(long, global = true)]
    api_version: Option<ApiVersion>,

    /// Graph endpoint, for national clouds
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Remember the tenant for future runs
    #[arg(long, global = true)]
    save: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List assignment requests
    List {
        /// OData filter, e.g. "state eq 'pendingApproval'"
        #[arg(long)]
        filter: Option<String>,
        #[arg(long)]
        search: Option<String>,
        /// Comma-separated properties to return
        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,
        /// Comma-separated relationships to expand
        #[arg(long, value_delimiter = ',')]
        expand: Vec<String>,
        #[arg(long)]
        order_by: Option<String>,
        /// Return at most this many requests (disables paging)
        #[arg(long, default_value_t = 0)]
        top: u32,
        #[arg(long, default_value_t = 0)]
        skip: u32,
        /// Ask the service for a total count
        #[arg(long)]
        count: bool,
    },
    /// Get one or more assignment requests
    Get {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Create an assignment request
    Create {
        /// JSON file holding the full request body
        #[arg(long, conflicts_with_all = ["access_package_id", "policy_id", "target_id"])]
        file: Option<PathBuf>,
        #[arg(long, required_unless_present = "file")]
        access_package_id: Option<String>,
        #[arg(long, required_unless_present = "file")]
        policy_id: Option<String>,
        /// Object ID of the principal to assign
        #[arg(long, required_unless_present = "file")]
        target_id: Option<String>,
        #[arg(long)]
        request_type: Option<AccessPackageRequestType>,
        #[arg(long)]
        justification: Option<String>,
    },
    /// Delete an assignment request
    Delete { id: String },
    /// Cancel an assignment request
    Cancel { id: String },
    /// Re-process an assignment request
    Reprocess { id: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {:?}: {}", log_path, e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("accessreq {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("accessreq").join("accessreq.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".accessreq").join("accessreq.log");
    }
    PathBuf::from("accessreq.log")
}

fn print<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

#[derive(Serialize)]
struct ActionResult<'a> {
    id: &'a str,
    action: &'a str,
    status: u16,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    if let Err(err) = run(args).await {
        match err.downcast_ref::<GraphError>() {
            Some(graph_err) => {
                tracing::error!("{:?}", err);
                eprintln!("Error: {}", format_graph_error(graph_err));
            }
            None => eprintln!("Error: {err:?}"),
        }
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load();
    if let Some(tenant) = &args.tenant {
        if args.save {
            config.set_tenant(tenant).context("Failed to save configuration")?;
        } else {
            config.tenant_id = Some(tenant.clone());
        }
    }
    if args.api_version.is_some() {
        config.api_version = args.api_version;
    }
    if args.endpoint.is_some() {
        config.endpoint = args.endpoint.clone();
    }

    tracing::info!(
        "Using tenant: {}, API version: {}",
        config.effective_tenant(),
        config.api_version.unwrap_or_default()
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling in-flight request");
            interrupt.cancel();
        }
    });

    let base = GraphClient::from_config(&config)?;
    let client = AccessPackageAssignmentRequestClient::new(base).with_cancellation(cancel);
    let output = args.output;

    match args.command {
        Command::List {
            filter,
            search,
            select,
            expand,
            order_by,
            top,
            skip,
            count,
        } => {
            let mut query = Query::new()
                .select(select)
                .expand(expand)
                .top(top)
                .skip(skip)
                .count(count);
            query.filter = filter;
            query.order_by = order_by;
            if let Some(search) = search {
                query = query.search(search);
            }
            if query.count || query.search.is_some() {
                query = query.consistency_level(ConsistencyLevel::Eventual);
            }

            let (list, status) = client.list_with_count(&query).await?;
            tracing::info!(
                "List returned {} ({} requests, count {:?})",
                status,
                list.value.len(),
                list.count
            );
            // The envelope is only worth printing when a total was asked for
            if count {
                print(&list, output)
            } else {
                print(&list.value, output)
            }
        }
        Command::Get { ids } => {
            let results = futures::future::join_all(ids.iter().map(|id| client.get(id))).await;

            let mut found = Vec::with_capacity(results.len());
            let mut failures = 0;
            for (id, result) in ids.iter().zip(results) {
                match result {
                    Ok((request, status)) => {
                        tracing::info!("Get {} returned {}", id, status);
                        found.push(request);
                    }
                    Err(e) => {
                        failures += 1;
                        tracing::error!("Get {} failed: {:?}", id, e);
                        eprintln!("{}: {}", id, format_graph_error(&e));
                    }
                }
            }

            if found.len() == 1 && failures == 0 {
                print(&found[0], output)?;
            } else {
                print(&found, output)?;
            }
            if failures > 0 {
                anyhow::bail!("{} of {} requests could not be fetched", failures, ids.len());
            }
            Ok(())
        }
        Command::Create {
            file,
            access_package_id,
            policy_id,
            target_id,
            request_type,
            justification,
        } => {
            let mut request = match file {
                Some(path) => {
                    let content = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {:?}", path))?;
                    serde_json::from_str::<AccessPackageAssignmentRequest>(&content)
                        .with_context(|| format!("Invalid assignment request in {:?}", path))?
                }
                None => AccessPackageAssignmentRequest::admin_add(
                    access_package_id.as_deref().unwrap_or_default(),
                    policy_id.as_deref().unwrap_or_default(),
                    target_id.as_deref().unwrap_or_default(),
                ),
            };
            if request_type.is_some() {
                request.request_type = request_type;
            }
            if justification.is_some() {
                request.justification = justification;
            }

            let (created, status) = client.create(&request).await?;
            tracing::info!("Create returned {}", status);
            print(&created, output)
        }
        Command::Delete { id } => {
            let status = client.delete(&id).await?;
            print(&ActionResult { id: &id, action: "delete", status: status.as_u16() }, output)
        }
        Command::Cancel { id } => {
            let status = client.cancel(&id).await?;
            print(&ActionResult { id: &id, action: "cancel", status: status.as_u16() }, output)
        }
        Command::Reprocess { id } => {
            let status = client.reprocess(&id).await?;
            print(&ActionResult { id: &id, action: "reprocess", status: status.as_u16() }, output)
        }
    }
}
