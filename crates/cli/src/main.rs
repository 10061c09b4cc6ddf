use crate::{
    error::CliError,
    grid::HeadlessGrid,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use commands::Commands;
use connectors::adapter::DriverConnector;
use engine_config::{
    env::EnvManager,
    session::{FileSessionManager, SessionData, SessionManager},
    settings::CacheSettings,
};
use engine_core::{CacheState, StreamingTableCache};
use model::{
    events::{ColumnRegion, RowRegion},
    execution::connection::ConnectionDescriptor,
};
use planner::plan::QueryPlan;
use std::{path::PathBuf, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod conn;
mod error;
mod grid;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "sqlgrid",
    version = "0.1.0",
    about = "Browse SQL query results through a block-paged table cache"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "JSON session file with session id and query")]
    session_file: Option<PathBuf>,

    #[arg(long, global = true, help = ".env file loaded on top of the process environment")]
    env_file: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        help = "Connection URL, e.g. postgres://user:pw@host:5432/db; overrides environment variables"
    )]
    url: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(()) => ExitCode::Success,
        Err(CliError::ShutdownRequested) => ExitCode::ShutdownRequested,
        Err(err) => {
            error!("{err}");
            eprintln!("Error: {err}");
            ExitCode::GeneralError
        }
    };

    std::process::exit(code.as_i32());
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut env = EnvManager::new();
    if let Some(path) = &cli.env_file {
        env.load_from_file(path)?;
    }

    let mut session = FileSessionManager::new(cli.session_file.clone(), env.clone()).get_session()?;
    if let Some(url) = &cli.url {
        session.connection = ConnectionDescriptor::from_url(url)?;
    }

    match cli.command {
        Commands::Query {
            sql,
            rows,
            start,
            settings,
        } => {
            let settings = load_settings(settings, &env)?;
            run_query(&session, sql, settings, start, rows).await
        }
        Commands::Validate { sql, settings } => {
            let settings = load_settings(settings, &env)?;
            validate(&session, sql, settings).await
        }
        Commands::TestConn => {
            let descriptor = session.descriptor().ok_or(CliError::MissingConnection)?;
            conn::ping(descriptor, session.session_id()).await
        }
        Commands::Session => output::print_json(&session.redacted()),
    }
}

fn load_settings(path: Option<PathBuf>, env: &EnvManager) -> Result<CacheSettings, CliError> {
    let settings = match path {
        Some(path) => CacheSettings::from_file(path)?,
        None => CacheSettings::default(),
    };
    Ok(settings.with_env_overrides(env)?)
}

fn query_text(session: &SessionData, sql: Option<String>) -> Result<String, CliError> {
    sql.or_else(|| (!session.query.trim().is_empty()).then(|| session.query.clone()))
        .ok_or(CliError::MissingQuery)
}

async fn run_query(
    session: &SessionData,
    sql: Option<String>,
    settings: CacheSettings,
    start: usize,
    count: usize,
) -> Result<(), CliError> {
    let sql = query_text(session, sql)?;
    let descriptor = session
        .descriptor()
        .cloned()
        .ok_or(CliError::MissingConnection)?;

    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let cache = StreamingTableCache::new(Arc::new(DriverConnector), settings)?;
    let mut grid = HeadlessGrid::new(cache, shutdown.cancel_token());

    grid.cache()
        .update(
            Some(descriptor),
            sql,
            session.session_id().map(str::to_string),
        )
        .await?;
    info!(state = %grid.cache().state(), "Query bound");

    let rows = grid.read_rows(start, count).await?;
    let cache = grid.cache();
    output::print_table(&cache.fields(), &rows);

    let total = cache.row_count(RowRegion::Body);
    let suffix = if cache.state() == CacheState::Streaming {
        "+"
    } else {
        ""
    };
    println!(
        "({} of {total}{suffix} rows, {} columns)",
        rows.len(),
        cache.column_count(ColumnRegion::Body)
    );

    let metrics = cache.metrics();
    info!(
        fetches = metrics.fetches_issued,
        rows_fetched = metrics.rows_fetched,
        evicted = metrics.blocks_evicted,
        "Cache activity"
    );
    cache.dispose();
    Ok(())
}

async fn validate(
    session: &SessionData,
    sql: Option<String>,
    settings: CacheSettings,
) -> Result<(), CliError> {
    let sql = query_text(session, sql)?;
    let descriptor = session.descriptor().ok_or(CliError::MissingConnection)?;

    let connection = conn::open(descriptor, session.session_id()).await?;
    let fields = connection.validate_query(&sql).await?;
    let plan = QueryPlan::for_query(&sql, settings.block_size, settings.bounded_limit);

    output::print_json(&serde_json::json!({
        "fields": fields,
        "plan": plan,
    }))
}
