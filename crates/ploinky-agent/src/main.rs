use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;
use tracing::info;

use ploinky_agent::config::McpConfig;
use ploinky_agent::file_config::AgentFileConfig;
use ploinky_agent::server::{router, AppState};
use ploinky_agent::tasks::TaskQueue;
use ploinky_agent::AgentName;

const DEFAULT_PORT: u16 = 7000;
const DEFAULT_MAX_CONCURRENT: usize = 4;
const DEFAULT_TASK_SNAPSHOT: &str = "/tmp/ploinky/tasks.json";

#[derive(Parser, Debug)]
#[command(name = "ploinky-agent")]
#[command(about = "Per-agent MCP server")]
struct Cli {
    /// Short name this agent is registered under; reported via `initialize`.
    #[arg(long, env = "PLOINKY_AGENT_NAME")]
    name: String,

    /// Port the MCP HTTP endpoint listens on inside the container.
    #[arg(long, env = "PLOINKY_AGENT_PORT")]
    port: Option<u16>,

    /// Maximum number of task-queue tool calls running concurrently.
    #[arg(long, env = "PLOINKY_AGENT_MAX_CONCURRENT")]
    max_concurrent: Option<usize>,

    /// Where the task queue persists its crash-recovery snapshot.
    #[arg(long, env = "PLOINKY_AGENT_TASK_SNAPSHOT")]
    task_snapshot: Option<PathBuf>,

    /// TOML file with process settings that CLI flags and env vars override.
    #[arg(long, env = "PLOINKY_AGENT_CONFIG", default_value = "/code/agent.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    ploinky_core::init_logging("ploinky_agent=info,tower_http=info");

    let file_config = AgentFileConfig::load(&cli.config)?;
    let port = cli.port.or(file_config.port).unwrap_or(DEFAULT_PORT);
    let max_concurrent = cli.max_concurrent.or(file_config.max_concurrent).unwrap_or(DEFAULT_MAX_CONCURRENT);
    let task_snapshot = cli
        .task_snapshot
        .clone()
        .or(file_config.task_snapshot.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TASK_SNAPSHOT));

    let (config, config_dir) = McpConfig::load_default()?;
    info!(agent = %cli.name, tools = config.tools.len(), resources = config.resources.len(), "loaded mcp config");

    let tasks = Arc::new(TaskQueue::load(task_snapshot, max_concurrent).await?);

    let state = Arc::new(AppState {
        agent_name: AgentName(cli.name.clone()),
        config,
        config_dir,
        tasks,
        session: Mutex::new(None),
    });

    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(agent = %cli.name, %addr, "starting mcp server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
