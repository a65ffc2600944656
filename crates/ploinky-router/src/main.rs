use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::RwLock;
use tracing::info;

use ploinky_core::WorkspaceRoot;
use ploinky_router::aggregator::Aggregator;
use ploinky_router::file_config::RouterFileConfig;
use ploinky_router::oauth::{JwksCache, OAuthConfig};
use ploinky_router::routing_table::RoutingTable;
use ploinky_router::server::{router, RouterState};
use ploinky_router::session::SessionStore;

/// Default router port; a mere convenience default, not a protocol
/// requirement (see DESIGN.md's note on this Open Question).
const DEFAULT_PORT: u16 = 8088;
const DEFAULT_BIND: &str = "0.0.0.0";

#[derive(Parser, Debug)]
#[command(name = "ploinky-router")]
#[command(about = "Reverse-proxy router and MCP aggregator")]
struct Cli {
    #[arg(long, env = "PLOINKY_ROUTER_PORT")]
    port: Option<u16>,

    #[arg(long, env = "PLOINKY_ROUTER_BIND")]
    bind: Option<String>,

    #[arg(long, env = "PLOINKY_WORKSPACE_ROOT", default_value = ".")]
    workspace_root: PathBuf,

    /// TOML file with process settings that CLI flags and env vars override.
    #[arg(long, env = "PLOINKY_ROUTER_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "PLOINKY_OAUTH_ISSUER")]
    oauth_issuer: Option<String>,
    #[arg(long, env = "PLOINKY_OAUTH_AUDIENCE")]
    oauth_audience: Option<String>,
    #[arg(long, env = "PLOINKY_OAUTH_TOKEN_ENDPOINT")]
    oauth_token_endpoint: Option<String>,
    #[arg(long, env = "PLOINKY_OAUTH_JWKS_URI")]
    oauth_jwks_uri: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    ploinky_core::init_logging("ploinky_router=info,tower_http=info");

    let workspace = WorkspaceRoot::discover(&cli.workspace_root)?;
    let table = RoutingTable::load(&workspace.routing_table_path())?;
    info!(agents = table.agent_names().len(), "loaded routing table");

    let config_path = cli.config.clone().unwrap_or_else(|| workspace.config_dir().join("router.toml"));
    let file_config = RouterFileConfig::load(&config_path)?;

    let port = cli.port.or(file_config.port).unwrap_or(DEFAULT_PORT);
    let bind = cli.bind.clone().or(file_config.bind.clone()).unwrap_or_else(|| DEFAULT_BIND.to_string());

    let issuer = cli.oauth_issuer.clone().or(file_config.oauth_issuer.clone());
    let audience = cli.oauth_audience.clone().or(file_config.oauth_audience.clone());
    let token_endpoint = cli.oauth_token_endpoint.clone().or(file_config.oauth_token_endpoint.clone());
    let jwks_uri = cli.oauth_jwks_uri.clone().or(file_config.oauth_jwks_uri.clone());

    let oauth = match (&issuer, &audience, &token_endpoint, &jwks_uri) {
        (Some(issuer), Some(audience), Some(token_endpoint), Some(jwks_uri)) => Some(Arc::new(OAuthConfig {
            issuer: issuer.clone(),
            audience: audience.clone(),
            token_endpoint: token_endpoint.clone(),
            jwks_uri: jwks_uri.clone(),
        })),
        _ => None,
    };
    let jwks = oauth.as_ref().map(|cfg| Arc::new(JwksCache::new(cfg.jwks_uri.clone())));

    let state = RouterState {
        table: Arc::new(RwLock::new(table)),
        aggregator: Arc::new(Aggregator::new()),
        sessions: Arc::new(SessionStore::new()),
        blobs_root: workspace.shared_dir().join("blobs"),
        static_root: workspace.path().to_path_buf(),
        secrets_path: workspace.secrets_path(),
        oauth,
        jwks,
    };

    let app = router(state);
    let addr = SocketAddr::new(bind.parse()?, port);
    info!(%addr, "starting router");

    // The CLI that spawns this process records our PID in the running-PID
    // directory (Session Registry, component G) immediately after spawn.
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
