//! Wiki-O Node - the main application entry point.
//!
//! Architecture:
//! - Single daemon process holding the user ledger, opinion book and
//!   violation board in memory
//! - Periodic sweep closing violation polls whose period is over
//! - Unix admin socket for local admin ops (wikio-admin CLI)

use crate::admin_socket::AdminSocket;
use crate::config::CoreConfig;
use crate::error::Result;
use crate::ledger::UserLedger;
use crate::opinions::OpinionBook;
use crate::violations::ViolationBoard;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use wikio_moderation::StateMachine;

/// Configuration for a Wiki-O node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Admin socket path (for wikio-admin CLI)
    pub admin_socket: PathBuf,

    /// Optional JSON file with thresholds and permission rows
    pub core_config: Option<PathBuf>,

    /// How often expired violation polls are closed
    pub sweep_interval: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl NodeConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        let admin_socket = std::env::var("WIKIO_ADMIN_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(default_socket_path()));

        let core_config = std::env::var("WIKIO_CONFIG").ok().map(PathBuf::from);

        let sweep_interval = std::env::var("WIKIO_SWEEP_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(3600));

        Self {
            admin_socket,
            core_config,
            sweep_interval,
        }
    }
}

/// Default socket path.
pub fn default_socket_path() -> String {
    let data_dir = std::env::var("WIKIO_DATA_DIR").unwrap_or_else(|_| "./wikio-data".to_string());
    format!("{}/admin.sock", data_dir)
}

/// Shared state for the node - one instance of every service.
pub struct WikioState {
    pub config: CoreConfig,
    pub ledger: Arc<UserLedger>,
    pub opinions: OpinionBook,
    pub violations: ViolationBoard,
}

impl WikioState {
    pub fn new(config: CoreConfig) -> Self {
        let ledger = Arc::new(UserLedger::new(
            StateMachine::new(config.moderation.clone()),
            config.permissions.clone(),
        ));
        let opinions = OpinionBook::new(config.opinion.clone(), config.permissions.clone());
        let violations = ViolationBoard::new(
            Arc::clone(&ledger),
            config.moderation.clone(),
            config.permissions.clone(),
        );
        Self {
            config,
            ledger,
            opinions,
            violations,
        }
    }
}

/// A Wiki-O node instance.
pub struct WikioNode {
    state: Arc<WikioState>,
    config: NodeConfig,
}

impl WikioNode {
    /// Create a new node, loading thresholds from the config file if set.
    pub async fn new(config: NodeConfig) -> Result<Self> {
        let core = match &config.core_config {
            Some(path) => {
                tracing::info!("Loading thresholds from {:?}", path);
                CoreConfig::load(path)?
            }
            None => CoreConfig::default(),
        };

        if let Some(dir) = config.admin_socket.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }

        Ok(Self {
            state: Arc::new(WikioState::new(core)),
            config,
        })
    }

    /// Get the shared state.
    pub fn state(&self) -> Arc<WikioState> {
        Arc::clone(&self.state)
    }

    /// Run the node (starts the poll sweeper and serves the admin socket).
    pub async fn run(self) -> Result<()> {
        tracing::info!("Wiki-O node starting");
        tracing::info!("  Admin: {:?}", self.config.admin_socket);
        tracing::info!("  Sweep: every {:?}", self.config.sweep_interval);

        let sweeper = self.state();
        let period = self.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                sweeper.violations.sweep(chrono::Utc::now()).await;
            }
        });

        let admin_socket = AdminSocket::new(self.state(), &self.config.admin_socket);
        admin_socket.run().await
    }
}
