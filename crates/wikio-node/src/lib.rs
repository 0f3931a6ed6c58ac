//! Wiki-O Node
//!
//! Hosts the opinion aggregator and the moderation state machine behind a
//! local admin socket.
//!
//! # Architecture
//!
//! - **Ledger**: users, their event histories and derived levels
//! - **Opinions**: opinions per theory and the Stats they aggregate into
//! - **Violations**: report polls that feed strikes into the ledger
//! - **Admin Socket**: Unix socket for local admin commands (wikio-admin CLI)
//!
//! # Example
//!
//! ```no_run
//! use wikio_node::{NodeConfig, WikioNode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let node = WikioNode::new(NodeConfig::from_env()).await?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

pub mod admin_socket;
pub mod config;
pub mod error;
pub mod ledger;
pub mod node;
pub mod opinions;
pub mod violations;

pub use admin_socket::{AdminCommand, AdminResponse, AdminSocket};
pub use config::CoreConfig;
pub use error::{Error, Result};
pub use ledger::{LevelChange, UserLedger, UserSnapshot};
pub use node::{NodeConfig, WikioNode, WikioState};
pub use opinions::{OpinionBook, OpinionReport, TheoryId};
pub use violations::{Verdict, ViolationBoard};
