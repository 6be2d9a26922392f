//! # Loomcanvas: Collaborative Workflow-Canvas Engine
//!
//! Loomcanvas lets many clients edit one node-and-edge workflow graph at
//! the same time, and compiles that graph into a dependency-ordered plan
//! for an external LLM executor — whose live progress flows back into the
//! same replicated graph every client is watching.
//!
//! ## Core Concepts
//!
//! - **Documents**: named, independently synchronized stores of
//!   conflict-free maps ([`store`])
//! - **Canvas**: the typed node/edge graph over two of those maps
//!   ([`canvas`])
//! - **Scope**: the client-side permission gate consulted before every
//!   mutation ([`scope`])
//! - **Sessions**: the explicit owning object for one opened skill
//!   ([`session`])
//! - **Plans**: the ordered task list compiled from a graph snapshot
//!   ([`compiler`])
//! - **Runs**: shared run state bridging an external executor and every
//!   connected client ([`run`])
//!
//! ## Quick Start
//!
//! ```rust
//! use loomcanvas::canvas::{NodeType, Position};
//! use loomcanvas::scope::Scope;
//! use loomcanvas::session::{GraphSession, SessionConfig};
//! use loomcanvas::store::LocalSyncHub;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let hub = LocalSyncHub::new("token");
//! let session = GraphSession::open(
//!     &hub,
//!     SessionConfig::new("demo", Scope::ReadWrite).with_auth_token("token"),
//! )
//! .await?;
//!
//! let input = session.create_node(NodeType::Input, Position::new(0.0, 0.0), "Input")?;
//! let output = session.create_node(NodeType::Output, Position::new(400.0, 0.0), "Output")?;
//! session.add_edge(input.id, None, output.id, None)?;
//!
//! session.undo()?; // the edge is gone again
//! session.close();
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! There is no locking discipline beyond the store's merge semantics:
//! every replicated entry is replaced wholesale under a totally ordered
//! stamp (last writer wins), multi-field updates are issued as one
//! whole-value write, and cross-map atomicity is deliberately absent —
//! an edge pointing at a not-yet-synced node is a normal transient that
//! every traversal tolerates.
//!
//! ## Module Guide
//!
//! - [`store`] - replicated maps, documents, and the sync provider
//! - [`canvas`] - node/edge model and derived graph queries
//! - [`scope`] - the permission gate
//! - [`undo`] - bounded snapshot-based undo/redo
//! - [`session`] - session lifecycle and gated mutations
//! - [`compiler`] - execution-plan compilation
//! - [`run`] - run state bridge and executor seam
//! - [`export`] - import/export payloads

pub mod buddy;
pub mod canvas;
pub mod compiler;
pub mod export;
pub mod message;
pub mod run;
pub mod scope;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod undo;
