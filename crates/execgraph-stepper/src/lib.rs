//! Interactive stepping over execution graphs.
//!
//! An execution engine explores a program one state at a time; this crate owns
//! the client side of that exploration. Successor states are merged into a
//! [`GraphStore`](execgraph_core::GraphStore) as they arrive, silent (tau)
//! transitions are elided according to the [`ExplorationConfig`], and the
//! visible part of the graph is exported for rendering after every change.
//!
//! ## Core Concepts
//!
//! - **Stepper**: state machine driving forward/backward steps and engine requests
//! - **VisibilityEngine**: decides which successors become visible on a step
//! - **ExecutionEngine**: the request/response seam to whatever computes states
//! - **EventBus**: typed channels notifying source, memory and graph views
//!
//! ## Step cycle
//!
//! ```text
//! step_forward ──► Expand request ──► engine ──► Stepping response
//!      ▲                                               │
//!      └──────── frontier selected ◄── merge + reveal ◄┘
//! ```

pub mod config;
pub mod engine;
mod error;
pub mod events;
pub mod export;
pub mod memory_view;
mod stepper;
#[cfg(any(test, feature = "test-fixtures"))]
pub mod test_fixtures;
mod visibility;

pub use config::{ExplorationConfig, InteractiveMode, InteractiveOption};
pub use engine::{EngineRequest, EngineResponse, ExecutionEngine, RecordedEngine};
pub use error::{ErrorKind, ExploreError, ExploreResult};
pub use events::{Channel, EventBus, ListenerId, Subscription};
pub use export::{export_graph, DotConfig, ExportedGraph, RenderEdge, RenderNode};
pub use memory_view::render_memory_dot;
pub use stepper::{SessionContext, StepOutcome, Stepper, StepperState};
pub use visibility::VisibilityEngine;
