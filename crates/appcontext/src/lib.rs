//! Application-context tree
//!
//! An AppContext describes a bundle of resources to be applied across member
//! clusters. The orchestrator writes it; the resource synchronizer reads it,
//! applies it, and writes lifecycle and per-cluster statuses back into it.

pub mod context;
pub mod error;
pub mod memory;
pub mod status;
#[path = "trait.rs"]
pub mod context_trait;

pub use context::{AppContext, Handle, InstructionKind, InstructionLevel};
pub use context_trait::ContextStoreTrait;
pub use error::AppContextError;
pub use memory::MemoryContextStore;
pub use status::{AppContextStatus, CsrStatus, PEM_BASE64_PREFIX, ResourceBundleStatus};
