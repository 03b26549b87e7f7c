//! Metadata store for the distributed cloud manager
//!
//! Typed put/get/list/delete against a document store. Rows are addressed by
//! structured [`StoreKey`]s and carry tagged values, so a single logical
//! cloud row can hold its definition, its AppContext binding and its private
//! key side by side.
//!
//! # Example
//!
//! ```no_run
//! use dcm_store::{MemoryStore, StoreKey, insert_value, find_values};
//!
//! # async fn example() -> Result<(), dcm_store::StoreError> {
//! let store = MemoryStore::new();
//! let key = StoreKey::new().with("project", "p").with("logical-cloud-name", "lc");
//! insert_value(&store, "orchestrator", &key, "logicalcloud", &"definition").await?;
//!
//! // Empty trailing field lists every logical cloud of the project
//! let all_key = StoreKey::new().with("project", "p").with("logical-cloud-name", "");
//! let all: Vec<String> = find_values(&store, "orchestrator", &all_key, "logicalcloud").await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod key;
pub mod memory;
#[path = "trait.rs"]
pub mod store_trait;
pub mod typed;

pub use error::StoreError;
pub use key::StoreKey;
pub use memory::MemoryStore;
pub use store_trait::{StoreEntry, StoreTrait};
pub use typed::{find_value, find_values, insert_value, marshal, unmarshal};
