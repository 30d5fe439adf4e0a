//! Smartfolders Core - smart folder navigation and caching
//!
//! This library provides the core pipeline for browsing and fuzzy-searching
//! macOS smart folders (saved searches) through a single incrementally-typed
//! query string: parse the query into a navigation step, read cached
//! snapshots, kick off non-blocking background refreshes, and emit a ranked,
//! capped result sequence for the launcher host.

pub mod assemble;
pub mod cache;
pub mod config;
pub mod error;
pub mod folder;
pub mod fuzzy;
pub mod gateway;
pub mod navigator;
pub mod refresh;

pub use assemble::{Assembler, Icon, Outcome, ResultItem};
pub use cache::{CacheEntry, CacheStore, FOLDER_LIST_KEY};
pub use config::Config;
pub use error::SmartFoldersError;
pub use folder::{contents_cache_key, SmartFolder};
pub use gateway::{IndexGateway, MdfindGateway};
pub use navigator::{parse, NavigatorResult};
pub use refresh::{run_claimed, RefreshExecutor, RefreshTask, Refresher, ThreadExecutor};

/// Result type alias for smartfolders operations
pub type Result<T> = std::result::Result<T, SmartFoldersError>;
