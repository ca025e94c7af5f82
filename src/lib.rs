//! Polymarket Book Sync - Main Library
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables
//! - **booksync**: Order books, reconciliation, pricing and the engine (re-exported from workspace)
//! - **hypersockets**: Supervised WebSocket client (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust
//! use polymarket_book_sync::bin_common::{load_config_from_env, ConfigType};
//! use polymarket_book_sync::booksync::BookSyncEngine;
//! ```

// Re-export workspace libraries for convenience
pub use booksync;
pub use hypersockets;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;

    pub use cli::{load_config_from_env, ConfigType};
}
