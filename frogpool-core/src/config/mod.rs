//! Configuration types for Frog Pool.
//!
//! These types represent the validated runtime configuration handed to the
//! core components at construction time. The actual config loading/parsing
//! is handled by the server crate.

mod auth;
mod chain;
mod game;
mod server;

pub use auth::AuthConfig;
pub use chain::{ChainConfig, SolanaNetwork};
pub use game::{GameConfig, MAX_HUNGER_LEVEL};
pub use server::ServerConfig;
