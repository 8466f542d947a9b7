pub mod api;
pub mod core;
pub mod providers;

pub use self::core::RelayServer;
