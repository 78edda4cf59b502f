pub mod config;
pub mod discovery;
pub mod hooks;
pub mod host;
pub mod kernel;
pub mod locator;

// Re-export specific items if needed for convenient access
pub use config::ProbeConfig;
pub use kernel::reactor::Reactor;
