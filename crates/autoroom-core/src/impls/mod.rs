//! In-memory implementations of the ports (development and tests).

pub mod inmem_config;
pub mod inmem_platform;

pub use inmem_config::InMemoryConfigStore;
pub use inmem_platform::InMemoryPlatform;
