mod client;
mod config;

pub use client::GameClient;
pub use config::ClientConfig;
