// Queuebot Infrastructure - Discord REST Adapter
// Implements: CarrierChannel, ChannelProvider

mod channel;
mod client;
mod config;
mod models;
mod provider;

pub use channel::DiscordCarrierChannel;
pub use client::DiscordClient;
pub use config::{DiscordConfig, DEFAULT_API_BASE, DEFAULT_STORAGE_CHANNEL};
pub use provider::DiscordChannelProvider;
