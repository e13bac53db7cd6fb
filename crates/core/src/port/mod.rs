// Port Layer - Interfaces for external dependencies

pub mod carrier_channel;

// Re-exports
pub use carrier_channel::{
    mocks, CarrierChannel, ChannelError, ChannelMessage, ChannelProvider, MessageId,
};
