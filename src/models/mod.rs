// Domain models: bands, connection records, lifetime stats blob

mod band;
mod connection;
mod lifetime;

pub use band::{Associations, Band, channel_to_band};
pub use connection::{ConnectionContext, ConnectionStatus};
pub use lifetime::{InterfaceCounters, LifetimeStats};
