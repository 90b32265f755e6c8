//! Domain Layer
//!
//! Port traits for the services the fetch coordinator consumes: the network,
//! the image decoder, persistent storage, and the callback delivery context.

pub mod ports;

pub use ports::{Delivery, DeliveryJob, DiskStore, ImageDecoder, NetworkFetcher};
