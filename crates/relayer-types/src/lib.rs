pub mod attestation;
pub mod common;
pub mod events;
pub mod feeds;

pub use attestation::*;
pub use common::*;
pub use events::*;
pub use feeds::*;
