pub mod common;
pub mod connection;
pub mod directory;
pub mod link;
pub mod zt_network;

pub use common::*;
pub use connection::*;
pub use directory::*;
pub use link::*;
pub use zt_network::*;
