pub mod connection_manager;
pub mod validate;

pub use connection_manager::*;
pub use validate::*;
