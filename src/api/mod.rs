pub mod handlers;
pub mod network_handlers;
pub mod routes;

pub use handlers::*;
pub use network_handlers::*;
pub use routes::*;
