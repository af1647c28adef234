pub mod cache;
pub mod handlers;
pub mod server;

pub use cache::ResponseCache;
pub use handlers::AppState;
pub use server::{build_router, run_server, ServerConfig};
