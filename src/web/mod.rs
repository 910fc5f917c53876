//! HTTP front-end module

pub mod args;
pub mod content;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;

pub use args::RequestArgs;
pub use content::ContentType;
pub use error::ApiError;
pub use server::{build_router, AppState, WebServer};
