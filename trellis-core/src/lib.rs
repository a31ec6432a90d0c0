// Core library for the Trellis HTTP router
// Pattern compilation, request/response model, middleware pipeline and dispatch

pub mod cookie;
pub mod cors;
pub mod error;
pub mod form;
pub mod handler;
pub mod logging;
pub mod middleware;
pub mod pattern;
pub mod request;
pub mod response;
pub mod routing;

// Re-export commonly used types
pub use cookie::*;
pub use cors::{CorsList, CorsOptions, CorsPolicy};
pub use error::*;
pub use form::*;
pub use handler::*;
pub use middleware::*;
pub use pattern::*;
pub use request::*;
pub use response::*;
pub use routing::{Route, Router};

pub use http::Method;
