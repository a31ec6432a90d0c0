// Trellis - a small synchronous HTTP router for Rust
//
// Route templates with `{name}` placeholders, a request/response model with
// JSON, form, cookie and CORS helpers, and an onion-shaped middleware pipeline.
// Transports hand a `RawRequest` to `Router::dispatch` and write back the
// returned `SentResponse`.

// Re-export core functionality
pub use trellis_core::*;

// Re-export optional crates
#[cfg(feature = "config")]
pub use trellis_config;

#[cfg(feature = "testing")]
pub use trellis_testing;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        CookieOptions,
        CorsOptions,
        Error,
        HttpRequest,
        HttpResponse,
        Json,
        Method,
        Middleware,
        Next,
        Outcome,
        RawRequest,
        Router,
        SameSite,
        SentResponse,
    };
}
