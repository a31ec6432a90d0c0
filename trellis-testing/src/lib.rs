//! Testing utilities for Trellis routers.
//!
//! [`TestClient`] dispatches requests straight into a [`Router`](trellis_core::Router),
//! and the [`assertions`] module checks the responses.
//!
//! ```
//! use serde_json::json;
//! use trellis_core::Router;
//! use trellis_testing::*;
//!
//! let mut router = Router::new();
//! router
//!     .get("/api/users", |_req, _res| Ok(json!({ "users": ["Alice", "Bob"] })))
//!     .unwrap();
//!
//! let client = TestClient::from_router(router);
//! let response = client.get("/api/users").send().unwrap();
//! assert_status(&response, 200);
//! assert_json(&response, &json!({ "users": ["Alice", "Bob"] }));
//! ```

pub mod assertions;
pub mod test_client;

pub use assertions::*;
pub use test_client::{TestClient, TestRequestBuilder, TestResponse};
