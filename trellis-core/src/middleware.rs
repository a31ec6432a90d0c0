// Middleware system for request/response processing

use crate::cors::CorsOptions;
use crate::handler::{BoxedHandler, Outcome};
use crate::logging::{debug, error, info, trace};
use crate::{HttpRequest, HttpResponse};
use http::Method;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

/// An interceptor wrapped around every matched route.
///
/// A middleware either delegates by calling [`Next::run`] (before and/or
/// after doing its own work) or short-circuits by returning without calling
/// it, usually after sending a response itself.
pub trait Middleware: Send + Sync {
    fn handle(&self, req: &HttpRequest, res: &mut HttpResponse, next: Next<'_>) -> Outcome;
}

/// Continuation to the rest of the pipeline.
///
/// `run` consumes the continuation, so the downstream chain executes at most
/// once per middleware invocation.
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Middleware>],
    handler: &'a BoxedHandler,
}

impl<'a> Next<'a> {
    pub fn run(self, req: &HttpRequest, res: &mut HttpResponse) -> Outcome {
        match self.remaining.split_first() {
            Some((middleware, rest)) => {
                trace!(remaining = rest.len(), "Executing middleware");
                middleware.handle(
                    req,
                    res,
                    Next {
                        remaining: rest,
                        handler: self.handler,
                    },
                )
            }
            None => {
                trace!("Middleware chain complete, calling handler");
                self.handler.invoke(req, res)
            }
        }
    }
}

/// Adapter turning a closure into a [`Middleware`].
pub struct FnMiddleware<F>(F);

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&HttpRequest, &mut HttpResponse, Next<'_>) -> Outcome + Send + Sync,
{
    fn handle(&self, req: &HttpRequest, res: &mut HttpResponse, next: Next<'_>) -> Outcome {
        (self.0)(req, res, next)
    }
}

/// Wrap a closure as middleware.
///
/// ```
/// use trellis_core::middleware::from_fn;
///
/// let timing = from_fn(|req, res, next| {
///     res.header("X-Served-By", "trellis");
///     next.run(req, res)
/// });
/// # let _ = timing;
/// ```
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: Fn(&HttpRequest, &mut HttpResponse, Next<'_>) -> Outcome + Send + Sync,
{
    FnMiddleware(f)
}

/// Ordered middleware list; the first registered is the outermost.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Arc::new(middleware));
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Run the chain with `handler` as the terminal stage.
    pub fn apply(
        &self,
        req: &HttpRequest,
        res: &mut HttpResponse,
        handler: &BoxedHandler,
    ) -> Outcome {
        debug!(
            middleware_count = self.middlewares.len(),
            path = %req.path(),
            method = %req.method(),
            "Executing middleware chain"
        );
        Next {
            remaining: &self.middlewares,
            handler,
        }
        .run(req, res)
    }
}

// ========== Built-in Middleware ==========

/// Applies CORS headers to every response and answers `OPTIONS` requests
/// with `204 No Content` without reaching the handler.
pub struct CorsMiddleware {
    options: CorsOptions,
}

impl CorsMiddleware {
    pub fn new() -> Self {
        Self::with_options(CorsOptions::default())
    }

    pub fn with_options(options: CorsOptions) -> Self {
        Self { options }
    }

    pub fn allow_origin(mut self, origin: &str) -> Self {
        self.options = self.options.origin(origin);
        self
    }

    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.options = self.options.credentials(allow);
        self
    }

    pub fn options(&self) -> &CorsOptions {
        &self.options
    }
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for CorsMiddleware {
    fn handle(&self, req: &HttpRequest, res: &mut HttpResponse, next: Next<'_>) -> Outcome {
        res.allow_cors(&self.options);

        if *req.method() == Method::OPTIONS {
            res.status(204);
            return res.send(Vec::new());
        }

        next.run(req, res)
    }
}

/// Propagates an incoming request id, or generates one, onto the response.
pub struct RequestIdMiddleware {
    header: String,
}

impl RequestIdMiddleware {
    pub fn new() -> Self {
        Self::with_header("X-Request-Id")
    }

    pub fn with_header(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }
}

impl Default for RequestIdMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for RequestIdMiddleware {
    fn handle(&self, req: &HttpRequest, res: &mut HttpResponse, next: Next<'_>) -> Outcome {
        let request_id = req
            .header(&self.header)
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        res.header(self.header.clone(), request_id);
        next.run(req, res)
    }
}

/// Rejects request bodies larger than `max_size` bytes with `413`.
pub struct BodySizeLimitMiddleware {
    max_size: usize,
}

impl BodySizeLimitMiddleware {
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl Middleware for BodySizeLimitMiddleware {
    fn handle(&self, req: &HttpRequest, res: &mut HttpResponse, next: Next<'_>) -> Outcome {
        if req.body().len() > self.max_size {
            debug!(size = req.body().len(), limit = self.max_size, "Request body too large");
            return res.status(413).json(&json!({
                "error": true,
                "message": format!(
                    "Request body exceeds maximum size of {} bytes",
                    self.max_size
                ),
            }));
        }

        next.run(req, res)
    }
}

/// Logs each request and the resulting status and duration.
pub struct LoggingMiddleware {
    pub log_request_body: bool,
    /// Maximum number of body bytes to include in the log line
    pub max_body_size: usize,
}

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self {
            log_request_body: false,
            max_body_size: 1024,
        }
    }

    pub fn with_request_body(mut self, enable: bool) -> Self {
        self.log_request_body = enable;
        self
    }

    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    fn body_preview(&self, body: &[u8]) -> String {
        if body.len() > self.max_body_size {
            format!(
                "{}... ({} bytes)",
                String::from_utf8_lossy(&body[..self.max_body_size]),
                body.len()
            )
        } else {
            String::from_utf8_lossy(body).into_owned()
        }
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for LoggingMiddleware {
    fn handle(&self, req: &HttpRequest, res: &mut HttpResponse, next: Next<'_>) -> Outcome {
        let start = Instant::now();

        if self.log_request_body && !req.body().is_empty() {
            info!(
                method = %req.method(),
                path = %req.path(),
                body = %self.body_preview(req.body()),
                "HTTP request received"
            );
        } else {
            info!(method = %req.method(), path = %req.path(), "HTTP request received");
        }

        let result = next.run(req, res);
        let duration = start.elapsed();

        match &result {
            Ok(()) => {
                let status = res.sent().map(|s| s.status).unwrap_or(res.status_code());
                info!(
                    method = %req.method(),
                    path = %req.path(),
                    status,
                    duration_ms = duration.as_millis() as u64,
                    "HTTP response sent"
                );
            }
            Err(err) => {
                error!(
                    method = %req.method(),
                    path = %req.path(),
                    duration_ms = duration.as_millis() as u64,
                    error = %err,
                    "HTTP request failed"
                );
            }
        }

        result
    }
}
