// Routing system for HTTP requests

use crate::handler::{BoxedHandler, IntoReply, Outcome};
use crate::logging::{debug, error, trace};
use crate::middleware::{Middleware, MiddlewareChain, Next, from_fn};
use crate::pattern::CompiledPattern;
use crate::response::CONTENT_TYPE_TEXT;
use crate::{Error, HttpRequest, HttpResponse, RawRequest, SentResponse};
use http::Method;
use serde_json::json;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

/// Route definition with handler
#[derive(Debug, Clone)]
pub struct Route {
    pub method: Method,
    pub pattern: CompiledPattern,
    pub handler: BoxedHandler,
}

/// Route table plus the global middleware list.
///
/// Routes are registered up front through `&mut Router`; dispatch only needs
/// `&Router`, so a configured router can be shared across threads behind an
/// `Arc`.
///
/// ```
/// use trellis_core::{RawRequest, Router};
/// use serde_json::json;
///
/// let mut router = Router::new();
/// router
///     .get("/users/{id}", |req, _res| Ok(json!({ "id": req.param("id") })))
///     .unwrap();
///
/// let res = router.dispatch(RawRequest::new("GET", "/users/42"));
/// assert_eq!(res.status, 200);
/// assert_eq!(res.body_str(), Some(r#"{"id":"42"}"#));
/// ```
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, Vec<Route>>,
    middleware: MiddlewareChain,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` requests matching `template`.
    ///
    /// Fails with [`Error::InvalidPattern`] if the template is malformed.
    pub fn add_route<F, R>(
        &mut self,
        method: Method,
        template: &str,
        handler: F,
    ) -> Result<&mut Self, Error>
    where
        F: Fn(&HttpRequest, &mut HttpResponse) -> Result<R, Error> + Send + Sync + 'static,
        R: IntoReply,
    {
        let pattern = CompiledPattern::compile(template)?;
        debug!(method = %method, template, "Registering route");

        self.routes.entry(method.clone()).or_default().push(Route {
            method,
            pattern,
            handler: BoxedHandler::new(handler),
        });
        Ok(self)
    }

    pub fn get<F, R>(&mut self, template: &str, handler: F) -> Result<&mut Self, Error>
    where
        F: Fn(&HttpRequest, &mut HttpResponse) -> Result<R, Error> + Send + Sync + 'static,
        R: IntoReply,
    {
        self.add_route(Method::GET, template, handler)
    }

    pub fn post<F, R>(&mut self, template: &str, handler: F) -> Result<&mut Self, Error>
    where
        F: Fn(&HttpRequest, &mut HttpResponse) -> Result<R, Error> + Send + Sync + 'static,
        R: IntoReply,
    {
        self.add_route(Method::POST, template, handler)
    }

    pub fn put<F, R>(&mut self, template: &str, handler: F) -> Result<&mut Self, Error>
    where
        F: Fn(&HttpRequest, &mut HttpResponse) -> Result<R, Error> + Send + Sync + 'static,
        R: IntoReply,
    {
        self.add_route(Method::PUT, template, handler)
    }

    pub fn patch<F, R>(&mut self, template: &str, handler: F) -> Result<&mut Self, Error>
    where
        F: Fn(&HttpRequest, &mut HttpResponse) -> Result<R, Error> + Send + Sync + 'static,
        R: IntoReply,
    {
        self.add_route(Method::PATCH, template, handler)
    }

    pub fn delete<F, R>(&mut self, template: &str, handler: F) -> Result<&mut Self, Error>
    where
        F: Fn(&HttpRequest, &mut HttpResponse) -> Result<R, Error> + Send + Sync + 'static,
        R: IntoReply,
    {
        self.add_route(Method::DELETE, template, handler)
    }

    pub fn options<F, R>(&mut self, template: &str, handler: F) -> Result<&mut Self, Error>
    where
        F: Fn(&HttpRequest, &mut HttpResponse) -> Result<R, Error> + Send + Sync + 'static,
        R: IntoReply,
    {
        self.add_route(Method::OPTIONS, template, handler)
    }

    pub fn head<F, R>(&mut self, template: &str, handler: F) -> Result<&mut Self, Error>
    where
        F: Fn(&HttpRequest, &mut HttpResponse) -> Result<R, Error> + Send + Sync + 'static,
        R: IntoReply,
    {
        self.add_route(Method::HEAD, template, handler)
    }

    /// Append a middleware. The first one registered runs outermost.
    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.middleware.use_middleware(middleware);
        self
    }

    /// Append a closure as middleware.
    pub fn use_fn<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&HttpRequest, &mut HttpResponse, Next<'_>) -> Outcome + Send + Sync + 'static,
    {
        self.use_middleware(from_fn(f))
    }

    pub fn middleware(&self) -> &MiddlewareChain {
        &self.middleware
    }

    /// Routes registered for `method`, in registration order.
    pub fn routes(&self, method: &Method) -> &[Route] {
        self.routes.get(method).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn route_count(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    /// Whether a request for `method` and `path` would reach a handler.
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.find(method, path).is_some()
    }

    fn find(&self, method: &Method, path: &str) -> Option<(&Route, HashMap<String, String>)> {
        self.routes
            .get(method)?
            .iter()
            .find_map(|route| route.pattern.matches(path).map(|params| (route, params)))
    }

    /// Process one request to completion.
    ///
    /// Always yields exactly one response: the handler's, a plain-text 404
    /// when nothing matched, or a JSON 500 when the pipeline failed or
    /// panicked before sending.
    pub fn dispatch(&self, raw: RawRequest) -> SentResponse {
        let path = raw.path().to_string();
        let span = tracing::debug_span!("dispatch", method = %raw.method, path = %path);
        let _entered = span.enter();

        let Some(method) = raw.parsed_method() else {
            debug!("Unrecognized request method");
            return not_found();
        };

        let Some((route, params)) = self.find(&method, &path) else {
            debug!("No route matched");
            return not_found();
        };
        debug!(route = %route.pattern.template(), params = params.len(), "Route matched");

        let req = HttpRequest::build(method, raw, params);
        let mut res = HttpResponse::new();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.middleware.apply(&req, &mut res, &route.handler)
        }))
        .unwrap_or_else(|payload| Err(Error::Panic(panic_message(payload.as_ref()))));

        match outcome {
            Ok(()) if !res.is_sent() => {
                trace!(
                    status = res.status_code(),
                    "Handler produced no response, sending empty body"
                );
                finalize(&mut res, Vec::new());
            }
            Ok(()) => {}
            Err(err) if res.is_sent() => {
                error!(error = %err, "Request failed after the response was sent");
            }
            Err(err) => {
                error!(error = %err, "Request failed");
                res.status(500);
                let body = json!({ "error": true, "message": error_message(&err) });
                if let Err(err) = res.json(&body) {
                    error!(error = %err, "Failed to send error response");
                }
            }
        }

        res.into_sent().unwrap_or_else(internal_error)
    }
}

fn finalize(res: &mut HttpResponse, body: Vec<u8>) {
    if let Err(err) = res.send(body) {
        error!(error = %err, "Failed to finalize response");
    }
}

fn not_found() -> SentResponse {
    SentResponse {
        status: 404,
        headers: vec![("Content-Type".to_string(), CONTENT_TYPE_TEXT.to_string())],
        cookies: Vec::new(),
        body: b"Not Found".to_vec(),
    }
}

fn internal_error() -> SentResponse {
    SentResponse {
        status: 500,
        headers: vec![("Content-Type".to_string(), CONTENT_TYPE_TEXT.to_string())],
        cookies: Vec::new(),
        body: b"Internal Server Error".to_vec(),
    }
}

/// Message for a 500 body; never empty.
fn error_message(err: &Error) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        "Internal Server Error".to_string()
    } else {
        message
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CookieOptions;
    use serde_json::Value;

    fn body_json(res: &SentResponse) -> Value {
        serde_json::from_slice(&res.body).unwrap()
    }

    #[test]
    fn test_static_route() {
        let mut router = Router::new();
        router.get("/health", |_req, res| res.text("ok")).unwrap();

        let res = router.dispatch(RawRequest::new("GET", "/health"));
        assert_eq!(res.status, 200);
        assert_eq!(res.body_str(), Some("ok"));
    }

    #[test]
    fn test_path_params() {
        let mut router = Router::new();
        router
            .get("/users/{id}/posts/{post}", |req, _res| {
                Ok(json!({ "id": req.param("id"), "post": req.param("post") }))
            })
            .unwrap();

        let res = router.dispatch(RawRequest::new("GET", "/users/7/posts/hello"));
        assert_eq!(body_json(&res), json!({"id": "7", "post": "hello"}));
    }

    #[test]
    fn test_first_registered_route_wins() {
        let mut router = Router::new();
        router.get("/items/{id}", |_req, res| res.text("param")).unwrap();
        router.get("/items/special", |_req, res| res.text("literal")).unwrap();

        let res = router.dispatch(RawRequest::new("GET", "/items/special"));
        assert_eq!(res.body_str(), Some("param"));
    }

    #[test]
    fn test_not_found() {
        let router = Router::new();
        let res = router.dispatch(RawRequest::new("GET", "/nope"));

        assert_eq!(res.status, 404);
        assert_eq!(res.header("Content-Type"), Some(CONTENT_TYPE_TEXT));
        assert_eq!(res.body_str(), Some("Not Found"));
    }

    #[test]
    fn test_method_and_path_matched_jointly() {
        let mut router = Router::new();
        router.post("/submit", |_req, _res| Ok(json!({"ok": true}))).unwrap();

        assert!(router.matches(&Method::POST, "/submit"));
        assert!(!router.matches(&Method::GET, "/submit"));
        assert_eq!(router.dispatch(RawRequest::new("GET", "/submit")).status, 404);
    }

    #[test]
    fn test_method_is_case_insensitive() {
        let mut router = Router::new();
        router.get("/", |_req, res| res.text("root")).unwrap();

        let res = router.dispatch(RawRequest::new("get", "/"));
        assert_eq!(res.body_str(), Some("root"));
    }

    #[test]
    fn test_invalid_method_is_not_found() {
        let mut router = Router::new();
        router.get("/", |_req, res| res.text("root")).unwrap();
        assert_eq!(router.dispatch(RawRequest::new("BAD METHOD", "/")).status, 404);
    }

    #[test]
    fn test_extension_method() {
        let mut router = Router::new();
        let purge = Method::from_bytes(b"PURGE").unwrap();
        router.add_route(purge, "/cache", |_req, res| res.text("purged")).unwrap();

        let res = router.dispatch(RawRequest::new("PURGE", "/cache"));
        assert_eq!(res.body_str(), Some("purged"));
    }

    #[test]
    fn test_invalid_template_rejected() {
        let mut router = Router::new();
        let result = router.get("/users/{id", |_req, _res| Ok(()));
        assert!(matches!(result, Err(Error::InvalidPattern(_))));
        assert_eq!(router.route_count(), 0);
    }

    #[test]
    fn test_handler_error_becomes_500() {
        let mut router = Router::new();
        router
            .get("/fail", |_req, res| -> Result<(), Error> {
                res.header("X-Kept", "yes");
                Err(Error::handler("database offline"))
            })
            .unwrap();

        let res = router.dispatch(RawRequest::new("GET", "/fail"));
        assert_eq!(res.status, 500);
        assert_eq!(res.header("X-Kept"), Some("yes"));
        assert_eq!(
            body_json(&res),
            json!({"error": true, "message": "database offline"})
        );
    }

    #[test]
    fn test_empty_error_message_is_replaced() {
        let mut router = Router::new();
        router
            .get("/blank", |_req, _res| -> Result<(), Error> { Err(Error::handler("")) })
            .unwrap();
        router
            .get("/spaces", |_req, _res| -> Result<(), Error> {
                Err(Error::Handler("  ".into()))
            })
            .unwrap();

        for path in ["/blank", "/spaces"] {
            let res = router.dispatch(RawRequest::new("GET", path));
            assert_eq!(res.status, 500);
            assert_eq!(
                body_json(&res),
                json!({"error": true, "message": "Internal Server Error"})
            );
        }
    }

    #[test]
    fn test_unsafe_redirect_becomes_500() {
        let mut router = Router::new();
        router
            .get("/go", |req, res| res.redirect(req.query_str("to").unwrap_or("/")))
            .unwrap();

        let res = router.dispatch(RawRequest::new(
            "GET",
            "/go?to=%2Fhome%0D%0ASet-Cookie%3A%20admin%3D1",
        ));
        assert_eq!(res.status, 500);
        assert!(res.header("Location").is_none());
        assert!(res.cookies.is_empty());

        let mut wire = Vec::new();
        res.write_http1(&mut wire).unwrap();
        assert!(!String::from_utf8(wire).unwrap().contains("admin=1"));
    }

    #[test]
    fn test_far_future_cookie_is_writable() {
        let mut router = Router::new();
        router
            .get("/remember", |_req, res| {
                res.cookie("keep", "1", CookieOptions::new().expires(u64::MAX / 2));
                res.text("ok")
            })
            .unwrap();

        let res = router.dispatch(RawRequest::new("GET", "/remember"));
        let mut wire = Vec::new();
        res.write_http1(&mut wire).unwrap();
        let text = String::from_utf8(wire).unwrap();
        assert!(text.contains("Expires=Fri, 31 Dec 9999 23:59:59 GMT"));
    }

    #[test]
    fn test_panic_is_contained() {
        let mut router = Router::new();
        router
            .get("/panic", |_req, _res| -> Result<(), Error> { panic!("kaboom") })
            .unwrap();

        let res = router.dispatch(RawRequest::new("GET", "/panic"));
        assert_eq!(res.status, 500);
        let body = body_json(&res);
        assert_eq!(body["error"], json!(true));
        assert!(body["message"].as_str().unwrap().contains("kaboom"));
    }

    #[test]
    fn test_error_after_send_keeps_sent_response() {
        let mut router = Router::new();
        router
            .get("/late", |_req, res| -> Result<(), Error> {
                res.status(201).text("done")?;
                Err(Error::handler("too late"))
            })
            .unwrap();

        let res = router.dispatch(RawRequest::new("GET", "/late"));
        assert_eq!(res.status, 201);
        assert_eq!(res.body_str(), Some("done"));
    }

    #[test]
    fn test_implicit_empty_send() {
        let mut router = Router::new();
        router
            .delete("/items/{id}", |_req, res| {
                res.status(204);
                Ok(())
            })
            .unwrap();

        let res = router.dispatch(RawRequest::new("DELETE", "/items/3"));
        assert_eq!(res.status, 204);
        assert!(res.body.is_empty());
    }

    #[test]
    fn test_middleware_runs_around_handler() {
        let mut router = Router::new();
        router.use_fn(|req, res, next| {
            res.header("X-Before", "1");
            next.run(req, res)
        });
        router.get("/", |_req, _res| Ok(json!({"ok": true}))).unwrap();

        let res = router.dispatch(RawRequest::new("GET", "/"));
        assert_eq!(res.header("X-Before"), Some("1"));
        assert_eq!(body_json(&res), json!({"ok": true}));
    }

    #[test]
    fn test_middleware_not_run_for_unmatched() {
        let mut router = Router::new();
        router.use_fn(|_req, res, _next| res.status(401).text("denied"));

        let res = router.dispatch(RawRequest::new("GET", "/missing"));
        assert_eq!(res.status, 404);
    }

    #[test]
    fn test_middleware_error_becomes_500() {
        let mut router = Router::new();
        router.use_fn(|_req, _res, _next| Err(Error::Internal("auth backend down".into())));
        router.get("/", |_req, res| res.text("unreachable")).unwrap();

        let res = router.dispatch(RawRequest::new("GET", "/"));
        assert_eq!(res.status, 500);
        assert_eq!(body_json(&res)["error"], json!(true));
    }

    #[test]
    fn test_routes_listing() {
        let mut router = Router::new();
        router.get("/a", |_req, _res| Ok(())).unwrap();
        router.get("/b", |_req, _res| Ok(())).unwrap();
        router.post("/a", |_req, _res| Ok(())).unwrap();

        let templates: Vec<&str> = router
            .routes(&Method::GET)
            .iter()
            .map(|route| route.pattern.template())
            .collect();
        assert_eq!(templates, vec!["/a", "/b"]);
        assert_eq!(router.route_count(), 3);
        assert!(router.routes(&Method::PUT).is_empty());
    }

    #[test]
    fn test_router_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Router>();
    }
}
