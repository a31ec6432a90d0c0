// Handler adaptation
//
// Route handlers are plain functions or closures taking the request and the
// response. Whatever they return is converted through `IntoReply`; a value
// becomes a JSON body unless the handler already sent a response itself.

use crate::logging::warn;
use crate::{Error, HttpRequest, HttpResponse};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Result of running a pipeline stage.
pub type Outcome = Result<(), Error>;

/// Conversion of a handler's return value into an optional JSON reply.
///
/// `None` (or a JSON `null`) means "no automatic response".
pub trait IntoReply {
    fn into_reply(self) -> Result<Option<Value>, Error>;
}

impl IntoReply for () {
    fn into_reply(self) -> Result<Option<Value>, Error> {
        Ok(None)
    }
}

impl IntoReply for Value {
    fn into_reply(self) -> Result<Option<Value>, Error> {
        Ok(Some(self).filter(|value| !value.is_null()))
    }
}

impl<T: Serialize> IntoReply for Option<T> {
    fn into_reply(self) -> Result<Option<Value>, Error> {
        match self {
            Some(data) => serde_json::to_value(data)
                .map_err(|e| Error::Serialization(e.to_string()))?
                .into_reply(),
            None => Ok(None),
        }
    }
}

/// Wrapper to return any serializable value from a handler.
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoReply for Json<T> {
    fn into_reply(self) -> Result<Option<Value>, Error> {
        Some(self.0).into_reply()
    }
}

type ErasedHandler =
    dyn Fn(&HttpRequest, &mut HttpResponse) -> Result<Option<Value>, Error> + Send + Sync;

/// Type-erased route handler, cheap to clone.
#[derive(Clone)]
pub struct BoxedHandler {
    inner: Arc<ErasedHandler>,
}

impl BoxedHandler {
    pub fn new<F, R>(handler: F) -> Self
    where
        F: Fn(&HttpRequest, &mut HttpResponse) -> Result<R, Error> + Send + Sync + 'static,
        R: IntoReply,
    {
        Self {
            inner: Arc::new(move |req: &HttpRequest, res: &mut HttpResponse| {
                handler(req, res)?.into_reply()
            }),
        }
    }

    /// Run the handler and return its reply without touching the response.
    pub fn call(&self, req: &HttpRequest, res: &mut HttpResponse) -> Result<Option<Value>, Error> {
        (self.inner)(req, res)
    }

    /// Run the handler and emit its reply as JSON when it produced one.
    pub fn invoke(&self, req: &HttpRequest, res: &mut HttpResponse) -> Outcome {
        let Some(reply) = self.call(req, res)? else {
            return Ok(());
        };

        if res.is_sent() {
            warn!(
                path = %req.path(),
                "Handler returned a value after sending a response; value dropped"
            );
            return Ok(());
        }

        res.json(&reply)
    }
}

impl std::fmt::Debug for BoxedHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxedHandler").finish_non_exhaustive()
    }
}
