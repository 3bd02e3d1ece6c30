//! Axum integration utilities.
//!
//! [`RequireModeratorLayer`] gates a route (typically a session-join or
//! token-issuing endpoint) on [`Resolver::verify_moderator_access`]. Policy
//! and integrity failures become `403`, transient store failures become
//! `503`; the inner service is only called on a grant.

use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::cache::Cache;
use crate::error::Error;
use crate::resolver::Resolver;
use crate::store::RoleStore;
use crate::types::{SessionId, UserId};

use ::axum::body::Body;
use ::axum::http::{Request, StatusCode};
use ::axum::response::{IntoResponse, Response};
use ::tower::{Layer, Service};

/// Caller identity attached to a request by upstream authentication.
#[derive(Debug, Clone)]
pub struct AccessContext {
    /// Authenticated user.
    pub user_id: UserId,
    /// Session being joined, if any.
    pub session_id: Option<SessionId>,
}

impl AccessContext {
    /// Creates a context.
    pub fn new(user_id: UserId, session_id: Option<SessionId>) -> Self {
        Self {
            user_id,
            session_id,
        }
    }
}

/// Maps a resolver error to an HTTP status.
pub fn status_for(error: &Error) -> StatusCode {
    if error.is_retryable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else if error.is_denial() {
        StatusCode::FORBIDDEN
    } else {
        StatusCode::BAD_REQUEST
    }
}

/// Middleware layer that requires moderator access.
#[derive(Debug)]
pub struct RequireModeratorLayer<S, C> {
    resolver: Arc<Resolver<S, C>>,
}

impl<S, C> Clone for RequireModeratorLayer<S, C> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
        }
    }
}

impl<S, C> RequireModeratorLayer<S, C> {
    /// Creates a new layer.
    pub fn new(resolver: Arc<Resolver<S, C>>) -> Self {
        Self { resolver }
    }
}

impl<S, C, Inner> Layer<Inner> for RequireModeratorLayer<S, C>
where
    S: RoleStore,
    C: Cache,
{
    type Service = RequireModeratorService<Inner, S, C>;

    fn layer(&self, inner: Inner) -> Self::Service {
        RequireModeratorService {
            inner,
            resolver: self.resolver.clone(),
        }
    }
}

/// Middleware service that enforces moderator access.
///
/// On a grant the [`crate::VerificationResult`] is inserted into the request
/// extensions for the handler.
#[derive(Debug)]
pub struct RequireModeratorService<Inner, S, C> {
    inner: Inner,
    resolver: Arc<Resolver<S, C>>,
}

impl<Inner: Clone, S, C> Clone for RequireModeratorService<Inner, S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

impl<Inner, S, C> Service<Request<Body>> for RequireModeratorService<Inner, S, C>
where
    Inner: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    S: RoleStore + 'static,
    C: Cache + 'static,
{
    type Response = Response;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let resolver = self.resolver.clone();

        Box::pin(async move {
            let context = req.extensions().get::<AccessContext>().cloned();
            let Some(context) = context else {
                return Ok((StatusCode::UNAUTHORIZED, "missing access context").into_response());
            };

            match resolver
                .verify_moderator_access(&context.user_id, context.session_id.as_ref())
                .await
            {
                Ok(result) => {
                    req.extensions_mut().insert(result);
                    poll_fn(|cx| inner.poll_ready(cx)).await?;
                    inner.call(req).await
                }
                Err(err) => {
                    let status = status_for(&err);
                    let body = if status == StatusCode::SERVICE_UNAVAILABLE {
                        "role verification unavailable"
                    } else {
                        "forbidden"
                    };
                    Ok((status, body).into_response())
                }
            }
        })
    }
}
