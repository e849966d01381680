//! Request interception
//!
//! Every request routed by the API server passes through
//! [`record_request_metrics`]: it times the handler, resolves the optional
//! caller once, and reports the outcome to the collector after the response
//! has been produced.

use crate::auth::resolve_optional_caller;
use crate::service::app::AppState;
use crate::types::Caller;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::debug;

/// Caller resolved by the interceptor, available to handlers as an extractor
#[derive(Debug, Clone, Default)]
pub struct RequestCaller(pub Option<Caller>);

impl RequestCaller {
    pub fn caller(&self) -> Option<&Caller> {
        self.0.as_ref()
    }

    pub fn id(&self) -> Option<crate::types::CallerId> {
        self.0.as_ref().map(|caller| caller.id)
    }
}

impl<S> FromRequestParts<S> for RequestCaller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestCaller>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Middleware recording one completion event per request
pub async fn record_request_metrics(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let timer = state.prometheus().start_timer();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let caller = resolve_optional_caller(state.resolver().as_ref(), request.headers()).await;
    let caller_id = caller.as_ref().map(|caller| caller.id);
    request.extensions_mut().insert(RequestCaller(caller));

    let response = next.run(request).await;

    let status = response.status().as_u16();
    // One reading feeds both sinks
    let elapsed = timer.elapsed();
    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    state
        .collector()
        .record_request(status, elapsed_ms, caller_id);
    state.prometheus().record_request(status, elapsed);

    debug!(
        "{} {} -> {} in {:.2}ms (caller: {:?})",
        method, path, status, elapsed_ms, caller_id
    );

    response
}
