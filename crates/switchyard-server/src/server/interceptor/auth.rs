use super::call::RpcCall;
use crate::server::config::AuthConfig;
use core::task::{Context, Poll};
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use switchyard_core::Error;
use tonic::Status;
use tower::{Layer, Service};

/// Rejects any call whose token header does not carry the configured secret.
///
/// Rejected calls never reach the inner service. The check reads metadata
/// only, so streaming calls are authorized before their first message is
/// consumed.
#[derive(Clone, Debug)]
pub struct AuthLayer {
    config: Arc<AuthConfig>,
}

impl AuthLayer {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = Auth<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Auth {
            inner,
            config: Arc::clone(&self.config),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Auth<S> {
    inner: S,
    config: Arc<AuthConfig>,
}

impl<S> Auth<S> {
    fn is_authorized<T>(&self, call: &RpcCall<T>) -> bool {
        call.context
            .metadata()
            .get(&self.config.header)
            .is_some_and(|presented| {
                constant_time_eq(
                    presented.as_encoded_bytes(),
                    self.config.secret.as_encoded_bytes(),
                )
            })
    }
}

impl<S, T> Service<RpcCall<T>> for Auth<S>
where
    S: Service<RpcCall<T>, Error = Status> + Clone + Send + 'static,
    S::Response: Send,
    S::Future: Send + 'static,
    T: Send + 'static,
{
    type Response = S::Response;
    type Error = Status;
    type Future = BoxFuture<'static, Result<S::Response, Status>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: RpcCall<T>) -> Self::Future {
        if !self.is_authorized(&call) {
            tracing::debug!(procedure = call.context.procedure(), "rejected unauthenticated call");
            return futures::future::ready(Err(Status::from(Error::Unauthenticated))).boxed();
        }

        let clone = self.inner.clone();
        let mut inner = core::mem::replace(&mut self.inner, clone);
        inner.call(call).boxed()
    }
}

/// Compares two byte strings without short-circuiting on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
