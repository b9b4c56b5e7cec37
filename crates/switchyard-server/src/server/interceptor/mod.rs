//! Cross-cutting behavior applied to every call, in a fixed order.
//!
//! ```text
//! Logger -> Auth -> Recovery -> handler
//! ```
//!
//! Each stage is a [`tower::Layer`] over services that accept an
//! [`RpcCall`](call::RpcCall) and fail with [`tonic::Status`]. The same chain
//! wraps unary and streaming handlers; only the message type differs.

pub mod auth;
pub mod call;
pub mod logger;
pub mod recovery;

use crate::server::config::AuthConfig;
use auth::{Auth, AuthLayer};
use logger::{Logger, LoggerLayer};
use recovery::{Recovery, RecoveryLayer};
use tower::Layer;

/// The full interceptor stack. Cheap to clone.
#[derive(Clone, Debug)]
pub struct InterceptorChain {
    logger: LoggerLayer,
    auth: AuthLayer,
    recovery: RecoveryLayer,
}

impl InterceptorChain {
    pub fn new(auth: AuthConfig) -> Self {
        Self {
            logger: LoggerLayer,
            auth: AuthLayer::new(auth),
            recovery: RecoveryLayer,
        }
    }
}

impl<S> Layer<S> for InterceptorChain {
    type Service = Logger<Auth<Recovery<S>>>;

    fn layer(&self, handler: S) -> Self::Service {
        let recovered = self.recovery.layer(handler);
        let authorized = self.auth.layer(recovered);
        self.logger.layer(authorized)
    }
}
