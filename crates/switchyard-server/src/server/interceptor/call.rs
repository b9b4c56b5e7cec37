//! Per-call envelope seen by every interceptor.
//!
//! The dispatcher converts each transport request into an [`RpcCall`]: the
//! message (or message stream) plus a [`CallContext`] holding everything the
//! interceptors and streaming halves need without knowing the message type.

use core::fmt;
use core::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::Request;
use tonic::metadata::MetadataMap;

const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// Shape of a call, as far as interceptors care.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CallKind {
    Unary,
    ClientStream,
    BidiStream,
}

impl CallKind {
    pub const fn is_streaming(self) -> bool {
        !matches!(self, Self::Unary)
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_streaming() {
            f.write_str("stream")
        } else {
            f.write_str("unary")
        }
    }
}

/// Transport-derived facts about one in-flight call.
///
/// Cheap to clone; the cancellation token is shared between clones so a
/// cancel from the dispatcher reaches every streaming half of the call.
#[derive(Clone, Debug)]
pub struct CallContext {
    procedure: &'static str,
    kind: CallKind,
    metadata: MetadataMap,
    deadline: Option<Instant>,
    cancellation: CancellationToken,
}

impl CallContext {
    pub fn new(procedure: &'static str, kind: CallKind, metadata: MetadataMap) -> Self {
        let deadline = metadata
            .get(GRPC_TIMEOUT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_grpc_timeout)
            .map(|timeout| Instant::now() + timeout);

        Self {
            procedure,
            kind,
            metadata,
            deadline,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn from_request<T>(procedure: &'static str, kind: CallKind, request: &Request<T>) -> Self {
        Self::new(procedure, kind, request.metadata().clone())
    }

    /// gRPC path, e.g. `/crud.v1.CrudService/Create`.
    pub const fn procedure(&self) -> &'static str {
        self.procedure
    }

    pub const fn kind(&self) -> CallKind {
        self.kind
    }

    pub const fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

/// A call travelling through the interceptor chain.
#[derive(Debug)]
pub struct RpcCall<T> {
    pub context: CallContext,
    pub message: T,
}

impl<T> RpcCall<T> {
    pub const fn new(context: CallContext, message: T) -> Self {
        Self { context, message }
    }
}

/// Parses a `grpc-timeout` header value: at most eight ASCII digits followed
/// by one unit character (`H`, `M`, `S`, `m`, `u`, `n`).
fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if value.len() < 2 || value.len() > 9 {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    let timeout = match unit {
        "H" => Duration::from_secs(amount * 60 * 60),
        "M" => Duration::from_secs(amount * 60),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(timeout)
}
