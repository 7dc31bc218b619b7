//! The real (unbuffered) response sink.
//!
//! # Responsibilities
//! - Define what the hosting server must provide to receive a committed response
//! - Expose optional capabilities (partial flush, connection hijack)
//!
//! # Design Decisions
//! - Capabilities are queried with `as_flusher` / `as_hijacker`; absence is not an error
//! - Buffered writers and their clones share one sink through `SharedSink`

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::http::{HeaderMap, StatusCode};
use hyper::upgrade::{OnUpgrade, Upgraded};
use hyper_util::rt::TokioIo;

use crate::response::error::ResponseError;

/// A sink shared by a writer and all of its clones.
pub type SharedSink = Arc<Mutex<dyn ResponseSink>>;

/// The underlying, non-buffered response-writing capability.
pub trait ResponseSink: Send {
    /// Headers the sink starts from. A writer's `reset_headers` returns to these.
    fn headers(&self) -> &HeaderMap;

    /// Write the status line and the final header map.
    fn write_header(&mut self, status: StatusCode, headers: &HeaderMap);

    /// Write body bytes.
    fn write_body(&mut self, body: &[u8]) -> io::Result<()>;

    /// Partial flush capability.
    fn as_flusher(&mut self) -> Option<&mut dyn Flusher> {
        None
    }

    /// Connection hijack capability.
    fn as_hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        None
    }
}

/// Sinks able to push already-written data to the client early.
pub trait Flusher {
    fn flush(&mut self) -> io::Result<()>;
}

/// Sinks able to hand the raw connection over to the caller.
pub trait Hijacker {
    fn hijack(&mut self) -> Result<HijackedConnection, ResponseError>;
}

/// A connection taken over from the HTTP server.
///
/// The connection becomes available once the response (normally `101 Switching
/// Protocols`) has been sent. After that the caller owns it entirely.
#[derive(Debug)]
pub struct HijackedConnection {
    upgrade: OnUpgrade,
}

impl HijackedConnection {
    pub fn new(upgrade: OnUpgrade) -> Self {
        Self { upgrade }
    }

    /// Wait for the upgrade to complete and return the raw IO stream.
    pub async fn into_io(self) -> Result<TokioIo<Upgraded>, hyper::Error> {
        let upgraded = self.upgrade.await?;
        Ok(TokioIo::new(upgraded))
    }
}

/// Lock a shared sink. A poisoned lock is still usable: the sink holds plain data.
pub(crate) fn lock_sink(sink: &SharedSink) -> MutexGuard<'_, dyn ResponseSink + 'static> {
    sink.lock().unwrap_or_else(PoisonError::into_inner)
}
