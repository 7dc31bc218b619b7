//! Writer reuse pool.
//!
//! # Responsibilities
//! - Recycle `BufferedResponseWriter` instances across requests
//! - Reset every field on acquire and on release
//! - Never retain a reference to a released writer's sink
//!
//! # Design Decisions
//! - Bounded: writers released beyond `max_idle` are dropped
//! - A process-wide instance is available through `WriterPool::global`

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::observability::metrics;
use crate::response::sink::SharedSink;
use crate::response::writer::BufferedResponseWriter;

/// Default number of idle writers kept by the global pool.
pub const DEFAULT_MAX_IDLE: usize = 1024;

static GLOBAL_POOL: OnceLock<Arc<WriterPool>> = OnceLock::new();

/// A bounded pool of idle response writers.
#[derive(Debug)]
pub struct WriterPool {
    idle: Mutex<Vec<BufferedResponseWriter>>,
    max_idle: usize,
}

impl WriterPool {
    /// Create a pool keeping at most `max_idle` writers.
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    /// The process-wide pool.
    pub fn global() -> Arc<WriterPool> {
        GLOBAL_POOL
            .get_or_init(|| Arc::new(WriterPool::new(DEFAULT_MAX_IDLE)))
            .clone()
    }

    /// Take a writer bound to `sink`, reusing an idle one when available.
    pub fn acquire(&self, sink: SharedSink) -> BufferedResponseWriter {
        let mut writer = self.lock().pop().unwrap_or_default();
        writer.attach(sink);
        writer
    }

    /// Return a writer to the pool. Its sink reference is dropped immediately.
    pub fn release(&self, mut writer: BufferedResponseWriter) {
        writer.detach();

        let mut idle = self.lock();
        if idle.len() < self.max_idle {
            idle.push(writer);
        }
        metrics::record_pool_idle(idle.len());
    }

    pub fn idle_count(&self) -> usize {
        self.lock().len()
    }

    pub fn max_idle(&self) -> usize {
        self.max_idle
    }

    fn lock(&self) -> MutexGuard<'_, Vec<BufferedResponseWriter>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for WriterPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE)
    }
}
