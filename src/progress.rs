//! Progress-callback trait for per-document batch events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as [`crate::batch::convert_batch`] works through its inputs.
//! Single-document conversions finish in milliseconds and emit no events.
//!
//! # Example
//!
//! ```rust
//! use edgequake_txt2doc::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, index: usize, total: usize, size_bytes: u64) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Document {}/{} done ({} bytes)", index + 1, total, size_bytes);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch pipeline as it processes each document.
///
/// Implementations must be `Send + Sync`: documents are rendered
/// concurrently on the blocking thread pool. All methods have default
/// no-op implementations so callers only override what they care about.
/// When a batch targets several formats, each (input, format) pair counts
/// as one document.
///
/// # Thread safety
///
/// `on_document_start`, `on_document_complete` and `on_document_error` may
/// be called concurrently and out of order. Protect shared mutable state
/// with `Mutex` or atomics.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before any document is rendered.
    ///
    /// # Arguments
    /// * `total` — number of documents in the batch
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before a document is read and rendered.
    ///
    /// # Arguments
    /// * `index` — 0-indexed position in the batch
    /// * `total` — batch size
    /// * `name`  — display name of the input
    fn on_document_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when a document artifact was produced.
    ///
    /// # Arguments
    /// * `index`      — 0-indexed position in the batch
    /// * `total`      — batch size
    /// * `size_bytes` — byte size of the finished artifact
    fn on_document_complete(&self, index: usize, total: usize, size_bytes: u64) {
        let _ = (index, total, size_bytes);
    }

    /// Called when a document could not be converted.
    ///
    /// # Arguments
    /// * `index` — 0-indexed position in the batch
    /// * `total` — batch size
    /// * `error` — human-readable error description
    fn on_document_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every document has been attempted.
    ///
    /// # Arguments
    /// * `total`         — batch size
    /// * `success_count` — documents that converted without error
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
