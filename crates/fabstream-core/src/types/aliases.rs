//! Type aliases for commonly used shared-state types.
//!
//! `Arc<Mutex<Vec<String>>>` shows up wherever a sink or event handler
//! records data on behalf of another task; the aliases keep signatures short.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fabstream_core::types::*;
//!
//! let sent: ThreadSafeVec<String> = thread_safe_vec();
//! sent.lock().push("G28".to_string());
//! ```

use parking_lot::Mutex;
use std::sync::Arc;

/// A thread-safe vector for recording values across threads.
///
/// Uses `parking_lot::Mutex`, so locking never returns a poison error.
pub type ThreadSafeVec<T> = Arc<Mutex<Vec<T>>>;

/// Create a new empty `ThreadSafeVec<T>`.
#[inline]
pub fn thread_safe_vec<T>() -> ThreadSafeVec<T> {
    Arc::new(Mutex::new(Vec::new()))
}
