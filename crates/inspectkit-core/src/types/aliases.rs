//! Type aliases for commonly used shared types.
//!
//! The aliases give lock-wrapped and callback types names that convey intent
//! and keep the same lock implementation (`parking_lot`) across crates.
//!
//! ```rust,ignore
//! use inspectkit_core::types::*;
//!
//! // Instead of: Arc<Mutex<Vec<String>>>
//! let log: ThreadSafe<Vec<String>> = thread_safe(Vec::new());
//! log.lock().push("captured".into());
//! ```

use parking_lot::Mutex;
use std::sync::Arc;

/// A thread-safe, mutex-protected wrapper for cross-thread sharing.
///
/// Uses `parking_lot::Mutex`, which never poisons, so a panicking worker
/// cannot wedge the status reporter.
pub type ThreadSafe<T> = Arc<Mutex<T>>;

/// A callback that receives a single parameter.
///
/// Thread-safe, suitable for cross-thread data notification.
pub type DataCallback<T> = Box<dyn Fn(T) + Send + Sync>;

/// Create a new thread-safe value.
#[inline]
pub fn thread_safe<T>(value: T) -> ThreadSafe<T> {
    Arc::new(Mutex::new(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_thread_safe_across_threads() {
        let counter: ThreadSafe<u32> = thread_safe(0);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = counter.clone();
                thread::spawn(move || *counter.lock() += 1)
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*counter.lock(), 4);
    }

    #[test]
    fn test_callback_is_shareable() {
        let seen = thread_safe(Vec::new());
        let sink = seen.clone();
        let callback: DataCallback<u8> = Box::new(move |v| sink.lock().push(v));
        let callback = Arc::new(callback);

        let remote = callback.clone();
        thread::spawn(move || remote(7)).join().unwrap();
        callback(9);
        assert_eq!(*seen.lock(), vec![7, 9]);
    }
}
