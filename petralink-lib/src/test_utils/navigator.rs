//! Navigator that records instead of navigating.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use url::Url;

use crate::transport::Navigator;

/// Records dispatched URLs.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    mobile: AtomicBool,
    visited: Mutex<Vec<Url>>,
    consumed: AtomicUsize,
}

impl RecordingNavigator {
    /// A navigator reporting a mobile runtime.
    pub fn mobile() -> Self {
        Self {
            mobile: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// A navigator reporting a desktop runtime.
    pub fn desktop() -> Self {
        Self::default()
    }

    pub fn set_mobile(&self, mobile: bool) {
        self.mobile.store(mobile, Ordering::SeqCst);
    }

    /// All URLs dispatched so far, oldest first.
    pub fn visited(&self) -> Vec<Url> {
        self.visited.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// The most recently dispatched URL.
    pub fn last(&self) -> Option<Url> {
        self.visited.lock().ok().and_then(|v| v.last().cloned())
    }

    /// How many times a response location was consumed.
    pub fn consumed(&self) -> usize {
        self.consumed.load(Ordering::SeqCst)
    }
}

impl Navigator for RecordingNavigator {
    fn is_mobile(&self) -> bool {
        self.mobile.load(Ordering::SeqCst)
    }

    fn navigate(&self, url: &Url) {
        if let Ok(mut visited) = self.visited.lock() {
            visited.push(url.clone());
        }
    }

    fn consume_response_location(&self) {
        self.consumed.fetch_add(1, Ordering::SeqCst);
    }
}
