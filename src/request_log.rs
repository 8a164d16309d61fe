//! Bounded in-memory request log.
//!
//! Two FIFO ring buffers are kept: every bridge request (100 entries) and the
//! requests that look like they came from a recognized client (50 entries).
//! Nothing is persisted; the buffers live as long as the server instance.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

pub const ALL_REQUESTS_CAPACITY: usize = 100;
pub const RECOGNIZED_CAPACITY: usize = 50;
const USER_AGENT_LIMIT: usize = 100;
const PREVIEW_LIMIT: usize = 200;
const CLIENT_MARKER: &str = "cursor";

/// Fixed-capacity FIFO; appending beyond capacity evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> RingBuffer<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        while self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    /// Up to `n` most recent entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<T> {
        let skip = self.items.len().saturating_sub(n);
        self.items.iter().skip(skip).cloned().collect()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

/// Where a request came from, as far as the user-agent tells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestSource {
    Cursor,
    Other,
}

impl RequestSource {
    pub fn from_user_agent(user_agent: &str) -> Self {
        if contains_marker(user_agent) {
            Self::Cursor
        } else {
            Self::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cursor => "cursor",
            Self::Other => "other",
        }
    }
}

fn contains_marker(value: &str) -> bool {
    value.to_ascii_lowercase().contains(CLIENT_MARKER)
}

/// Whether a request counts as coming from the recognized client.
pub fn is_recognized_client(user_agent: &str, endpoint: &str) -> bool {
    contains_marker(user_agent) || contains_marker(endpoint)
}

/// First `limit` characters of `s` (not bytes).
pub fn truncate_chars(s: &str, limit: usize) -> String {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub endpoint: String,
    pub status: u16,
    pub source: RequestSource,
    pub user_agent: String,
    pub data_preview: Option<String>,
}

impl LogEntry {
    /// Build an entry stamped with the current local time; header and payload are truncated.
    pub fn new(endpoint: &str, status: u16, user_agent: Option<&str>, data: Option<&str>) -> Self {
        let user_agent = user_agent.unwrap_or("unknown");
        Self {
            timestamp: chrono::Local::now().to_rfc3339(),
            endpoint: endpoint.to_string(),
            status,
            source: RequestSource::from_user_agent(user_agent),
            user_agent: truncate_chars(user_agent, USER_AGENT_LIMIT),
            data_preview: data
                .filter(|d| !d.is_empty())
                .map(|d| truncate_chars(d, PREVIEW_LIMIT)),
        }
    }

    pub fn is_recognized(&self) -> bool {
        is_recognized_client(&self.user_agent, &self.endpoint)
    }
}

/// Point-in-time copy of the log used by the reporting endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct LogSnapshot {
    pub total_requests: usize,
    pub recognized_requests: usize,
    pub last_recognized: Option<LogEntry>,
    pub recent: Vec<LogEntry>,
}

struct Buffers {
    all: RingBuffer<LogEntry>,
    recognized: RingBuffer<LogEntry>,
}

/// Both ring buffers behind a single lock.
pub struct RequestLog {
    inner: Mutex<Buffers>,
}

impl RequestLog {
    pub fn new() -> Self {
        Self::with_capacities(ALL_REQUESTS_CAPACITY, RECOGNIZED_CAPACITY)
    }

    pub fn with_capacities(all: usize, recognized: usize) -> Self {
        Self {
            inner: Mutex::new(Buffers {
                all: RingBuffer::with_capacity(all),
                recognized: RingBuffer::with_capacity(recognized),
            }),
        }
    }

    pub fn append(&self, entry: LogEntry) {
        let mut buffers = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if entry.is_recognized() {
            buffers.recognized.push(entry.clone());
        }
        buffers.all.push(entry);
    }

    /// Counts, the newest recognized entry and the `recent` newest entries (oldest first).
    pub fn snapshot(&self, recent: usize) -> LogSnapshot {
        let buffers = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        LogSnapshot {
            total_requests: buffers.all.len(),
            recognized_requests: buffers.recognized.len(),
            last_recognized: buffers.recognized.last().cloned(),
            recent: buffers.all.recent(recent),
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .all
            .to_vec()
    }
}

impl Default for RequestLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn ring_buffer_keeps_most_recent_oldest_first() {
        let mut buf = RingBuffer::with_capacity(3);
        for i in 0..5 {
            buf.push(i);
            assert!(buf.len() <= 3);
        }
        assert_eq!(buf.to_vec(), vec![2, 3, 4]);
        assert_eq!(buf.last(), Some(&4));
        assert_eq!(buf.recent(2), vec![3, 4]);
        assert_eq!(buf.recent(10), vec![2, 3, 4]);
    }

    #[test]
    fn zero_capacity_buffer_stays_empty() {
        let mut buf = RingBuffer::with_capacity(0);
        buf.push("x");
        assert!(buf.is_empty());
    }

    #[test]
    fn classifies_by_header_or_endpoint() {
        assert!(is_recognized_client("Cursor/0.42 (darwin)", "/health"));
        assert!(is_recognized_client("curl/8.0", "/api/CURSOR/filter"));
        assert!(!is_recognized_client("curl/8.0", "/health"));
        assert_eq!(RequestSource::from_user_agent("CURSOR"), RequestSource::Cursor);
        assert_eq!(RequestSource::from_user_agent("unknown"), RequestSource::Other);
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        let ua = "a".repeat(150);
        let body = "b".repeat(500);
        let entry = LogEntry::new("/x", 200, Some(ua.as_str()), Some(body.as_str()));
        assert_eq!(entry.user_agent.len(), 100);
        assert_eq!(entry.data_preview.map(|p| p.len()), Some(200));
        let anon = LogEntry::new("/x", 200, None, None);
        assert_eq!(anon.user_agent, "unknown");
        assert!(anon.data_preview.is_none());
    }

    #[test]
    fn duplicates_recognized_entries() {
        let log = RequestLog::new();
        log.append(LogEntry::new("/health", 200, Some("curl/8.0"), None));
        log.append(LogEntry::new("/health", 200, Some("Cursor/1.0"), None));
        log.append(LogEntry::new("/api/cursor/filter", 400, Some("curl/8.0"), None));

        let snap = log.snapshot(10);
        assert_eq!(snap.total_requests, 3);
        assert_eq!(snap.recognized_requests, 2);
        let last = snap.last_recognized.unwrap();
        assert_eq!(last.endpoint, "/api/cursor/filter");
        assert_eq!(last.source, RequestSource::Other);
        assert_eq!(snap.recent.len(), 3);
    }

    #[test]
    fn buffers_evict_independently() {
        let log = RequestLog::with_capacities(4, 2);
        for i in 0..6 {
            log.append(LogEntry::new("/api/cursor/filter", 200 + i, None, None));
        }
        let snap = log.snapshot(10);
        assert_eq!(snap.total_requests, 4);
        assert_eq!(snap.recognized_requests, 2);
        assert_eq!(
            snap.recent.iter().map(|e| e.status).collect::<Vec<_>>(),
            vec![202, 203, 204, 205]
        );
        assert_eq!(snap.last_recognized.map(|e| e.status), Some(205));
    }

    #[test]
    fn concurrent_appends_never_exceed_capacity() {
        let log = Arc::new(RequestLog::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let ua = if t % 2 == 0 { "Cursor" } else { "curl" };
                        log.append(LogEntry::new("/health", 200, Some(ua), None));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let snap = log.snapshot(usize::MAX);
        assert_eq!(snap.total_requests, ALL_REQUESTS_CAPACITY);
        assert_eq!(snap.recognized_requests, RECOGNIZED_CAPACITY);
        assert_eq!(log.entries().len(), ALL_REQUESTS_CAPACITY);
    }
}
