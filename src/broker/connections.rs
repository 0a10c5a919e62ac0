//! Live connection table
//!
//! The single owner of every registered `ConnectionHandle`. Topics only keep
//! `ConnectionId`s; removing an entry here is what makes a connection
//! unreachable for fan-out.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

use crate::broker::message::{Message, StatusCode};
use crate::client::{ConnectionHandle, ConnectionId};

#[derive(Debug, Default)]
pub struct ConnectionTable {
    handles: DashMap<ConnectionId, ConnectionHandle>,
    // slots reserved by `try_insert`; the limit is checked against this
    admitted: AtomicUsize,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` unless `limit` connections are already admitted.
    pub fn try_insert(&self, handle: ConnectionHandle, limit: usize) -> bool {
        let reserved = self
            .admitted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .is_ok();
        if !reserved {
            return false;
        }
        if self.handles.insert(handle.id(), handle).is_some() {
            self.admitted.fetch_sub(1, Ordering::AcqRel);
        }
        true
    }

    pub fn remove(&self, id: &ConnectionId) -> Option<ConnectionHandle> {
        let (_, handle) = self.handles.remove(id)?;
        self.admitted.fetch_sub(1, Ordering::AcqRel);
        Some(handle)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.handles.contains_key(id)
    }

    /// Push `message` to connection `id`; an unknown id counts as closed.
    pub fn deliver(&self, id: &ConnectionId, message: &Message) -> StatusCode {
        match self.handles.get(id) {
            Some(handle) => handle.deliver(message),
            None => StatusCode::ConnectionClosed,
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
