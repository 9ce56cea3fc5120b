//! Deterministic pagination of reconstructed sessions.
//!
//! Sessions are ordered by `start_time` descending (most recent activity
//! first), ties broken by `session_id` ascending. Pages are 1-based. A page
//! past the end is empty but still reports the real totals, so a client
//! polling while the log grows never gets an error for overshooting.

use crate::error::{ActivityError, Result};
use crate::models::{Page, Session};

/// A validated `(page, page_size)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    /// Fails with [`ActivityError::InvalidArgument`] when either value is
    /// below 1.
    pub fn new(page: i64, page_size: i64) -> Result<Self> {
        if page < 1 {
            return Err(ActivityError::InvalidArgument(format!(
                "page must be >= 1, got {}",
                page
            )));
        }
        if page_size < 1 {
            return Err(ActivityError::InvalidArgument(format!(
                "page_size must be >= 1, got {}",
                page_size
            )));
        }
        Ok(Self {
            page: page as u64,
            page_size: page_size as u64,
        })
    }

    pub fn paginate(&self, mut sessions: Vec<Session>) -> Page<Session> {
        sort_sessions(&mut sessions);

        let total_count = sessions.len() as u64;
        let total_pages = total_count.div_ceil(self.page_size);
        let offset = (self.page - 1).saturating_mul(self.page_size);

        let items: Vec<Session> = if offset >= total_count {
            Vec::new()
        } else {
            sessions
                .into_iter()
                .skip(offset as usize)
                .take(self.page_size as usize)
                .collect()
        };

        Page {
            items,
            page: self.page,
            page_size: self.page_size,
            total_count,
            total_pages,
        }
    }
}

/// Sort by `start_time` descending, then `session_id` ascending.
pub fn sort_sessions(sessions: &mut [Session]) {
    sessions.sort_by(|a, b| {
        b.start_time
            .cmp(&a.start_time)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });
}

/// Validate `page` / `page_size` and slice `sessions`.
pub fn paginate(sessions: Vec<Session>, page: i64, page_size: i64) -> Result<Page<Session>> {
    Ok(PageRequest::new(page, page_size)?.paginate(sessions))
}
