//! Sequential offset pagination on top of the gateway.
//!
//! Pages are requested strictly one after another. Running them in parallel would only
//! burn through the request window faster and trip the soft throttle.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ErrorSignal, GatewayError};

/// Items gathered by [`Paginator::fetch_all`].
#[derive(Debug, Clone)]
pub struct Collected<T> {
    pub items: Vec<T>,
    /// Pagination stopped before the collection was exhausted.
    pub partial: bool,
    /// Pages skipped because the upstream refused access to them.
    pub skipped: usize,
    pub last_error: Option<ErrorSignal>,
}

impl<T> Collected<T> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            partial: false,
            skipped: 0,
            last_error: None,
        }
    }

    /// Whether some of the collection may be missing.
    pub fn is_degraded(&self) -> bool {
        self.partial || self.skipped > 0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    page_size: usize,
    max_items: usize,
    failure_budget: u32,
}

impl Paginator {
    pub fn new(page_size: usize, max_items: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            max_items,
            failure_budget: 3,
        }
    }

    /// Number of consecutive failed pages tolerated before giving up with a partial result.
    pub fn with_failure_budget(mut self, failure_budget: u32) -> Self {
        self.failure_budget = failure_budget;
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Materializes a collection page by page.
    ///
    /// `fetch_page(offset, limit)` is called with increasing offsets until a page comes back
    /// empty or short, `max_items` are collected, or the failure budget is exhausted. A failed
    /// page is retried at the same offset; a `Forbidden` page is skipped. Both count against
    /// the consecutive failure budget, which any successful page resets.
    ///
    /// # Errors
    ///
    /// Only `Unauthorized` aborts the whole operation. Every other failure ends in a
    /// partial result so the caller can still work with what was collected.
    pub async fn fetch_all<T, F, Fut>(
        &self,
        mut fetch_page: F,
        cancel: &CancellationToken,
    ) -> Result<Collected<T>, GatewayError>
    where
        F: FnMut(usize, usize) -> Fut,
        Fut: Future<Output = Result<Vec<T>, GatewayError>>,
    {
        let mut collected = Collected::new();
        let mut offset = 0;
        let mut failures = 0u32;

        while collected.items.len() < self.max_items {
            if cancel.is_cancelled() {
                debug!(offset, "pagination cancelled");
                collected.partial = true;
                break;
            }

            match fetch_page(offset, self.page_size).await {
                Ok(page) => {
                    failures = 0;
                    let received = page.len();
                    let room = self.max_items - collected.items.len();
                    collected.items.extend(page.into_iter().take(room));

                    if received < self.page_size {
                        break;
                    }
                    offset += received;
                }
                Err(err) if err.is_unauthorized() => return Err(err),
                Err(GatewayError::Cancelled) => {
                    collected.partial = true;
                    break;
                }
                Err(err) => {
                    let signal = err.signal();
                    collected.last_error = Some(signal);
                    failures += 1;

                    if signal == ErrorSignal::Forbidden {
                        warn!(offset, "page not accessible, skipping");
                        collected.skipped += 1;
                        offset += self.page_size;
                    } else {
                        warn!(offset, failures, error = %err, "page request failed");
                    }

                    if failures > self.failure_budget {
                        warn!(
                            collected = collected.items.len(),
                            "failure budget exhausted, returning partial result"
                        );
                        collected.partial = true;
                        break;
                    }
                }
            }
        }

        Ok(collected)
    }
}
