//! Trailing-edge debounce for filter input
//!
//! Every input updates the filter set right away and (re)starts a single quiet
//! period timer. When the timer runs out the callback receives the filter set
//! as it is at that moment. Only the wait is cancellable: once the callback
//! has been handed off it runs to completion even if more input arrives.

use std::future::Future;
use std::time::Duration;

use shared::{FilterKey, FilterSet};
use tokio::task::JoinHandle;

/// Single-timer debouncer owning the current filter values
#[derive(Debug)]
pub struct FilterDebouncer {
    filters: FilterSet,
    quiet: Duration,
    timer: Option<JoinHandle<()>>,
}

impl FilterDebouncer {
    pub fn new(quiet: Duration, filters: FilterSet) -> Self {
        Self {
            filters,
            quiet,
            timer: None,
        }
    }

    /// Record a filter edit and schedule `fire` after the quiet period.
    ///
    /// Any previously scheduled callback that has not fired yet is dropped.
    pub fn on_filter_input<F, Fut>(&mut self, key: FilterKey, value: impl Into<String>, fire: F)
    where
        F: FnOnce(FilterSet) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.filters.set(key, value);
        self.schedule(fire);
    }

    /// Blank every filter and schedule `fire` after the quiet period
    pub fn clear_filters<F, Fut>(&mut self, fire: F)
    where
        F: FnOnce(FilterSet) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.filters.clear();
        self.schedule(fire);
    }

    /// Restart the quiet period without changing any filter
    pub fn schedule<F, Fut>(&mut self, fire: F)
    where
        F: FnOnce(FilterSet) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        let quiet = self.quiet;
        let filters = self.filters.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            // Detached: later input must not abort a fetch in flight
            tokio::spawn(fire(filters));
        }));
    }

    /// Drop the scheduled callback, if it has not fired yet
    pub fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// Whether a callback is waiting for the quiet period to end
    pub fn is_scheduled(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }
}

impl Drop for FilterDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
