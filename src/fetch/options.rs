//! Per-request options and dispatch outcome

/// Caller flags for a single fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Go to the network even after a cache hit; the caller then receives
    /// the cached result first and the network result second
    pub force_remote_fetching: bool,
    /// Keep a network result in the memory tier
    pub cache_in_memory: bool,
    /// Persist a network result in the disk tier
    pub cache_in_disk: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            force_remote_fetching: false,
            cache_in_memory: false,
            cache_in_disk: true,
        }
    }
}

impl FetchOptions {
    /// Set `force_remote_fetching`
    pub fn force_remote(mut self, force: bool) -> Self {
        self.force_remote_fetching = force;
        self
    }

    /// Set `cache_in_memory`
    pub fn in_memory(mut self, cache: bool) -> Self {
        self.cache_in_memory = cache;
        self
    }

    /// Set `cache_in_disk`
    pub fn in_disk(mut self, cache: bool) -> Self {
        self.cache_in_disk = cache;
        self
    }
}

/// What a `fetch` call did before returning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// URL was invalid; the callback receives `InvalidRequestData`
    Rejected,
    /// Memory hit; no further work was queued
    ServedFromMemory,
    /// Work was queued on the serial worker
    Submitted,
}
