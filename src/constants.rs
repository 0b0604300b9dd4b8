/// Maximum optimistic-concurrency retries for one learner write.
pub const MAX_CAS_RETRIES: u32 = 20;

/// Longest accepted `timeSpent` for one attempt, in seconds (one day).
pub const MAX_TIME_SPENT_SECS: f64 = 86_400.0;

/// Default number of attempts returned by the history endpoint.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Upper bound on the history endpoint page size.
pub const MAX_HISTORY_LIMIT: usize = 100;

/// Default page size for catalog listings.
pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// Upper bound on catalog listing page size.
pub const MAX_PAGE_SIZE: u64 = 200;

/// Header carrying the learner id set by the upstream gateway.
pub const LEARNER_ID_HEADER: &str = "x-learner-id";
