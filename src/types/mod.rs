pub mod error;
pub mod row;

// Common type aliases
pub type PageNumber = u32;
pub type Key = u32;

// The unit of I/O and caching
pub const PAGE_SIZE: usize = 4096;

// Default ceiling on the page cache / backing file, in pages. Hitting it
// surfaces as DatabaseError::TableFull rather than a crash.
pub const DEFAULT_MAX_PAGES: u32 = 100;

// On-disk sentinel for "no right child assigned yet". Distinct from every
// real page number, including 0 (page 0 is always the tree root). Never
// exposed through the API; callers see Option<PageNumber>.
pub const INVALID_PAGE_NUM: PageNumber = u32::MAX;
