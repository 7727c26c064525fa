//! Resolution services
//!
//! Health tracker and result cache are shared state owned by the caller and
//! injected into the resolvers; nothing here is a global.

pub mod address_search;
pub mod batch_resolver;
pub mod batch_stats;
pub mod health_tracker;
pub mod result_cache;
pub mod single_lookup;

pub use address_search::{validate_query, AddressSearchResolver, STATE_CODES};
pub use batch_resolver::{
    BatchControl, BatchItem, BatchReport, BatchResolver, BatchResult, BatchSettings,
};
pub use batch_stats::{estimate_processing_time, parse_batch_input, BatchStats, ParsedBatchInput};
pub use health_tracker::{HealthTracker, DEFAULT_PROBE_REFERENCE};
pub use result_cache::ResultCache;
pub use single_lookup::{
    LookupMode, LookupOutcome, SingleLookupResolver, SYSTEM_SOURCE, UNIFIED_SOURCE_NAME,
};
