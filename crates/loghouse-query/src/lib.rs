//! Federated query engine.
//!
//! Reads compose two stores: a filtered, paginated scan of the index store
//! selects matching rows, then each row is hydrated with its payload from
//! the payload store by point lookup on the record identity. A hydration
//! miss — the payload row absent, or the payload store failing — degrades
//! that row to an absent payload and is logged; **partial results are a
//! normal, documented outcome, not an error**. The aggregation path runs a
//! single grouped query against the index store and never touches the
//! payload store.
//!
//! Access control is the caller's job: handlers check the project grant
//! before invoking anything here.

pub mod error;
pub mod federator;
pub mod filter;
pub mod record;

pub use error::{QueryError, Result};
pub use federator::{Aggregator, QueryFederator, MAX_LIMIT};
pub use filter::parse_search_keys;
pub use record::LogRecord;
