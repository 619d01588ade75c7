//! Retry policy for register fetches.
//!
//! Classifies transport and HTTP failures into transient or permanent errors and runs
//! a fetch in a bounded loop with a fixed delay between attempts. Exhausted retries
//! degrade to an empty result instead of an error.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify_curl_error, classify_http_status};
pub use error::{ErrorKind, FetchError};
pub use policy::{RetryDecision, RetryPolicy};
pub use run::{fetch_with_retry, FetchOutcome};
