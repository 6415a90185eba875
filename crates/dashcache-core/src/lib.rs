//! Dashcache Core: query descriptors, time ranges, backend response model,
//! configuration and the shared error type.

pub mod config;
pub mod error;
pub mod query;
pub mod range;
pub mod response;

pub use config::{DashcacheConfig, EngineConfig, ListenNetwork};
pub use error::{Error, Result};
pub use query::QueryDescriptor;
pub use range::TimeRange;
pub use response::{PromResponse, QueryData, QueryResult, ResultType, Sample, SampleValue, Series};
