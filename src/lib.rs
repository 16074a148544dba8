pub mod classify;
pub mod config;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod limits;
pub mod model;
pub mod observability;
pub mod service;
pub mod snapshot;
pub mod store;

pub use classify::{classify, Bucket, BucketCounts};
pub use directory::{Directory, DirectoryAdmin, InMemoryDirectory};
pub use error::{AllocationError, EntityKind};
pub use model::*;
pub use service::AllocationService;
pub use store::{AssignmentStore, LoadReport};
