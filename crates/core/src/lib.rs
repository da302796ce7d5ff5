// Core types and functionality for the Promgate metrics gateway

pub mod aws;
pub mod backend;
pub mod sigv4;
pub mod amp;

pub use amp::AmpClient;
pub use aws::{AwsCredentials, AwsSettings};
pub use backend::{
    BackendError, BackendResult, MetricsBackend, RangeQuery, WorkspaceSummary, WorkspaceTarget,
};
