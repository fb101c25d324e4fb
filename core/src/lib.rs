//! Blocking, typed client for the Hub change-management API.
//!
//! # Overview
//! `Transport` performs one authenticated HTTP call per operation and
//! returns either the decoded response or a classified `HubError`
//! (`Generic`, `NotFound`, `AuthenticationFailure`). `Codec` turns request
//! objects into minimal JSON and response bodies back into typed values.
//! `HubService` maps domain operations onto transport calls, with an online
//! and an in-memory implementation.
//!
//! # Design
//! - `Transport` and `Codec` hold no per-call state; share them freely.
//! - Each call is `build_request` → `execute` → `parse_response`, so the
//!   network step can be skipped in tests.
//! - No retries, backoff or pooling of our own: the first terminal outcome
//!   is returned.

pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod service;
pub mod transport;

pub use codec::{Codec, CodecError};
pub use config::{HubConfig, HubSettings};
pub use error::{classify, ErrorDetails, ErrorKind, HubError, Result, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use model::{
    Connection, HubChange, HubChangeLog, HubUser, ListResponse, Operation, OperationChange,
    OperationChangeEvent, OperationEvent, OperationStatus, Organization, Project, RanChangeSet,
};
pub use service::{HubService, MockHubService, OnlineHubService};
pub use transport::Transport;
