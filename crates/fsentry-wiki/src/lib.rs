//! fsentry-wiki
//!
//! Boundary to the remote MediaWiki action API.
//!
//! Every remote operation is one variant of the closed [`Action`] set and goes
//! through a single [`ActionExecutor::execute`] call that returns the matching
//! [`ActionOutcome`] variant. [`MediaWikiApi`] is the HTTP-backed executor;
//! [`ApiRevisionRepository`] turns the raw actions into the handful of reads
//! the suppression pipeline needs.

mod action;
mod api;
mod error;
mod model;
mod repository;
mod response;

pub use action::{
    Action, ActionOutcome, FetchRevisions, ListChanges, SuppressReport, SuppressRevisions,
    CHANGES_LIMIT, HISTORY_LIMIT,
};
pub use api::{ActionExecutor, MediaWikiApi};
pub use error::ApiError;
pub use model::{ChangeEvent, RevisionId, UserInfo, SUPPRESS_RIGHT};
pub use repository::{split_allow_list, ApiRevisionRepository, RevisionRepository};
