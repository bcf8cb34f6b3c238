//! Patient → professional invitations and the billed links they turn into.
//!
//! [`services::InvitationService`] runs the lifecycle against the remote
//! API, mirrors results into [`store::InvitationStore`], and hands
//! notifications to a background [`services::NotificationQueue`].

pub mod app_state;
pub mod config;
pub mod errors;
pub mod models;
pub mod repositories;
pub mod services;
pub mod store;
pub mod utils;

pub use errors::{DomainError, ErrorKind, Field, RemoteError};
