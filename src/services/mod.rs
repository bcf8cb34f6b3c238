pub mod error_translator;
pub mod invitation_service;
pub mod link_service;
pub mod notification_service;

pub use invitation_service::InvitationService;
pub use link_service::LinkService;
pub use notification_service::{
    NotificationDispatcher, NotificationError, NotificationJob, NotificationKind, NotificationQueue,
    NotificationQueueConfig,
};
