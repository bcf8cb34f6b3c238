pub mod api_client;
pub mod invitation_repository;
pub mod link_repository;
pub mod notification_repository;

pub use api_client::ApiClient;
pub use invitation_repository::InvitationApi;
pub use link_repository::LinkApi;
pub use notification_repository::HttpNotificationDispatcher;
