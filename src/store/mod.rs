pub mod invitation_store;
pub mod types;

pub use invitation_store::InvitationStore;
pub use types::{StoreEvent, StoreSnapshot};
