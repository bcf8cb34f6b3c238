pub mod invitation;
pub mod link;
pub mod money;

pub use invitation::{
    CreateInvitationRequest, Invitation, InvitationEnvelope, InvitationPage, InvitationStatus,
    Inviter, NewInvitation, RespondAction, RespondRequest, RespondResponse, INVITATION_TTL_DAYS,
};
pub use link::{Link, LinkEnvelope, LinkList, LinkStatus, UnlinkRequest, UpdateFeeRequest};
pub use money::{Money, MoneyParseError};
