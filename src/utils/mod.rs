pub mod invitation_validator;
pub mod time;
