pub mod capacity;
pub mod document;
pub mod event;
pub mod login;
pub mod message;
pub mod profile;

pub use capacity::{Capacity, SkillRecord};
pub use document::DocumentPayload;
pub use event::EventPayload;
pub use login::{CallbackRequest, LoginResult, OAuthHostRecord};
pub use message::{EmailableRequest, MessagePayload};
pub use profile::ProfileUpdate;
