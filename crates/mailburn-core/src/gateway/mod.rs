//! Mailbox gateway.
//!
//! [`MailboxApi`] speaks the service's query-string protocol. It answers
//! for any address. [`MailboxGateway`] wraps it and refuses to touch
//! addresses this client does not track.

mod api;
mod facade;
mod model;

pub use api::{Action, DEFAULT_BASE_URL, MailboxApi};
pub use facade::{AddressRegistry, MailboxGateway};
pub use model::{AttachmentInfo, MessageDetail, MessageHeader};
