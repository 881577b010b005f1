pub mod credentials;
pub mod mailbox;
pub mod message;

pub use credentials::WebhookCredentials;
pub use mailbox::Mailbox;
pub use message::{AttachmentDescriptor, StoredMessage};
