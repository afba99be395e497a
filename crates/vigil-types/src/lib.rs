pub mod alert;
pub mod channel;
pub mod severity;

pub use alert::{Alert, AlertContext, RuleKind};
pub use channel::ChannelKind;
pub use severity::Severity;
