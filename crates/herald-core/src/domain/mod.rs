//! Domain model (ids, messages, records, failure classification, errors).

pub mod errors;
pub mod failure;
pub mod ids;
pub mod kind;
pub mod message;
pub mod record;

pub use self::errors::{ErrorKind, HandlerError};
pub use self::failure::{FailedMessageQueueAction, FailedMessageReason, FailureRecord};
pub use self::ids::HandlingId;
pub use self::kind::{DeserializedBody, TypeTag};
pub use self::message::{Delivery, Message, MessageId, Route};
pub use self::record::{HandlingRecord, MessageInformation};
