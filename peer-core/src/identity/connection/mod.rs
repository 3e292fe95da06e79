//! `connection` implements the `DID Exchange` handshake
//!
//! Two agents build a pairwise relationship from an out of band invitation with three
//! messages: the requester sends a request, the responder answers with a response and
//! the requester closes the thread with a complete message. Both sides exchange a peer
//! did and prove its document through signed attachments.
//!
//! Storage and key management are collaborators expressed as traits,
//! [`ConnectionRepoBuilder`] and [`KeyManagementBuilder`], the peer dids are stored through
//! [`crate::identity::peer::DidRepoBuilder`].
pub mod types;
pub use types::{
    routing_to_services, ConnectionError, ConnectionRepoBuilder, DidExchangeState, KeyHandle,
    KeyManagementBuilder, OutOfBandInvitation, OutOfBandRecord, OutOfBandRole, ProblemCode,
    ResolvedService, Role, Routing, DID_EXCHANGE_PROTOCOL,
};

pub mod messages;
pub use messages::{
    Attachment, CompleteMessage, ExchangeMessageKind, ParsedMessageType, ProblemReportMessage,
    RequestMessage, ResponseMessage,
};

pub mod record;
pub use record::{ConnectionQuery, ConnectionRecord};

pub mod jws;
pub use jws::{SignedData, VerifiedAttachment};

mod state_machine;
pub use state_machine::DidExchangeStateMachine;

pub mod config;
pub use config::ExchangeConfig;

mod protocol;
pub use protocol::{DidExchangeProtocol, RequestParams};

#[cfg(test)]
mod fixtures;
