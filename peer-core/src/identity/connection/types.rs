use derive_more::Display;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::with_errors::thiserror::{self, Error};

use crate::identity::doc::{DidCommV1Service, DocError};
use crate::identity::key::{DidKey, KeyError, KeyType, PublicKey};
use crate::identity::peer::PeerDidError;

use super::messages::ProblemReportMessage;
use super::record::{ConnectionQuery, ConnectionRecord};

pub const DID_EXCHANGE_PROTOCOL: &str = "https://didcomm.org/didexchange/1.x";

/// `ConnectionError` is the error type of the `DID Exchange` handshake
///
/// Only [`ConnectionError::ProblemReport`] is meant to be sent back to the other party,
/// see [`ConnectionError::to_problem_report`]
#[derive(Debug, PartialEq, Error, Clone)]
pub enum ConnectionError {
    #[error("problem report {code}: {reason}")]
    ProblemReport { code: ProblemCode, reason: String },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("missing field: {0}")]
    MissingField(String),

    #[error("routing error: {0}")]
    RoutingError(String),

    #[error("kms error: {0}")]
    KmsError(String),

    #[error("repo error: {0}")]
    RepoError(String),

    #[error("json error: {0}")]
    JSONError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("peer did error: {0}")]
    PeerDidError(#[from] PeerDidError),

    #[error("document error: {0}")]
    DocError(#[from] DocError),

    #[error("key error: {0}")]
    KeyError(#[from] KeyError),
}

impl ConnectionError {
    pub fn problem(code: ProblemCode, reason: impl Into<String>) -> Self {
        ConnectionError::ProblemReport {
            code,
            reason: reason.into(),
        }
    }

    pub fn problem_code(&self) -> Option<ProblemCode> {
        match self {
            ConnectionError::ProblemReport { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Builds the message to send back for a problem report error, `None` for every
    /// other error since those stay local
    pub fn to_problem_report(&self, thread_id: &str) -> Option<ProblemReportMessage> {
        match self {
            ConnectionError::ProblemReport { code, reason } => {
                Some(ProblemReportMessage::new(thread_id, *code, reason))
            }
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Display)]
#[serde(crate = "self::serde", rename_all = "snake_case")]
pub enum ProblemCode {
    #[display("request_not_accepted")]
    RequestNotAccepted,

    #[display("response_not_accepted")]
    ResponseNotAccepted,

    #[display("complete_rejected")]
    CompleteRejected,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Display)]
#[serde(crate = "self::serde", rename_all = "kebab-case")]
pub enum DidExchangeState {
    #[display("invitation-sent")]
    InvitationSent,

    #[display("invitation-received")]
    InvitationReceived,

    #[display("request-sent")]
    RequestSent,

    #[display("request-received")]
    RequestReceived,

    #[display("response-sent")]
    ResponseSent,

    #[display("response-received")]
    ResponseReceived,

    #[display("abandoned")]
    Abandoned,

    #[display("completed")]
    Completed,
}

impl DidExchangeState {
    /// Position of the state in the exchange, `None` for [`DidExchangeState::Abandoned`]
    pub(crate) fn stage(&self) -> Option<u8> {
        match self {
            DidExchangeState::InvitationSent | DidExchangeState::InvitationReceived => Some(0),
            DidExchangeState::RequestSent | DidExchangeState::RequestReceived => Some(1),
            DidExchangeState::ResponseSent | DidExchangeState::ResponseReceived => Some(2),
            DidExchangeState::Completed => Some(3),
            DidExchangeState::Abandoned => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Display)]
#[serde(crate = "self::serde", rename_all = "lowercase")]
pub enum Role {
    #[display("requester")]
    Requester,

    #[display("responder")]
    Responder,
}

/// `KeyHandle` is a key owned by the key management collaborator
///
/// Keys are addressed by `key_id`, which is the fingerprint of the public key
#[derive(Debug, Clone, PartialEq)]
pub struct KeyHandle {
    pub key_id: String,
    pub public_key: PublicKey,
}

impl KeyHandle {
    pub fn new(public_key: PublicKey) -> Self {
        Self {
            key_id: public_key.fingerprint(),
            public_key,
        }
    }
}

#[async_trait]
pub trait KeyManagementBuilder: Send + Sync {
    async fn create_key(&self, key_type: KeyType) -> Result<KeyHandle, ConnectionError>;
    async fn sign(&self, key_id: String, data: Vec<u8>) -> Result<Vec<u8>, ConnectionError>;

    async fn verify(
        &self,
        key: PublicKey,
        data: Vec<u8>,
        signature: Vec<u8>,
    ) -> Result<bool, ConnectionError>;

    async fn convert_ed25519_to_x25519(&self, key: PublicKey) -> Result<PublicKey, ConnectionError>;
}

#[async_trait]
pub trait ConnectionRepoBuilder: Send + Sync {
    async fn save_connection(&self, record: &ConnectionRecord) -> Result<(), ConnectionError>;
    async fn update_connection(&self, record: &ConnectionRecord) -> Result<(), ConnectionError>;
    async fn get_connection_by_id(&self, id: String) -> Result<ConnectionRecord, ConnectionError>;

    async fn find_connections(
        &self,
        query: ConnectionQuery,
    ) -> Result<Vec<ConnectionRecord>, ConnectionError>;
}

/// `Routing` is where and through which mediators our side can be reached
#[derive(Debug, Clone, PartialEq)]
pub struct Routing {
    pub endpoints: Vec<String>,
    pub recipient_key: PublicKey,
    pub routing_keys: Vec<PublicKey>,
    pub mediator_id: Option<String>,
}

/// `ResolvedService` is a DIDComm service with its keys already resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedService {
    pub id: String,
    pub service_endpoint: String,
    pub recipient_keys: Vec<PublicKey>,
    pub routing_keys: Vec<PublicKey>,
    pub priority: u32,
}

impl ResolvedService {
    pub fn from_inline(service: &DidCommV1Service) -> Result<Self, ConnectionError> {
        let parse = |keys: &[String]| -> Result<Vec<PublicKey>, ConnectionError> {
            keys.iter()
                .map(|key| Ok(DidKey::from_did(key)?.key().to_owned()))
                .collect()
        };

        Ok(Self {
            id: service.id.clone(),
            service_endpoint: service.service_endpoint.clone(),
            recipient_keys: parse(&service.recipient_keys)?,
            routing_keys: parse(&service.routing_keys)?,
            priority: service.priority,
        })
    }
}

/// One DIDComm v1 service per endpoint, `#inline-{i}` with priority `i`
pub fn routing_to_services(routing: &Routing) -> Vec<ResolvedService> {
    routing
        .endpoints
        .iter()
        .enumerate()
        .map(|(idx, endpoint)| ResolvedService {
            id: format!("#inline-{}", idx),
            service_endpoint: endpoint.clone(),
            recipient_keys: vec![routing.recipient_key.clone()],
            routing_keys: routing.routing_keys.clone(),
            priority: idx as u32,
        })
        .collect()
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(crate = "self::serde", rename_all = "lowercase")]
pub enum OutOfBandRole {
    Sender,
    Receiver,
}

/// The invitation part of an out of band record, only inline DIDComm v1 services are
/// supported
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde", rename_all = "camelCase")]
pub struct OutOfBandInvitation {
    #[serde(rename = "@id")]
    pub id: String,
    pub label: String,
    pub services: Vec<DidCommV1Service>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde", rename_all = "camelCase")]
pub struct OutOfBandRecord {
    pub id: String,
    pub role: OutOfBandRole,
    pub invitation: OutOfBandInvitation,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mediator_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_accept_connection: Option<bool>,
}

impl OutOfBandRecord {
    pub fn inline_services(&self) -> Result<Vec<ResolvedService>, ConnectionError> {
        self.invitation
            .services
            .iter()
            .map(ResolvedService::from_inline)
            .collect()
    }

    /// Recipient keys of every inline service, they must all be Ed25519
    pub fn invitation_keys(&self) -> Result<Vec<PublicKey>, ConnectionError> {
        let mut keys: Vec<PublicKey> = Vec::new();

        for service in self.inline_services()? {
            for key in service.recipient_keys {
                if key.key_type() != KeyType::Ed25519 {
                    return Err(ConnectionError::InvalidMessage(format!(
                        "invitation key must be Ed25519: {}",
                        key.fingerprint()
                    )));
                }

                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }

        Ok(keys)
    }

    pub fn recipient_key_fingerprints(&self) -> Result<Vec<String>, ConnectionError> {
        Ok(self
            .invitation_keys()?
            .iter()
            .map(PublicKey::fingerprint)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ED25519_FINGERPRINT: &str = "z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK";
    const X25519_FINGERPRINT: &str = "z6LSj72tK8brWgZja8NLRwPigth2T9QRiG1uH9oKZuKjdh9p";

    fn oob(recipient: &str) -> OutOfBandRecord {
        let service = DidCommV1Service::new(
            "#inline-0".to_string(),
            "https://inviter.example".to_string(),
            vec![format!("did:key:{}", recipient)],
            vec![],
            0,
        );

        OutOfBandRecord {
            id: "oob-1".to_string(),
            role: OutOfBandRole::Sender,
            invitation: OutOfBandInvitation {
                id: "invitation-1".to_string(),
                label: "inviter".to_string(),
                services: vec![service],
            },
            alias: None,
            mediator_id: None,
            auto_accept_connection: None,
        }
    }

    #[test]
    fn test_problem_report_conversion() {
        let err = ConnectionError::problem(ProblemCode::RequestNotAccepted, "missing invitation");
        assert_eq!(err.problem_code(), Some(ProblemCode::RequestNotAccepted));
        assert_eq!(
            err.to_string(),
            "problem report request_not_accepted: missing invitation"
        );

        let report = err.to_problem_report("thread-1").unwrap();
        assert_eq!(report.thread_id(), Some("thread-1"));

        let local = ConnectionError::InvalidState("request-sent".to_string());
        assert!(local.to_problem_report("thread-1").is_none());
    }

    #[test]
    fn test_routing_to_services() {
        let key = PublicKey::from_fingerprint(ED25519_FINGERPRINT).unwrap();
        let routing = Routing {
            endpoints: vec!["https://a.example".to_string(), "wss://b.example".to_string()],
            recipient_key: key.clone(),
            routing_keys: vec![],
            mediator_id: None,
        };

        let services = routing_to_services(&routing);
        assert_eq!(services.len(), 2);
        assert_eq!(services[1].id, "#inline-1");
        assert_eq!(services[1].priority, 1);
        assert_eq!(services[1].recipient_keys, vec![key]);
    }

    #[test]
    fn test_invitation_keys() {
        let keys = oob(ED25519_FINGERPRINT).invitation_keys().unwrap();
        assert_eq!(keys[0].fingerprint(), ED25519_FINGERPRINT);

        assert!(matches!(
            oob(X25519_FINGERPRINT).invitation_keys().unwrap_err(),
            ConnectionError::InvalidMessage(_)
        ));
    }

    #[test]
    fn test_state_serialization() {
        let state = DidExchangeState::ResponseReceived;
        assert_eq!(state.to_string(), "response-received");
        assert_eq!(
            rst_common::standard::serde_json::to_string(&state).unwrap(),
            "\"response-received\""
        );
    }
}
