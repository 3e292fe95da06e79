use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::uuid::Uuid;

use super::types::{ConnectionError, ProblemCode};

pub const REQUEST_MESSAGE_TYPE: &str = "https://didcomm.org/didexchange/1.1/request";
pub const RESPONSE_MESSAGE_TYPE: &str = "https://didcomm.org/didexchange/1.1/response";
pub const COMPLETE_MESSAGE_TYPE: &str = "https://didcomm.org/didexchange/1.1/complete";
pub const PROBLEM_REPORT_MESSAGE_TYPE: &str = "https://didcomm.org/didexchange/1.1/problem_report";

pub const DID_DOC_MIME_TYPE: &str = "application/json";

fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

/// `ParsedMessageType` splits a DIDComm message type uri into its parts
///
/// `https://didcomm.org/didexchange/1.1/request` gives the document uri
/// `https://didcomm.org/`, the protocol `didexchange`, version `1.1` and the
/// message name `request`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessageType {
    pub document_uri: String,
    pub protocol_name: String,
    pub major_version: u32,
    pub minor_version: u32,
    pub message_name: String,
}

impl ParsedMessageType {
    pub fn parse(message_type: &str) -> Result<Self, ConnectionError> {
        let invalid = || ConnectionError::InvalidMessage(format!("invalid message type: {}", message_type));

        let mut parts = message_type.rsplitn(4, '/');
        let message_name = parts.next().filter(|name| !name.is_empty()).ok_or_else(invalid)?;
        let version = parts.next().ok_or_else(invalid)?;
        let protocol_name = parts.next().filter(|name| !name.is_empty()).ok_or_else(invalid)?;
        let document_uri = parts.next().ok_or_else(invalid)?;

        let (major, minor) = version.split_once('.').ok_or_else(invalid)?;
        let major_version = major.parse::<u32>().map_err(|_| invalid())?;
        let minor_version = minor.parse::<u32>().map_err(|_| invalid())?;

        Ok(Self {
            document_uri: format!("{}/", document_uri),
            protocol_name: protocol_name.to_string(),
            major_version,
            minor_version,
            message_name: message_name.to_string(),
        })
    }

    /// Same message of the same protocol, any minor version is accepted
    pub fn is_same_message(&self, other: &ParsedMessageType) -> bool {
        self.document_uri == other.document_uri
            && self.protocol_name == other.protocol_name
            && self.major_version == other.major_version
            && self.message_name == other.message_name
    }
}

/// The three handshake messages driving the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeMessageKind {
    Request,
    Response,
    Complete,
}

impl ExchangeMessageKind {
    pub fn message_type(&self) -> &'static str {
        match self {
            ExchangeMessageKind::Request => REQUEST_MESSAGE_TYPE,
            ExchangeMessageKind::Response => RESPONSE_MESSAGE_TYPE,
            ExchangeMessageKind::Complete => COMPLETE_MESSAGE_TYPE,
        }
    }

    /// Problem reports and messages of other protocols have no kind
    pub fn from_message_type(message_type: &str) -> Result<Self, ConnectionError> {
        let parsed = ParsedMessageType::parse(message_type)?;

        [
            ExchangeMessageKind::Request,
            ExchangeMessageKind::Response,
            ExchangeMessageKind::Complete,
        ]
        .into_iter()
        .find(|kind| {
            ParsedMessageType::parse(kind.message_type())
                .map(|expected| expected.is_same_message(&parsed))
                .unwrap_or(false)
        })
        .ok_or_else(|| {
            ConnectionError::InvalidMessage(format!("unsupported message type: {}", message_type))
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(crate = "self::serde")]
pub struct Thread {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pthid: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct JwsHeader {
    pub kid: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct JwsSignature {
    pub header: JwsHeader,
    pub protected: String,
    pub signature: String,
}

/// Detached JWS, general serialization for many signers and flattened for one
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde", untagged)]
pub enum Jws {
    General { signatures: Vec<JwsSignature> },
    Flattened(JwsSignature),
}

impl Jws {
    pub fn from_signatures(mut signatures: Vec<JwsSignature>) -> Self {
        if signatures.len() == 1 {
            if let Some(signature) = signatures.pop() {
                return Jws::Flattened(signature);
            }
        }

        Jws::General { signatures }
    }

    pub fn signatures(&self) -> Vec<&JwsSignature> {
        match self {
            Jws::General { signatures } => signatures.iter().collect(),
            Jws::Flattened(signature) => vec![signature],
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(crate = "self::serde")]
pub struct AttachmentData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jws: Option<Jws>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct Attachment {
    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "mime-type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    pub data: AttachmentData,
}

impl Attachment {
    pub fn new(mime_type: Option<&str>, data: AttachmentData) -> Self {
        Self {
            id: new_message_id(),
            mime_type: mime_type.map(str::to_string),
            data,
        }
    }

    /// Decodes `data.base64`, both the standard and the url safe alphabet are accepted
    pub fn payload(&self) -> Result<Vec<u8>, ConnectionError> {
        let encoded = self
            .data
            .base64
            .as_deref()
            .ok_or_else(|| ConnectionError::MissingField("attachment base64 data".to_string()))?;

        decode_base64(encoded)
    }
}

pub(super) fn decode_base64(encoded: &str) -> Result<Vec<u8>, ConnectionError> {
    let normalized: String = encoded
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();

    URL_SAFE_NO_PAD
        .decode(normalized)
        .map_err(|err| ConnectionError::InvalidMessage(format!("invalid base64: {}", err)))
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct RequestMessage {
    #[serde(rename = "@id")]
    id: String,

    #[serde(rename = "@type")]
    message_type: String,

    #[serde(rename = "~thread", default)]
    thread: Thread,

    label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    goal_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    goal: Option<String>,

    did: String,

    #[serde(rename = "did_doc~attach", default, skip_serializing_if = "Option::is_none")]
    did_doc: Option<Attachment>,
}

impl RequestMessage {
    pub fn new(label: &str, parent_thread_id: &str, did: &str) -> Self {
        Self {
            id: new_message_id(),
            message_type: REQUEST_MESSAGE_TYPE.to_string(),
            thread: Thread {
                thid: None,
                pthid: Some(parent_thread_id.to_string()),
            },
            label: label.to_string(),
            goal_code: None,
            goal: None,
            did: did.to_string(),
            did_doc: None,
        }
    }

    pub fn with_goal(mut self, goal: Option<String>) -> Self {
        self.goal = goal;
        self
    }

    pub fn with_goal_code(mut self, goal_code: Option<String>) -> Self {
        self.goal_code = goal_code;
        self
    }

    pub fn with_did_doc(mut self, attachment: Attachment) -> Self {
        self.did_doc = Some(attachment);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn goal(&self) -> Option<&str> {
        self.goal.as_deref()
    }

    pub fn goal_code(&self) -> Option<&str> {
        self.goal_code.as_deref()
    }

    pub fn did(&self) -> &str {
        &self.did
    }

    pub fn did_doc(&self) -> Option<&Attachment> {
        self.did_doc.as_ref()
    }

    /// A request starts the thread, without an explicit `thid` its own id is used
    pub fn thread_id(&self) -> &str {
        self.thread.thid.as_deref().unwrap_or(&self.id)
    }

    pub fn parent_thread_id(&self) -> Option<&str> {
        self.thread.pthid.as_deref()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct ResponseMessage {
    #[serde(rename = "@id")]
    id: String,

    #[serde(rename = "@type")]
    message_type: String,

    #[serde(rename = "~thread", default)]
    thread: Thread,

    did: String,

    #[serde(rename = "did_doc~attach", default, skip_serializing_if = "Option::is_none")]
    did_doc: Option<Attachment>,

    #[serde(rename = "did_rotate~attach", default, skip_serializing_if = "Option::is_none")]
    did_rotate: Option<Attachment>,
}

impl ResponseMessage {
    pub fn new(thread_id: &str, did: &str) -> Self {
        Self {
            id: new_message_id(),
            message_type: RESPONSE_MESSAGE_TYPE.to_string(),
            thread: Thread {
                thid: Some(thread_id.to_string()),
                pthid: None,
            },
            did: did.to_string(),
            did_doc: None,
            did_rotate: None,
        }
    }

    pub fn with_did_doc(mut self, attachment: Attachment) -> Self {
        self.did_doc = Some(attachment);
        self
    }

    pub fn with_did_rotate(mut self, attachment: Attachment) -> Self {
        self.did_rotate = Some(attachment);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn did(&self) -> &str {
        &self.did
    }

    pub fn did_doc(&self) -> Option<&Attachment> {
        self.did_doc.as_ref()
    }

    pub fn did_rotate(&self) -> Option<&Attachment> {
        self.did_rotate.as_ref()
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread.thid.as_deref()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct CompleteMessage {
    #[serde(rename = "@id")]
    id: String,

    #[serde(rename = "@type")]
    message_type: String,

    #[serde(rename = "~thread", default)]
    thread: Thread,
}

impl CompleteMessage {
    pub fn new(thread_id: &str, parent_thread_id: &str) -> Self {
        Self {
            id: new_message_id(),
            message_type: COMPLETE_MESSAGE_TYPE.to_string(),
            thread: Thread {
                thid: Some(thread_id.to_string()),
                pthid: Some(parent_thread_id.to_string()),
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread.thid.as_deref()
    }

    pub fn parent_thread_id(&self) -> Option<&str> {
        self.thread.pthid.as_deref()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct ProblemDescription {
    pub code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
}

/// `ProblemReportMessage` is the only error sent back to the other party
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct ProblemReportMessage {
    #[serde(rename = "@id")]
    id: String,

    #[serde(rename = "@type")]
    message_type: String,

    #[serde(rename = "~thread", default)]
    thread: Thread,

    description: ProblemDescription,
}

impl ProblemReportMessage {
    pub fn new(thread_id: &str, code: ProblemCode, reason: &str) -> Self {
        Self {
            id: new_message_id(),
            message_type: PROBLEM_REPORT_MESSAGE_TYPE.to_string(),
            thread: Thread {
                thid: Some(thread_id.to_string()),
                pthid: None,
            },
            description: ProblemDescription {
                code: code.to_string(),
                en: Some(reason.to_string()),
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread.thid.as_deref()
    }

    pub fn description(&self) -> &ProblemDescription {
        &self.description
    }

    /// The problem code when it is one of the codes of this protocol
    pub fn problem_code(&self) -> Option<ProblemCode> {
        match self.description.code.as_str() {
            "request_not_accepted" => Some(ProblemCode::RequestNotAccepted),
            "response_not_accepted" => Some(ProblemCode::ResponseNotAccepted),
            "complete_rejected" => Some(ProblemCode::CompleteRejected),
            _ => None,
        }
    }
}
