use rst_common::standard::serde::{self, de, Deserialize, Deserializer, Serialize};
use rst_common::standard::serde_json::{self, Map, Value};

use super::types::OneOrMany;

pub const INDY_AGENT_SERVICE_TYPE: &str = "IndyAgent";
pub const DIDCOMM_V1_SERVICE_TYPE: &str = "did-communication";
pub const DIDCOMM_V2_SERVICE_TYPE: &str = "DIDCommMessaging";

fn is_zero(value: &u32) -> bool {
    *value == 0
}

/// Any service which is not one of the DIDComm flavours
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde", rename_all = "camelCase")]
pub struct GenericService {
    pub id: String,
    pub service_endpoint: Value,

    #[serde(rename = "type")]
    pub service_type: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Legacy Indy agent service, inline recipient and routing keys
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde", rename_all = "camelCase")]
pub struct IndyAgentService {
    pub id: String,
    pub service_endpoint: String,

    #[serde(rename = "type")]
    service_type: String,

    pub recipient_keys: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routing_keys: Vec<String>,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub priority: u32,
}

impl IndyAgentService {
    pub fn new(
        id: String,
        service_endpoint: String,
        recipient_keys: Vec<String>,
        routing_keys: Vec<String>,
        priority: u32,
    ) -> Self {
        Self {
            id,
            service_endpoint,
            service_type: INDY_AGENT_SERVICE_TYPE.to_string(),
            recipient_keys,
            routing_keys,
            priority,
        }
    }
}

/// DIDComm v1 service, `did-communication`
///
/// Recipient keys are references to verification methods of the same document, or
/// `did:key` urls. Routing keys are always `did:key` urls
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde", rename_all = "camelCase")]
pub struct DidCommV1Service {
    pub id: String,
    pub service_endpoint: String,

    #[serde(rename = "type")]
    service_type: String,

    pub recipient_keys: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routing_keys: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub priority: u32,
}

impl DidCommV1Service {
    pub fn new(
        id: String,
        service_endpoint: String,
        recipient_keys: Vec<String>,
        routing_keys: Vec<String>,
        priority: u32,
    ) -> Self {
        Self {
            id,
            service_endpoint,
            service_type: DIDCOMM_V1_SERVICE_TYPE.to_string(),
            recipient_keys,
            routing_keys,
            accept: None,
            priority,
        }
    }

    pub fn with_accept(mut self, accept: Vec<String>) -> Self {
        self.accept = Some(accept);
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde", rename_all = "camelCase")]
pub struct DidCommV2Endpoint {
    pub uri: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routing_keys: Vec<String>,
}

/// DIDComm v2 service, `DIDCommMessaging`
///
/// It never carries recipient keys, recipients are the `keyAgreement` keys of the document
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde", rename_all = "camelCase")]
pub struct DidCommV2Service {
    pub id: String,
    pub service_endpoint: OneOrMany<DidCommV2Endpoint>,

    #[serde(rename = "type")]
    service_type: String,
}

impl DidCommV2Service {
    pub fn new(id: String, service_endpoint: OneOrMany<DidCommV2Endpoint>) -> Self {
        Self {
            id,
            service_endpoint,
            service_type: DIDCOMM_V2_SERVICE_TYPE.to_string(),
        }
    }
}

/// `Service` is the closed set of service shapes a document may carry
///
/// The variant is chosen from the `type` property when deserializing
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde", untagged)]
pub enum Service {
    IndyAgent(IndyAgentService),
    DidCommV1(DidCommV1Service),
    DidCommV2(DidCommV2Service),
    Generic(GenericService),
}

impl Service {
    pub fn id(&self) -> &str {
        match self {
            Service::IndyAgent(svc) => &svc.id,
            Service::DidCommV1(svc) => &svc.id,
            Service::DidCommV2(svc) => &svc.id,
            Service::Generic(svc) => &svc.id,
        }
    }

    pub fn service_type(&self) -> &str {
        match self {
            Service::IndyAgent(_) => INDY_AGENT_SERVICE_TYPE,
            Service::DidCommV1(_) => DIDCOMM_V1_SERVICE_TYPE,
            Service::DidCommV2(_) => DIDCOMM_V2_SERVICE_TYPE,
            Service::Generic(svc) => &svc.service_type,
        }
    }

    pub fn with_id(self, id: String) -> Self {
        match self {
            Service::IndyAgent(svc) => Service::IndyAgent(IndyAgentService { id, ..svc }),
            Service::DidCommV1(svc) => Service::DidCommV1(DidCommV1Service { id, ..svc }),
            Service::DidCommV2(svc) => Service::DidCommV2(DidCommV2Service { id, ..svc }),
            Service::Generic(svc) => Service::Generic(GenericService { id, ..svc }),
        }
    }

    /// Recipient key references, empty for DIDComm v2 and generic services
    pub fn recipient_keys(&self) -> &[String] {
        match self {
            Service::IndyAgent(svc) => &svc.recipient_keys,
            Service::DidCommV1(svc) => &svc.recipient_keys,
            _ => &[],
        }
    }

    pub fn priority(&self) -> u32 {
        match self {
            Service::IndyAgent(svc) => svc.priority,
            Service::DidCommV1(svc) => svc.priority,
            _ => 0,
        }
    }

    pub fn is_didcomm(&self) -> bool {
        !matches!(self, Service::Generic(_))
    }
}

impl<'de> Deserialize<'de> for Service {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let service_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| de::Error::missing_field("type"))?
            .to_string();

        let service = match service_type.as_str() {
            INDY_AGENT_SERVICE_TYPE => serde_json::from_value(value).map(Service::IndyAgent),
            DIDCOMM_V1_SERVICE_TYPE => serde_json::from_value(value).map(Service::DidCommV1),
            DIDCOMM_V2_SERVICE_TYPE => serde_json::from_value(value).map(Service::DidCommV2),
            _ => serde_json::from_value(value).map(Service::Generic),
        };

        service.map_err(|err| de::Error::custom(format!("{}: {}", service_type, err)))
    }
}

impl From<DidCommV1Service> for Service {
    fn from(value: DidCommV1Service) -> Self {
        Service::DidCommV1(value)
    }
}

impl From<DidCommV2Service> for Service {
    fn from(value: DidCommV2Service) -> Self {
        Service::DidCommV2(value)
    }
}

impl From<IndyAgentService> for Service {
    fn from(value: IndyAgentService) -> Self {
        Service::IndyAgent(value)
    }
}
