use rst_common::standard::chrono::{DateTime, Utc};
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json;
use rst_common::standard::uuid::Uuid;

use rstdev_domain::entity::ToJSON;
use rstdev_domain::BaseError;

use super::types::{ConnectionError, DidExchangeState, ProblemCode, Role, DID_EXCHANGE_PROTOCOL};

/// `ConnectionQuery` filters stored [`ConnectionRecord`], every given field must match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionQuery {
    pub thread_id: Option<String>,
    pub out_of_band_id: Option<String>,
    pub their_did: Option<String>,
    pub state: Option<DidExchangeState>,
}

impl ConnectionQuery {
    pub fn by_thread_id(thread_id: &str) -> Self {
        Self {
            thread_id: Some(thread_id.to_string()),
            ..Default::default()
        }
    }

    pub fn by_out_of_band_id(out_of_band_id: &str) -> Self {
        Self {
            out_of_band_id: Some(out_of_band_id.to_string()),
            ..Default::default()
        }
    }
}

/// `ConnectionRecord` tracks one pairwise relationship through the handshake
///
/// The state only moves forward through the state machine and the record can not be
/// changed anymore once it is [`DidExchangeState::Completed`]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde", rename_all = "camelCase")]
pub struct ConnectionRecord {
    id: String,
    state: DidExchangeState,
    role: Role,
    protocol: String,
    out_of_band_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    did: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    their_did: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    their_label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    alias: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    thread_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    mediator_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    auto_accept_connection: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    problem_code: Option<ProblemCode>,

    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ConnectionRecord {
    pub fn new(role: Role, state: DidExchangeState, out_of_band_id: &str) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            state,
            role,
            protocol: DID_EXCHANGE_PROTOCOL.to_string(),
            out_of_band_id: out_of_band_id.to_string(),
            did: None,
            their_did: None,
            their_label: None,
            alias: None,
            thread_id: None,
            mediator_id: None,
            auto_accept_connection: None,
            problem_code: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_their_did(mut self, their_did: &str) -> Self {
        self.their_did = Some(their_did.to_string());
        self
    }

    pub fn with_their_label(mut self, their_label: &str) -> Self {
        self.their_label = Some(their_label.to_string());
        self
    }

    pub fn with_alias(mut self, alias: Option<String>) -> Self {
        self.alias = alias;
        self
    }

    pub fn with_thread_id(mut self, thread_id: &str) -> Self {
        self.thread_id = Some(thread_id.to_string());
        self
    }

    pub fn with_mediator_id(mut self, mediator_id: Option<String>) -> Self {
        self.mediator_id = mediator_id;
        self
    }

    pub fn with_auto_accept_connection(mut self, auto_accept: Option<bool>) -> Self {
        self.auto_accept_connection = auto_accept;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> DidExchangeState {
        self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn out_of_band_id(&self) -> &str {
        &self.out_of_band_id
    }

    pub fn did(&self) -> Option<&str> {
        self.did.as_deref()
    }

    pub fn their_did(&self) -> Option<&str> {
        self.their_did.as_deref()
    }

    pub fn their_label(&self) -> Option<&str> {
        self.their_label.as_deref()
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn mediator_id(&self) -> Option<&str> {
        self.mediator_id.as_deref()
    }

    pub fn auto_accept_connection(&self) -> Option<bool> {
        self.auto_accept_connection
    }

    pub fn problem_code(&self) -> Option<ProblemCode> {
        self.problem_code
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_completed(&self) -> bool {
        self.state == DidExchangeState::Completed
    }

    fn assert_mutable(&self) -> Result<(), ConnectionError> {
        if self.is_completed() {
            return Err(ConnectionError::InvalidState(format!(
                "connection {} is already completed",
                self.id
            )));
        }

        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Moves the record forward, a state never goes back to an earlier step and an
    /// abandoned record keeps its state
    pub fn set_state(&mut self, state: DidExchangeState) -> Result<(), ConnectionError> {
        self.assert_mutable()?;

        let allowed = match (self.state.stage(), state.stage()) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(current), Some(next)) => next >= current,
        };

        if !allowed {
            return Err(ConnectionError::InvalidState(format!(
                "connection {} cannot move from {} to {}",
                self.id, self.state, state
            )));
        }

        self.state = state;
        self.touch();
        Ok(())
    }

    pub fn set_did(&mut self, did: &str) -> Result<(), ConnectionError> {
        self.assert_mutable()?;
        self.did = Some(did.to_string());
        self.touch();
        Ok(())
    }

    pub fn set_their_did(&mut self, their_did: &str) -> Result<(), ConnectionError> {
        self.assert_mutable()?;
        self.their_did = Some(their_did.to_string());
        self.touch();
        Ok(())
    }

    pub fn set_thread_id(&mut self, thread_id: &str) -> Result<(), ConnectionError> {
        self.assert_mutable()?;
        self.thread_id = Some(thread_id.to_string());
        self.touch();
        Ok(())
    }

    /// Moves the record to [`DidExchangeState::Abandoned`] keeping the reason
    pub fn abandon(&mut self, code: ProblemCode) -> Result<(), ConnectionError> {
        self.assert_mutable()?;
        self.state = DidExchangeState::Abandoned;
        self.problem_code = Some(code);
        self.touch();
        Ok(())
    }

    pub fn matches(&self, query: &ConnectionQuery) -> bool {
        let thread = query
            .thread_id
            .as_deref()
            .map_or(true, |thid| self.thread_id.as_deref() == Some(thid));
        let oob = query
            .out_of_band_id
            .as_deref()
            .map_or(true, |oob_id| self.out_of_band_id == oob_id);
        let their_did = query
            .their_did
            .as_deref()
            .map_or(true, |did| self.their_did.as_deref() == Some(did));
        let state = query.state.map_or(true, |state| self.state == state);

        thread && oob && their_did && state
    }
}

impl ToJSON for ConnectionRecord {
    fn to_json(&self) -> Result<String, BaseError> {
        serde_json::to_string(self).map_err(|err| BaseError::ToJSONError(err.to_string()))
    }
}

impl TryInto<Vec<u8>> for ConnectionRecord {
    type Error = ConnectionError;

    fn try_into(self) -> Result<Vec<u8>, Self::Error> {
        serde_json::to_vec(&self).map_err(|err| ConnectionError::JSONError(err.to_string()))
    }
}

impl TryFrom<Vec<u8>> for ConnectionRecord {
    type Error = ConnectionError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        serde_json::from_slice(&bytes).map_err(|err| ConnectionError::JSONError(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record() {
        let record = ConnectionRecord::new(Role::Requester, DidExchangeState::InvitationReceived, "oob-1")
            .with_their_label("faber")
            .with_auto_accept_connection(Some(true));

        assert!(!record.id().is_empty());
        assert_eq!(record.protocol(), DID_EXCHANGE_PROTOCOL);
        assert_eq!(record.out_of_band_id(), "oob-1");
        assert_eq!(record.their_label(), Some("faber"));
        assert_eq!(record.auto_accept_connection(), Some(true));
        assert!(record.did().is_none());
    }

    #[test]
    fn test_completed_is_immutable() {
        let mut record =
            ConnectionRecord::new(Role::Responder, DidExchangeState::ResponseSent, "oob-1");
        assert!(record.set_state(DidExchangeState::Completed).is_ok());

        assert!(matches!(
            record.set_state(DidExchangeState::Abandoned).unwrap_err(),
            ConnectionError::InvalidState(_)
        ));
        assert!(record.set_did("did:peer:0z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK").is_err());
        assert!(record.abandon(ProblemCode::CompleteRejected).is_err());
        assert_eq!(record.state(), DidExchangeState::Completed);
    }

    #[test]
    fn test_state_never_moves_back() {
        let mut record =
            ConnectionRecord::new(Role::Responder, DidExchangeState::RequestReceived, "oob-1");
        record.set_state(DidExchangeState::ResponseSent).unwrap();

        assert!(matches!(
            record.set_state(DidExchangeState::RequestReceived).unwrap_err(),
            ConnectionError::InvalidState(_)
        ));
        assert!(record.set_state(DidExchangeState::InvitationSent).is_err());
        assert_eq!(record.state(), DidExchangeState::ResponseSent);

        record.set_state(DidExchangeState::Abandoned).unwrap();
        assert!(matches!(
            record.set_state(DidExchangeState::ResponseSent).unwrap_err(),
            ConnectionError::InvalidState(_)
        ));
        assert!(record.set_state(DidExchangeState::Completed).is_err());
        assert_eq!(record.state(), DidExchangeState::Abandoned);
    }

    #[test]
    fn test_abandon() {
        let mut record =
            ConnectionRecord::new(Role::Requester, DidExchangeState::RequestSent, "oob-1");
        record.abandon(ProblemCode::ResponseNotAccepted).unwrap();

        assert_eq!(record.state(), DidExchangeState::Abandoned);
        assert_eq!(record.problem_code(), Some(ProblemCode::ResponseNotAccepted));
    }

    #[test]
    fn test_query() {
        let record = ConnectionRecord::new(Role::Requester, DidExchangeState::RequestSent, "oob-1")
            .with_thread_id("thread-1")
            .with_their_did("did:peer:1zQmdYsuMmPeb3c8fa2wAcS4J3N75HGb5of5Btq5Pq1SRv2o");

        assert!(record.matches(&ConnectionQuery::default()));
        assert!(record.matches(&ConnectionQuery::by_thread_id("thread-1")));
        assert!(record.matches(&ConnectionQuery::by_out_of_band_id("oob-1")));
        assert!(!record.matches(&ConnectionQuery::by_thread_id("thread-2")));
        assert!(!record.matches(&ConnectionQuery {
            thread_id: Some("thread-1".to_string()),
            state: Some(DidExchangeState::Completed),
            ..Default::default()
        }));
    }

    #[test]
    fn test_bytes() {
        let record = ConnectionRecord::new(Role::Requester, DidExchangeState::RequestSent, "oob-1")
            .with_thread_id("thread-1");

        let bytes: Result<Vec<u8>, ConnectionError> = record.clone().try_into();
        assert!(bytes.is_ok());

        let restored = ConnectionRecord::try_from(bytes.unwrap()).unwrap();
        assert_eq!(restored, record);
        assert!(record.to_json().unwrap().contains("\"state\":\"request-sent\""));
    }
}
