use std::sync::Arc;

use rst_common::with_logging::log::{debug, info, warn};

use crate::identity::doc::types::{ED25519_2018_CONTEXT, X25519_2019_CONTEXT};
use crate::identity::doc::{
    DidCommV1Service, DidDocument, DidDocumentBuilder, DocumentAccessor, DraftDocument,
    KeyDidMappings,
};
use crate::identity::key::{DidKey, KeyType, PublicKey};
use crate::identity::peer::{
    assert_num_algo, is_valid_peer_did, num_algo_from_did, numalgo1, DidRepoBuilder, NumAlgo,
    PeerDidRegistrar, PeerDidResolver,
};

use super::config::ExchangeConfig;
use super::jws::{create_signed_attachment, verify_signed_attachment, SignedData};
use super::messages::{
    Attachment, CompleteMessage, ExchangeMessageKind, ProblemReportMessage, RequestMessage,
    ResponseMessage, COMPLETE_MESSAGE_TYPE, REQUEST_MESSAGE_TYPE, RESPONSE_MESSAGE_TYPE,
};
use super::record::{ConnectionQuery, ConnectionRecord};
use super::state_machine::DidExchangeStateMachine;
use super::types::{
    routing_to_services, ConnectionError, ConnectionRepoBuilder, DidExchangeState,
    KeyManagementBuilder, OutOfBandRecord, OutOfBandRole, ProblemCode, ResolvedService, Role,
    Routing,
};

/// Parameters of [`DidExchangeProtocol::create_request`]
#[derive(Debug, Clone)]
pub struct RequestParams {
    pub label: Option<String>,
    pub alias: Option<String>,
    pub goal: Option<String>,
    pub goal_code: Option<String>,
    pub routing: Routing,
    pub auto_accept_connection: Option<bool>,
}

impl RequestParams {
    pub fn new(routing: Routing) -> Self {
        Self {
            label: None,
            alias: None,
            goal: None,
            goal_code: None,
            routing,
            auto_accept_connection: None,
        }
    }
}

fn assert_out_of_band_role(
    oob: &OutOfBandRecord,
    expected: OutOfBandRole,
) -> Result<(), ConnectionError> {
    if oob.role != expected {
        return Err(ConnectionError::InvalidState(format!(
            "out of band record {} has role {:?}, expected {:?}",
            oob.id, oob.role, expected
        )));
    }

    Ok(())
}

fn assert_message_kind(
    message_type: &str,
    expected: ExchangeMessageKind,
) -> Result<(), ConnectionError> {
    let kind = ExchangeMessageKind::from_message_type(message_type)?;
    if kind != expected {
        return Err(ConnectionError::InvalidMessage(format!(
            "expected {} but got {}",
            expected.message_type(),
            message_type
        )));
    }

    Ok(())
}

/// `DidExchangeProtocol` drives both sides of the `DID Exchange` handshake
///
/// The requester calls `create_request`, `process_response` and `create_complete`, the
/// responder calls `process_request`, `create_response` and `process_complete`. Every
/// step checks the connection record against [`DidExchangeStateMachine`] first, and
/// saves the record in its next state once the step succeeded.
///
/// Errors of kind [`ConnectionError::ProblemReport`] are meant to be sent back to the
/// other party with [`ConnectionError::to_problem_report`]
pub struct DidExchangeProtocol<TConnRepo, TDidRepo, TKms>
where
    TConnRepo: ConnectionRepoBuilder,
    TDidRepo: DidRepoBuilder,
    TKms: KeyManagementBuilder,
{
    connection_repo: TConnRepo,
    did_repo: TDidRepo,
    kms: TKms,
    mappings: Arc<KeyDidMappings>,
    config: ExchangeConfig,
}

impl<TConnRepo, TDidRepo, TKms> DidExchangeProtocol<TConnRepo, TDidRepo, TKms>
where
    TConnRepo: ConnectionRepoBuilder,
    TDidRepo: DidRepoBuilder,
    TKms: KeyManagementBuilder,
{
    pub fn new(
        connection_repo: TConnRepo,
        did_repo: TDidRepo,
        kms: TKms,
        mappings: Arc<KeyDidMappings>,
        config: ExchangeConfig,
    ) -> Self {
        Self {
            connection_repo,
            did_repo,
            kms,
            mappings,
            config,
        }
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    fn registrar(&self) -> PeerDidRegistrar<'_, TDidRepo> {
        PeerDidRegistrar::new(&self.did_repo, &self.mappings)
    }

    pub async fn create_request(
        &self,
        oob: &OutOfBandRecord,
        params: RequestParams,
    ) -> Result<(RequestMessage, ConnectionRecord), ConnectionError> {
        debug!("Create message {} start", REQUEST_MESSAGE_TYPE);
        assert_out_of_band_role(oob, OutOfBandRole::Receiver)?;

        let num_algo = self.config.num_algo()?;
        let auto_accept = params
            .auto_accept_connection
            .or(oob.auto_accept_connection)
            .unwrap_or(self.config.auto_accept_connections);

        let mut record = ConnectionRecord::new(
            Role::Requester,
            DidExchangeState::InvitationReceived,
            &oob.id,
        )
        .with_their_label(&oob.invitation.label)
        .with_alias(params.alias)
        .with_mediator_id(params.routing.mediator_id.clone())
        .with_auto_accept_connection(Some(auto_accept));

        DidExchangeStateMachine::assert_create_message_state(REQUEST_MESSAGE_TYPE, &record)?;

        let services = routing_to_services(&params.routing);
        let draft = self.document_from_services(&services).await?;
        let document = self.registrar().prepare(draft, num_algo)?;

        let label = params.label.unwrap_or_else(|| self.config.label.clone());
        let mut message = RequestMessage::new(&label, &oob.invitation.id, document.id())
            .with_goal(params.goal)
            .with_goal_code(params.goal_code);

        if num_algo == NumAlgo::GenesisDoc {
            let signing_keys = document.recipient_signing_keys(&self.mappings)?;
            let attachment =
                create_signed_attachment(&self.kms, SignedData::Document(&document), &signing_keys)
                    .await?;
            message = message.with_did_doc(attachment);
        }

        self.registrar().store_created(document.clone()).await?;

        record.set_did(document.id())?;
        record.set_thread_id(message.thread_id())?;
        self.connection_repo.save_connection(&record).await?;

        self.update_state(REQUEST_MESSAGE_TYPE, &mut record).await?;
        debug!("Create message {} end", REQUEST_MESSAGE_TYPE);
        Ok((message, record))
    }

    pub async fn process_request(
        &self,
        message: &RequestMessage,
        oob: &OutOfBandRecord,
    ) -> Result<ConnectionRecord, ConnectionError> {
        debug!("Process message {} start", message.message_type());
        assert_message_kind(message.message_type(), ExchangeMessageKind::Request)?;
        assert_out_of_band_role(oob, OutOfBandRole::Sender)?;

        if message.parent_thread_id() != Some(oob.invitation.id.as_str()) {
            return Err(ConnectionError::problem(
                ProblemCode::RequestNotAccepted,
                "Missing reference to invitation.",
            ));
        }

        let existing = self
            .connection_repo
            .find_connections(ConnectionQuery::by_thread_id(message.thread_id()))
            .await?;
        if !existing.is_empty() {
            return Err(ConnectionError::problem(
                ProblemCode::RequestNotAccepted,
                format!("Request {} was already processed.", message.thread_id()),
            ));
        }

        assert_num_algo(message.did(), NumAlgo::GenesisDoc).map_err(|err| {
            ConnectionError::problem(
                ProblemCode::RequestNotAccepted,
                format!("Unsupported did {}: {}", message.did(), err),
            )
        })?;

        let invitation_keys = oob.invitation_keys()?;
        let document = self
            .extract_attached_document(
                message.did_doc(),
                message.did(),
                &invitation_keys,
                ProblemCode::RequestNotAccepted,
            )
            .await?;

        self.registrar().store_received(document).await?;

        let mut record =
            ConnectionRecord::new(Role::Responder, DidExchangeState::RequestReceived, &oob.id)
                .with_their_did(message.did())
                .with_their_label(message.label())
                .with_thread_id(message.thread_id())
                .with_alias(oob.alias.clone())
                .with_mediator_id(oob.mediator_id.clone())
                .with_auto_accept_connection(
                    oob.auto_accept_connection
                        .or(Some(self.config.auto_accept_connections)),
                );

        self.connection_repo.save_connection(&record).await?;
        self.update_state(REQUEST_MESSAGE_TYPE, &mut record).await?;

        debug!("Process message {} end", REQUEST_MESSAGE_TYPE);
        Ok(record)
    }

    pub async fn create_response(
        &self,
        mut record: ConnectionRecord,
        oob: &OutOfBandRecord,
        routing: Option<&Routing>,
    ) -> Result<(ResponseMessage, ConnectionRecord), ConnectionError> {
        debug!("Create message {} start", RESPONSE_MESSAGE_TYPE);
        DidExchangeStateMachine::assert_create_message_state(RESPONSE_MESSAGE_TYPE, &record)?;

        let thread_id = record
            .thread_id()
            .map(str::to_string)
            .ok_or_else(|| ConnectionError::MissingField("connection thread id".to_string()))?;

        let their_did = record
            .their_did()
            .map(str::to_string)
            .ok_or_else(|| ConnectionError::MissingField("connection their did".to_string()))?;

        let inline_services = oob.inline_services()?;
        let services = match routing {
            Some(routing) => routing_to_services(routing),
            None if !inline_services.is_empty() => inline_services,
            None => {
                return Err(ConnectionError::RoutingError(
                    "no routing provided and no inline services in the invitation".to_string(),
                ))
            }
        };

        let num_algo = if is_valid_peer_did(&their_did) {
            num_algo_from_did(&their_did)?
        } else {
            self.config.num_algo()?
        };

        let draft = self.document_from_services(&services).await?;
        let document = self.registrar().prepare(draft, num_algo)?;

        let invitation_keys = oob.invitation_keys()?;
        let mut message = ResponseMessage::new(&thread_id, document.id());

        message = if num_algo == NumAlgo::GenesisDoc {
            let attachment =
                create_signed_attachment(&self.kms, SignedData::Document(&document), &invitation_keys)
                    .await?;
            message.with_did_doc(attachment)
        } else {
            let attachment =
                create_signed_attachment(&self.kms, SignedData::Did(document.id()), &invitation_keys)
                    .await?;
            message.with_did_rotate(attachment)
        };

        self.registrar().store_created(document.clone()).await?;

        record.set_did(document.id())?;
        self.update_state(RESPONSE_MESSAGE_TYPE, &mut record).await?;

        debug!("Create message {} end", RESPONSE_MESSAGE_TYPE);
        Ok((message, record))
    }

    pub async fn process_response(
        &self,
        message: &ResponseMessage,
        mut record: ConnectionRecord,
        oob: &OutOfBandRecord,
    ) -> Result<ConnectionRecord, ConnectionError> {
        debug!("Process message {} start", message.message_type());
        assert_message_kind(message.message_type(), ExchangeMessageKind::Response)?;
        DidExchangeStateMachine::assert_process_message_state(RESPONSE_MESSAGE_TYPE, &record)?;

        if message.thread_id().is_none() || message.thread_id() != record.thread_id() {
            return Err(ConnectionError::problem(
                ProblemCode::ResponseNotAccepted,
                "Invalid or missing thread ID.",
            ));
        }

        let invitation_keys = oob.invitation_keys()?;
        let is_genesis = num_algo_from_did(message.did())
            .map(|num_algo| num_algo == NumAlgo::GenesisDoc)
            .unwrap_or(false);

        let document = if is_genesis {
            self.extract_attached_document(
                message.did_doc(),
                message.did(),
                &invitation_keys,
                ProblemCode::ResponseNotAccepted,
            )
            .await?
        } else {
            self.extract_resolvable_document(message, &invitation_keys)
                .await?
        };

        self.registrar().store_received(document).await?;

        record.set_their_did(message.did())?;
        self.update_state(RESPONSE_MESSAGE_TYPE, &mut record).await?;

        debug!("Process message {} end", RESPONSE_MESSAGE_TYPE);
        Ok(record)
    }

    pub async fn create_complete(
        &self,
        mut record: ConnectionRecord,
        oob: &OutOfBandRecord,
    ) -> Result<(CompleteMessage, ConnectionRecord), ConnectionError> {
        debug!("Create message {} start", COMPLETE_MESSAGE_TYPE);
        DidExchangeStateMachine::assert_create_message_state(COMPLETE_MESSAGE_TYPE, &record)?;

        let thread_id = record.thread_id().ok_or_else(|| {
            ConnectionError::MissingField(format!("connection {} thread id", record.id()))
        })?;

        let message = CompleteMessage::new(thread_id, &oob.invitation.id);
        self.update_state(COMPLETE_MESSAGE_TYPE, &mut record).await?;

        debug!("Create message {} end", COMPLETE_MESSAGE_TYPE);
        Ok((message, record))
    }

    pub async fn process_complete(
        &self,
        message: &CompleteMessage,
        mut record: ConnectionRecord,
        oob: &OutOfBandRecord,
    ) -> Result<ConnectionRecord, ConnectionError> {
        debug!("Process message {} start", message.message_type());
        assert_message_kind(message.message_type(), ExchangeMessageKind::Complete)?;
        DidExchangeStateMachine::assert_process_message_state(COMPLETE_MESSAGE_TYPE, &record)?;

        if message.thread_id().is_none() || message.thread_id() != record.thread_id() {
            return Err(ConnectionError::problem(
                ProblemCode::CompleteRejected,
                "Invalid or missing thread ID.",
            ));
        }

        if message.parent_thread_id() != Some(oob.invitation.id.as_str()) {
            return Err(ConnectionError::problem(
                ProblemCode::CompleteRejected,
                "Invalid or missing parent thread ID referencing to the invitation.",
            ));
        }

        self.update_state(COMPLETE_MESSAGE_TYPE, &mut record).await?;

        debug!("Process message {} end", COMPLETE_MESSAGE_TYPE);
        Ok(record)
    }

    /// Moves the record to `Abandoned` and keeps the problem code, refused once the
    /// handshake is completed
    pub async fn abandon(
        &self,
        mut record: ConnectionRecord,
        code: ProblemCode,
    ) -> Result<ConnectionRecord, ConnectionError> {
        record.abandon(code)?;
        self.connection_repo.update_connection(&record).await?;

        warn!("Connection {} abandoned: {}", record.id(), code);
        Ok(record)
    }

    /// Abandons the record a problem report received from the other party refers to
    pub async fn process_problem_report(
        &self,
        report: &ProblemReportMessage,
        record: ConnectionRecord,
    ) -> Result<ConnectionRecord, ConnectionError> {
        if report.thread_id().is_none() || report.thread_id() != record.thread_id() {
            return Err(ConnectionError::InvalidMessage(format!(
                "problem report thread {:?} does not belong to connection {}",
                report.thread_id(),
                record.id()
            )));
        }

        let code = report.problem_code().ok_or_else(|| {
            ConnectionError::InvalidMessage(format!(
                "unknown problem code: {}",
                report.description().code
            ))
        })?;

        self.abandon(record, code).await
    }

    pub async fn find_by_thread_id(
        &self,
        thread_id: &str,
    ) -> Result<ConnectionRecord, ConnectionError> {
        self.connection_repo
            .find_connections(ConnectionQuery::by_thread_id(thread_id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ConnectionError::RepoError(format!("no connection for thread {}", thread_id))
            })
    }

    async fn update_state(
        &self,
        message_type: &str,
        record: &mut ConnectionRecord,
    ) -> Result<(), ConnectionError> {
        debug!("Updating state: {} ({})", record.id(), record.state());

        let next_state = DidExchangeStateMachine::next_state(message_type, record)?;
        record.set_state(next_state)?;
        self.connection_repo.update_connection(record).await?;

        info!("Connection {} is now {}", record.id(), next_state);
        Ok(())
    }

    /// One Ed25519 authentication key and its X25519 key agreement key per distinct
    /// recipient key, referenced as `#key-N` by the DIDComm services
    async fn document_from_services(
        &self,
        services: &[ResolvedService],
    ) -> Result<DraftDocument, ConnectionError> {
        let mut builder = DidDocumentBuilder::new()
            .add_context(ED25519_2018_CONTEXT)
            .add_context(X25519_2019_CONTEXT);

        let mut key_ids: Vec<(PublicKey, String)> = Vec::new();
        let mut index = 1;

        for key in services.iter().flat_map(|service| service.recipient_keys.iter()) {
            if key_ids.iter().any(|(known, _)| known == key) {
                continue;
            }

            if key.key_type() != KeyType::Ed25519 {
                return Err(ConnectionError::RoutingError(format!(
                    "recipient key must be Ed25519: {}",
                    key.fingerprint()
                )));
            }

            let ed25519_id = format!("#key-{}", index);
            let x25519_id = format!("#key-{}", index + 1);
            let x25519 = self.kms.convert_ed25519_to_x25519(key.clone()).await?;

            let authentication =
                self.mappings
                    .verification_method(ed25519_id.clone(), "#id".to_string(), key)?;
            let key_agreement =
                self.mappings
                    .verification_method(x25519_id, "#id".to_string(), &x25519)?;

            builder = builder
                .add_authentication(authentication)
                .add_key_agreement(key_agreement);

            key_ids.push((key.clone(), ed25519_id));
            index += 2;
        }

        for service in services {
            let recipient_keys = service
                .recipient_keys
                .iter()
                .filter_map(|key| {
                    key_ids
                        .iter()
                        .find(|(known, _)| known == key)
                        .map(|(_, id)| id.clone())
                })
                .collect();

            let routing_keys = service
                .routing_keys
                .iter()
                .map(|key| DidKey::new(key.clone()).key_id())
                .collect();

            builder = builder.add_service(DidCommV1Service::new(
                service.id.clone(),
                service.service_endpoint.clone(),
                recipient_keys,
                routing_keys,
                service.priority,
            ));
        }

        Ok(builder.build())
    }

    /// Verifies a `did_doc~attach` and returns its document
    ///
    /// Every signer must be an authentication key of the attached document or one of
    /// the invitation keys, and the attached bytes must hash to its `did:peer:1`
    async fn extract_attached_document(
        &self,
        attachment: Option<&Attachment>,
        did: &str,
        invitation_keys: &[PublicKey],
        code: ProblemCode,
    ) -> Result<DidDocument, ConnectionError> {
        let attachment = attachment
            .ok_or_else(|| ConnectionError::problem(code, "DID Document attachment is missing."))?;

        if attachment.data.jws.is_none() {
            return Err(ConnectionError::problem(
                code,
                "DID Document signature is missing.",
            ));
        }

        let verified = verify_signed_attachment(&self.kms, attachment)
            .await
            .map_err(|err| ConnectionError::problem(code, err.to_string()))?;

        let document = DidDocument::from_slice(&verified.payload)
            .map_err(|err| ConnectionError::problem(code, err.to_string()))?;

        let mut accepted_keys = document
            .authentication_keys(&self.mappings)
            .map_err(|err| ConnectionError::problem(code, err.to_string()))?;
        accepted_keys.extend(invitation_keys.iter().cloned());

        let trusted = verified
            .signers
            .iter()
            .all(|signer| accepted_keys.contains(signer));

        if !verified.is_valid || !trusted {
            return Err(ConnectionError::problem(
                code,
                "DID Document signature is invalid.",
            ));
        }

        if document.id() != did {
            return Err(ConnectionError::problem(
                code,
                format!("DID Document id {} does not match did {}", document.id(), did),
            ));
        }

        numalgo1::verify_payload(did, &verified.payload)
            .map_err(|err| ConnectionError::problem(code, err.to_string()))?;

        Ok(document)
    }

    /// Verifies a `did_rotate~attach` signed by the invitation keys, then resolves the
    /// document from the did itself
    async fn extract_resolvable_document(
        &self,
        message: &ResponseMessage,
        invitation_keys: &[PublicKey],
    ) -> Result<DidDocument, ConnectionError> {
        let code = ProblemCode::ResponseNotAccepted;
        let attachment = message
            .did_rotate()
            .ok_or_else(|| ConnectionError::problem(code, "DID Rotate attachment is missing."))?;

        if attachment.data.jws.is_none() {
            return Err(ConnectionError::problem(
                code,
                "DID Rotate signature is missing.",
            ));
        }

        let verified = verify_signed_attachment(&self.kms, attachment)
            .await
            .map_err(|err| ConnectionError::problem(code, err.to_string()))?;

        let signed_did = String::from_utf8(verified.payload)
            .map_err(|err| ConnectionError::problem(code, err.to_string()))?;

        if signed_did != message.did() {
            return Err(ConnectionError::problem(
                code,
                format!(
                    "DID Rotate attachment did {} does not correspond to message did {}",
                    signed_did,
                    message.did()
                ),
            ));
        }

        let trusted = verified
            .signers
            .iter()
            .all(|signer| invitation_keys.contains(signer));

        if !verified.is_valid || !trusted {
            return Err(ConnectionError::problem(
                code,
                "DID Rotate signature is invalid.",
            ));
        }

        PeerDidResolver::new(&self.did_repo, &self.mappings)
            .resolve(message.did())
            .await
            .map_err(|err| ConnectionError::problem(code, err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use mockall::mock;

    use rst_common::standard::async_trait::async_trait;
    use rst_common::with_tokio::tokio;

    use crate::identity::peer::{DidQuery, DidRecord, PeerDidError};

    use super::super::fixtures::FakeKms;
    use super::super::messages::AttachmentData;
    use super::super::types::OutOfBandInvitation;

    mock!(
        FakeConnectionRepo{}

        #[async_trait]
        impl ConnectionRepoBuilder for FakeConnectionRepo {
            async fn save_connection(&self, record: &ConnectionRecord) -> Result<(), ConnectionError>;
            async fn update_connection(&self, record: &ConnectionRecord) -> Result<(), ConnectionError>;
            async fn get_connection_by_id(&self, id: String) -> Result<ConnectionRecord, ConnectionError>;
            async fn find_connections(&self, query: ConnectionQuery) -> Result<Vec<ConnectionRecord>, ConnectionError>;
        }
    );

    mock!(
        FakeDidRepo{}

        #[async_trait]
        impl DidRepoBuilder for FakeDidRepo {
            async fn save_did_record(&self, record: &DidRecord) -> Result<(), PeerDidError>;
            async fn update_did_record(&self, record: &DidRecord) -> Result<(), PeerDidError>;
            async fn get_did_record_by_id(&self, id: String) -> Result<DidRecord, PeerDidError>;
            async fn find_did_records(&self, query: DidQuery) -> Result<Vec<DidRecord>, PeerDidError>;
        }
    );

    type Protocol = DidExchangeProtocol<MockFakeConnectionRepo, MockFakeDidRepo, FakeKms>;

    fn connection_repo() -> MockFakeConnectionRepo {
        let mut repo = MockFakeConnectionRepo::new();
        repo.expect_save_connection().returning(|_| Ok(()));
        repo.expect_update_connection().returning(|_| Ok(()));
        repo.expect_find_connections().returning(|_| Ok(vec![]));
        repo
    }

    fn did_repo() -> MockFakeDidRepo {
        let mut repo = MockFakeDidRepo::new();
        repo.expect_save_did_record().returning(|_| Ok(()));
        repo.expect_find_did_records().returning(|_| Ok(vec![]));
        repo
    }

    fn protocol(kms: FakeKms, num_algo: u8) -> Protocol {
        DidExchangeProtocol::new(
            connection_repo(),
            did_repo(),
            kms,
            Arc::new(KeyDidMappings::new()),
            ExchangeConfig::new("agent", num_algo, false),
        )
    }

    fn routing(key: PublicKey, endpoint: &str) -> Routing {
        Routing {
            endpoints: vec![endpoint.to_string()],
            recipient_key: key,
            routing_keys: vec![],
            mediator_id: None,
        }
    }

    fn out_of_band(role: OutOfBandRole, invitation_key: &PublicKey) -> OutOfBandRecord {
        OutOfBandRecord {
            id: format!("oob-{:?}", role),
            role,
            invitation: OutOfBandInvitation {
                id: "invitation-1".to_string(),
                label: "faber".to_string(),
                services: vec![DidCommV1Service::new(
                    "#inline-0".to_string(),
                    "https://faber.example".to_string(),
                    vec![DidKey::new(invitation_key.clone()).did()],
                    vec![],
                    0,
                )],
            },
            alias: Some("alice".to_string()),
            mediator_id: None,
            auto_accept_connection: None,
        }
    }

    struct Parties {
        requester: Protocol,
        responder: Protocol,
        requester_key: PublicKey,
        requester_oob: OutOfBandRecord,
        responder_oob: OutOfBandRecord,
    }

    fn parties(num_algo: u8) -> Parties {
        let requester_kms = FakeKms::new();
        let responder_kms = FakeKms::new();

        let requester_key = requester_kms.generate();
        let invitation_key = responder_kms.generate();

        Parties {
            requester: protocol(requester_kms, num_algo),
            responder: protocol(responder_kms, num_algo),
            requester_key,
            requester_oob: out_of_band(OutOfBandRole::Receiver, &invitation_key),
            responder_oob: out_of_band(OutOfBandRole::Sender, &invitation_key),
        }
    }

    #[tokio::test]
    async fn test_full_handshake() {
        let parties = parties(1);
        let params = RequestParams::new(routing(
            parties.requester_key.clone(),
            "https://alice.example",
        ));

        let (request, requester_record) = parties
            .requester
            .create_request(&parties.requester_oob, params)
            .await
            .unwrap();

        assert_eq!(requester_record.state(), DidExchangeState::RequestSent);
        assert_eq!(requester_record.did(), Some(request.did()));
        assert_eq!(requester_record.thread_id(), Some(request.id()));
        assert_eq!(requester_record.their_label(), Some("faber"));
        assert_eq!(request.label(), "agent");
        assert_eq!(request.parent_thread_id(), Some("invitation-1"));

        let attached = DidDocument::from_slice(&request.did_doc().unwrap().payload().unwrap()).unwrap();
        assert!(numalgo1::verify(request.did(), &attached).is_ok());

        let responder_record = parties
            .responder
            .process_request(&request, &parties.responder_oob)
            .await
            .unwrap();

        assert_eq!(responder_record.state(), DidExchangeState::RequestReceived);
        assert_eq!(responder_record.role(), Role::Responder);
        assert_eq!(responder_record.their_did(), Some(request.did()));
        assert_eq!(responder_record.thread_id(), Some(request.id()));
        assert_eq!(responder_record.alias(), Some("alice"));

        let (response, responder_record) = parties
            .responder
            .create_response(responder_record, &parties.responder_oob, None)
            .await
            .unwrap();

        assert_eq!(responder_record.state(), DidExchangeState::ResponseSent);
        assert!(response.did().starts_with("did:peer:1"));
        assert!(response.did_doc().is_some());
        assert!(response.did_rotate().is_none());

        let requester_record = parties
            .requester
            .process_response(&response, requester_record, &parties.requester_oob)
            .await
            .unwrap();

        assert_eq!(requester_record.state(), DidExchangeState::ResponseReceived);
        assert_eq!(requester_record.their_did(), Some(response.did()));

        let (complete, requester_record) = parties
            .requester
            .create_complete(requester_record, &parties.requester_oob)
            .await
            .unwrap();
        assert_eq!(requester_record.state(), DidExchangeState::Completed);

        let responder_record = parties
            .responder
            .process_complete(&complete, responder_record, &parties.responder_oob)
            .await
            .unwrap();
        assert_eq!(responder_record.state(), DidExchangeState::Completed);
    }

    #[tokio::test]
    async fn test_request_with_numalgo2_has_no_attachment() {
        let parties = parties(2);
        let params = RequestParams::new(routing(
            parties.requester_key.clone(),
            "https://alice.example",
        ));

        let (request, record) = parties
            .requester
            .create_request(&parties.requester_oob, params)
            .await
            .unwrap();

        assert!(request.did().starts_with("did:peer:2"));
        assert!(request.did_doc().is_none());
        assert_eq!(record.state(), DidExchangeState::RequestSent);

        let err = parties
            .responder
            .process_request(&request, &parties.responder_oob)
            .await
            .unwrap_err();
        assert_eq!(err.problem_code(), Some(ProblemCode::RequestNotAccepted));
    }

    #[tokio::test]
    async fn test_process_request_without_invitation_reference() {
        let parties = parties(1);
        let params = RequestParams::new(routing(
            parties.requester_key.clone(),
            "https://alice.example",
        ));

        let (request, _) = parties
            .requester
            .create_request(&parties.requester_oob, params)
            .await
            .unwrap();

        let forged = RequestMessage::new("alice", "another-invitation", request.did())
            .with_did_doc(request.did_doc().cloned().unwrap());

        let err = parties
            .responder
            .process_request(&forged, &parties.responder_oob)
            .await
            .unwrap_err();

        assert_eq!(err.problem_code(), Some(ProblemCode::RequestNotAccepted));
        assert!(err.to_problem_report(forged.thread_id()).is_some());
    }

    #[tokio::test]
    async fn test_process_request_signed_by_unrelated_key() {
        let parties = parties(1);
        let params = RequestParams::new(routing(
            parties.requester_key.clone(),
            "https://alice.example",
        ));

        let (request, _) = parties
            .requester
            .create_request(&parties.requester_oob, params)
            .await
            .unwrap();

        let document =
            DidDocument::from_slice(&request.did_doc().unwrap().payload().unwrap()).unwrap();

        let mallory = FakeKms::new();
        let mallory_key = mallory.generate();
        let attachment =
            create_signed_attachment(&mallory, SignedData::Document(&document), &[mallory_key])
                .await
                .unwrap();

        let forged = RequestMessage::new("alice", "invitation-1", request.did())
            .with_did_doc(attachment);

        let err = parties
            .responder
            .process_request(&forged, &parties.responder_oob)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ConnectionError::problem(
                ProblemCode::RequestNotAccepted,
                "DID Document signature is invalid."
            )
        );
    }

    #[tokio::test]
    async fn test_process_request_missing_signature() {
        let parties = parties(1);
        let params = RequestParams::new(routing(
            parties.requester_key.clone(),
            "https://alice.example",
        ));

        let (request, _) = parties
            .requester
            .create_request(&parties.requester_oob, params)
            .await
            .unwrap();

        let unsigned = Attachment::new(
            Some("application/json"),
            AttachmentData {
                base64: request.did_doc().unwrap().data.base64.clone(),
                jws: None,
            },
        );
        let forged =
            RequestMessage::new("alice", "invitation-1", request.did()).with_did_doc(unsigned);

        let err = parties
            .responder
            .process_request(&forged, &parties.responder_oob)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ConnectionError::problem(
                ProblemCode::RequestNotAccepted,
                "DID Document signature is missing."
            )
        );
    }

    #[tokio::test]
    async fn test_process_request_replayed() {
        let parties = parties(1);
        let params = RequestParams::new(routing(
            parties.requester_key.clone(),
            "https://alice.example",
        ));

        let (request, _) = parties
            .requester
            .create_request(&parties.requester_oob, params)
            .await
            .unwrap();

        let thread_id = request.thread_id().to_string();
        let mut repo = MockFakeConnectionRepo::new();
        repo.expect_find_connections()
            .withf(move |query| query.thread_id.as_deref() == Some(thread_id.as_str()))
            .times(1)
            .returning(|_| {
                Ok(vec![ConnectionRecord::new(
                    Role::Responder,
                    DidExchangeState::RequestReceived,
                    "oob-Sender",
                )])
            });
        repo.expect_save_connection().times(0);

        let mut did_repo = MockFakeDidRepo::new();
        did_repo.expect_save_did_record().times(0);
        did_repo.expect_find_did_records().times(0);

        let responder = DidExchangeProtocol::new(
            repo,
            did_repo,
            FakeKms::new(),
            Arc::new(KeyDidMappings::new()),
            ExchangeConfig::new("agent", 1, false),
        );

        let err = responder
            .process_request(&request, &parties.responder_oob)
            .await
            .unwrap_err();
        assert_eq!(err.problem_code(), Some(ProblemCode::RequestNotAccepted));
    }

    #[tokio::test]
    async fn test_create_request_stores_nothing_when_signing_fails() {
        let mut connection_repo = MockFakeConnectionRepo::new();
        connection_repo.expect_save_connection().times(0);
        connection_repo.expect_update_connection().times(0);

        let mut did_repo = MockFakeDidRepo::new();
        did_repo.expect_save_did_record().times(0);

        let requester = DidExchangeProtocol::new(
            connection_repo,
            did_repo,
            FakeKms::new(),
            Arc::new(KeyDidMappings::new()),
            ExchangeConfig::new("agent", 1, false),
        );

        let invitation_key = FakeKms::new().generate();
        let foreign_key = FakeKms::new().generate();
        let err = requester
            .create_request(
                &out_of_band(OutOfBandRole::Receiver, &invitation_key),
                RequestParams::new(routing(foreign_key, "https://alice.example")),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectionError::KmsError(_)));
    }

    fn responder_record(their_did: &str) -> ConnectionRecord {
        ConnectionRecord::new(Role::Responder, DidExchangeState::RequestReceived, "oob-Sender")
            .with_thread_id("thread-1")
            .with_their_did(their_did)
    }

    fn requester_record() -> ConnectionRecord {
        let mut record =
            ConnectionRecord::new(Role::Requester, DidExchangeState::RequestSent, "oob-Receiver")
                .with_thread_id("thread-1");
        record
            .set_did("did:peer:1zQmdYsuMmPeb3c8fa2wAcS4J3N75HGb5of5Btq5Pq1SRv2o")
            .unwrap();
        record
    }

    const NUMALGO2_DID: &str = "did:peer:2.Vz6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK.Ez6LSj72tK8brWgZja8NLRwPigth2T9QRiG1uH9oKZuKjdh9p";

    #[tokio::test]
    async fn test_response_with_did_rotate() {
        let parties = parties(2);

        let (response, record) = parties
            .responder
            .create_response(responder_record(NUMALGO2_DID), &parties.responder_oob, None)
            .await
            .unwrap();

        assert_eq!(record.state(), DidExchangeState::ResponseSent);
        assert!(response.did().starts_with("did:peer:2"));
        assert!(response.did_doc().is_none());
        assert!(response.did_rotate().is_some());
        assert_eq!(response.thread_id(), Some("thread-1"));

        let record = parties
            .requester
            .process_response(&response, requester_record(), &parties.requester_oob)
            .await
            .unwrap();

        assert_eq!(record.state(), DidExchangeState::ResponseReceived);
        assert_eq!(record.their_did(), Some(response.did()));
    }

    #[tokio::test]
    async fn test_did_rotate_signed_by_non_invitation_key() {
        let parties = parties(2);

        let (response, _) = parties
            .responder
            .create_response(responder_record(NUMALGO2_DID), &parties.responder_oob, None)
            .await
            .unwrap();

        let mallory = FakeKms::new();
        let mallory_key = mallory.generate();
        let attachment =
            create_signed_attachment(&mallory, SignedData::Did(response.did()), &[mallory_key])
                .await
                .unwrap();
        let forged = ResponseMessage::new("thread-1", response.did()).with_did_rotate(attachment);

        let err = parties
            .requester
            .process_response(&forged, requester_record(), &parties.requester_oob)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ConnectionError::problem(
                ProblemCode::ResponseNotAccepted,
                "DID Rotate signature is invalid."
            )
        );
    }

    #[tokio::test]
    async fn test_process_response_wrong_thread() {
        let parties = parties(2);

        let (response, _) = parties
            .responder
            .create_response(responder_record(NUMALGO2_DID), &parties.responder_oob, None)
            .await
            .unwrap();

        let record =
            ConnectionRecord::new(Role::Requester, DidExchangeState::RequestSent, "oob-Receiver")
                .with_thread_id("thread-2");

        let err = parties
            .requester
            .process_response(&response, record, &parties.requester_oob)
            .await
            .unwrap_err();

        assert_eq!(err.problem_code(), Some(ProblemCode::ResponseNotAccepted));
    }

    #[tokio::test]
    async fn test_create_response_without_routing_or_services() {
        let parties = parties(1);
        let mut oob = parties.responder_oob.clone();
        oob.invitation.services.clear();

        let err = parties
            .responder
            .create_response(responder_record(NUMALGO2_DID), &oob, None)
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectionError::RoutingError(_)));
    }

    #[tokio::test]
    async fn test_out_of_order_message_is_rejected() {
        let parties = parties(1);
        let record =
            ConnectionRecord::new(Role::Requester, DidExchangeState::InvitationReceived, "oob-Receiver")
                .with_thread_id("thread-1");
        let response = ResponseMessage::new("thread-1", NUMALGO2_DID);

        let err = parties
            .requester
            .process_response(&response, record, &parties.requester_oob)
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectionError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_process_complete_checks_threads() {
        let parties = parties(1);
        let record = || {
            ConnectionRecord::new(Role::Responder, DidExchangeState::ResponseSent, "oob-Sender")
                .with_thread_id("thread-1")
        };

        let wrong_thread = CompleteMessage::new("thread-2", "invitation-1");
        let err = parties
            .responder
            .process_complete(&wrong_thread, record(), &parties.responder_oob)
            .await
            .unwrap_err();
        assert_eq!(err.problem_code(), Some(ProblemCode::CompleteRejected));

        let wrong_parent = CompleteMessage::new("thread-1", "invitation-2");
        let err = parties
            .responder
            .process_complete(&wrong_parent, record(), &parties.responder_oob)
            .await
            .unwrap_err();
        assert_eq!(err.problem_code(), Some(ProblemCode::CompleteRejected));

        let complete = CompleteMessage::new("thread-1", "invitation-1");
        let completed = parties
            .responder
            .process_complete(&complete, record(), &parties.responder_oob)
            .await
            .unwrap();
        assert_eq!(completed.state(), DidExchangeState::Completed);
    }

    #[tokio::test]
    async fn test_abandon() {
        let parties = parties(1);
        let record = parties
            .requester
            .abandon(requester_record(), ProblemCode::ResponseNotAccepted)
            .await
            .unwrap();

        assert_eq!(record.state(), DidExchangeState::Abandoned);
        assert_eq!(record.problem_code(), Some(ProblemCode::ResponseNotAccepted));

        let mut completed = requester_record();
        completed.set_state(DidExchangeState::Completed).unwrap();
        let err = parties
            .requester
            .abandon(completed, ProblemCode::CompleteRejected)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_process_problem_report() {
        let parties = parties(1);

        let report = ProblemReportMessage::new("thread-1", ProblemCode::RequestNotAccepted, "no");
        let record = parties
            .requester
            .process_problem_report(&report, requester_record())
            .await
            .unwrap();
        assert_eq!(record.state(), DidExchangeState::Abandoned);

        let other = ProblemReportMessage::new("thread-9", ProblemCode::RequestNotAccepted, "no");
        assert!(parties
            .requester
            .process_problem_report(&other, requester_record())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_find_by_thread_id() {
        let mut repo = MockFakeConnectionRepo::new();
        repo.expect_find_connections()
            .withf(|query| query.thread_id.as_deref() == Some("thread-1"))
            .returning(|_| Ok(vec![requester_record()]));
        repo.expect_find_connections().returning(|_| Ok(vec![]));

        let protocol = DidExchangeProtocol::new(
            repo,
            did_repo(),
            FakeKms::new(),
            Arc::new(KeyDidMappings::new()),
            ExchangeConfig::default(),
        );

        let record = protocol.find_by_thread_id("thread-1").await.unwrap();
        assert_eq!(record.thread_id(), Some("thread-1"));
        assert!(protocol.find_by_thread_id("thread-2").await.is_err());
    }

    #[tokio::test]
    async fn test_document_from_services_rejects_non_ed25519() {
        let parties = parties(1);
        let key = PublicKey::from_fingerprint("z6LSj72tK8brWgZja8NLRwPigth2T9QRiG1uH9oKZuKjdh9p").unwrap();
        let services = routing_to_services(&routing(key, "https://alice.example"));

        let err = parties
            .requester
            .document_from_services(&services)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::RoutingError(_)));
    }
}
