use super::document::{DocumentBody, DraftDocument};
use super::service::Service;
use super::types::{OneOrMany, Purpose, VerificationEntry, VerificationMethod, DID_V1_CONTEXT};

/// `DidDocumentBuilder` assembles a [`DraftDocument`] step by step
///
/// Contexts and controllers are idempotent, adding the same value twice keeps a single
/// entry. Verification methods, relationship entries and services are appended as given,
/// their order is part of the document content
#[derive(Debug, Clone)]
pub struct DidDocumentBuilder {
    body: DocumentBody,
}

impl Default for DidDocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DidDocumentBuilder {
    pub fn new() -> Self {
        let body = DocumentBody {
            context: vec![DID_V1_CONTEXT.to_string()],
            ..Default::default()
        };

        Self { body }
    }

    pub fn add_context(mut self, context: &str) -> Self {
        if !self.body.context.iter().any(|ctx| ctx == context) {
            self.body.context.push(context.to_string());
        }

        self
    }

    pub fn add_controller(mut self, controller: &str) -> Self {
        let mut controllers = self
            .body
            .controller
            .take()
            .map(OneOrMany::into_vec)
            .unwrap_or_default();

        if !controllers.iter().any(|ctrl| ctrl == controller) {
            controllers.push(controller.to_string());
        }

        self.body.controller = match controllers.len() {
            1 => controllers.pop().map(OneOrMany::One),
            _ => Some(OneOrMany::Many(controllers)),
        };

        self
    }

    pub fn add_also_known_as(mut self, alias: &str) -> Self {
        let aliases = self.body.also_known_as.get_or_insert_with(Vec::new);
        if !aliases.iter().any(|known| known == alias) {
            aliases.push(alias.to_string());
        }

        self
    }

    pub fn add_service(mut self, service: impl Into<Service>) -> Self {
        self.body.service.push(service.into());
        self
    }

    pub fn add_verification_method(mut self, vm: VerificationMethod) -> Self {
        self.body.verification_method.push(vm);
        self
    }

    /// Appends an entry to the relationship selected by `purpose`
    pub fn add_to_purpose(mut self, purpose: Purpose, entry: impl Into<VerificationEntry>) -> Self {
        self.body.relationship_mut(purpose).push(entry.into());
        self
    }

    pub fn add_authentication(self, entry: impl Into<VerificationEntry>) -> Self {
        self.add_to_purpose(Purpose::Verification, entry)
    }

    pub fn add_assertion_method(self, entry: impl Into<VerificationEntry>) -> Self {
        self.add_to_purpose(Purpose::Assertion, entry)
    }

    pub fn add_key_agreement(self, entry: impl Into<VerificationEntry>) -> Self {
        self.add_to_purpose(Purpose::Encryption, entry)
    }

    pub fn add_capability_invocation(self, entry: impl Into<VerificationEntry>) -> Self {
        self.add_to_purpose(Purpose::CapabilityInvocation, entry)
    }

    pub fn add_capability_delegation(self, entry: impl Into<VerificationEntry>) -> Self {
        self.add_to_purpose(Purpose::CapabilityDelegation, entry)
    }

    pub fn build(self) -> DraftDocument {
        DraftDocument::new(self.body)
    }
}
