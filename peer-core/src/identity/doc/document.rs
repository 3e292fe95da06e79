use rst_common::standard::serde::{self, Deserialize, Deserializer, Serialize};
use rst_common::standard::serde_json;

use rstdev_domain::entity::ToJSON;
use rstdev_domain::BaseError;

use crate::identity::key::{convert_ed25519_to_x25519, DidKey, KeyType, PublicKey};

use super::mapping::KeyDidMappings;
use super::service::Service;
use super::types::{DocError, OneOrMany, Purpose, VerificationEntry, VerificationMethod};

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    OneOrMany::<String>::deserialize(deserializer).map(OneOrMany::into_vec)
}

/// `DocumentBody` is everything a DID document holds except its identifier
///
/// Both [`DraftDocument`] and [`DidDocument`] flatten it, so the serialized form of a
/// draft is exactly the finalized document without its `id`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(crate = "self::serde", rename_all = "camelCase")]
pub struct DocumentBody {
    #[serde(rename = "@context", default, deserialize_with = "one_or_many")]
    pub(super) context: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) also_known_as: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) controller: Option<OneOrMany<String>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(super) verification_method: Vec<VerificationMethod>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(super) service: Vec<Service>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(super) authentication: Vec<VerificationEntry>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(super) assertion_method: Vec<VerificationEntry>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(super) key_agreement: Vec<VerificationEntry>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(super) capability_invocation: Vec<VerificationEntry>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(super) capability_delegation: Vec<VerificationEntry>,
}

/// `PurposeSlot` binds a [`Purpose`] to the relationship array it reads and writes
pub struct PurposeSlot {
    pub purpose: Purpose,
    pub get: fn(&DocumentBody) -> &Vec<VerificationEntry>,
    pub get_mut: fn(&mut DocumentBody) -> &mut Vec<VerificationEntry>,
}

fn assertion(body: &DocumentBody) -> &Vec<VerificationEntry> {
    &body.assertion_method
}

fn assertion_mut(body: &mut DocumentBody) -> &mut Vec<VerificationEntry> {
    &mut body.assertion_method
}

fn encryption(body: &DocumentBody) -> &Vec<VerificationEntry> {
    &body.key_agreement
}

fn encryption_mut(body: &mut DocumentBody) -> &mut Vec<VerificationEntry> {
    &mut body.key_agreement
}

fn verification(body: &DocumentBody) -> &Vec<VerificationEntry> {
    &body.authentication
}

fn verification_mut(body: &mut DocumentBody) -> &mut Vec<VerificationEntry> {
    &mut body.authentication
}

fn invocation(body: &DocumentBody) -> &Vec<VerificationEntry> {
    &body.capability_invocation
}

fn invocation_mut(body: &mut DocumentBody) -> &mut Vec<VerificationEntry> {
    &mut body.capability_invocation
}

fn delegation(body: &DocumentBody) -> &Vec<VerificationEntry> {
    &body.capability_delegation
}

fn delegation_mut(body: &mut DocumentBody) -> &mut Vec<VerificationEntry> {
    &mut body.capability_delegation
}

/// Relationship arrays in the fixed `A`, `E`, `V`, `I`, `D` order
pub static PURPOSE_TABLE: [PurposeSlot; 5] = [
    PurposeSlot {
        purpose: Purpose::Assertion,
        get: assertion,
        get_mut: assertion_mut,
    },
    PurposeSlot {
        purpose: Purpose::Encryption,
        get: encryption,
        get_mut: encryption_mut,
    },
    PurposeSlot {
        purpose: Purpose::Verification,
        get: verification,
        get_mut: verification_mut,
    },
    PurposeSlot {
        purpose: Purpose::CapabilityInvocation,
        get: invocation,
        get_mut: invocation_mut,
    },
    PurposeSlot {
        purpose: Purpose::CapabilityDelegation,
        get: delegation,
        get_mut: delegation_mut,
    },
];

impl Purpose {
    pub fn slot(&self) -> &'static PurposeSlot {
        match self {
            Purpose::Assertion => &PURPOSE_TABLE[0],
            Purpose::Encryption => &PURPOSE_TABLE[1],
            Purpose::Verification => &PURPOSE_TABLE[2],
            Purpose::CapabilityInvocation => &PURPOSE_TABLE[3],
            Purpose::CapabilityDelegation => &PURPOSE_TABLE[4],
        }
    }
}

impl DocumentBody {
    pub fn relationship(&self, purpose: Purpose) -> &Vec<VerificationEntry> {
        (purpose.slot().get)(self)
    }

    pub(super) fn relationship_mut(&mut self, purpose: Purpose) -> &mut Vec<VerificationEntry> {
        (purpose.slot().get_mut)(self)
    }
}

/// `DocumentAccessor` gives read access to any document, drafted or finalized
///
/// Every string reference is resolved through [`DocumentAccessor::dereference`], an
/// unresolvable reference is always an error
pub trait DocumentAccessor {
    fn body(&self) -> &DocumentBody;

    fn contexts(&self) -> &[String] {
        &self.body().context
    }

    fn also_known_as(&self) -> Option<&Vec<String>> {
        self.body().also_known_as.as_ref()
    }

    fn controllers(&self) -> Vec<&String> {
        self.body()
            .controller
            .as_ref()
            .map(OneOrMany::to_vec)
            .unwrap_or_default()
    }

    fn verification_methods(&self) -> &[VerificationMethod] {
        &self.body().verification_method
    }

    fn services(&self) -> &[Service] {
        &self.body().service
    }

    fn relationship(&self, purpose: Purpose) -> &[VerificationEntry] {
        self.body().relationship(purpose)
    }

    /// Finds a verification method by reference, looking at `verificationMethod` first
    /// and then at embedded methods of the five relationships
    fn dereference(&self, reference: &str) -> Result<&VerificationMethod, DocError> {
        let body = self.body();
        let top_level = body.verification_method.iter();
        let embedded = PURPOSE_TABLE
            .iter()
            .flat_map(|slot| (slot.get)(body).iter())
            .filter_map(|entry| match entry {
                VerificationEntry::Embedded(vm) => Some(vm),
                VerificationEntry::Reference(_) => None,
            });

        top_level
            .chain(embedded)
            .find(|vm| vm.matches(reference))
            .ok_or_else(|| DocError::DereferenceError(reference.to_string()))
    }

    fn resolve_entry<'a>(
        &'a self,
        entry: &'a VerificationEntry,
    ) -> Result<&'a VerificationMethod, DocError> {
        match entry {
            VerificationEntry::Reference(reference) => self.dereference(reference),
            VerificationEntry::Embedded(vm) => Ok(vm),
        }
    }

    /// Raw keys of every `authentication` entry
    fn authentication_keys(&self, mappings: &KeyDidMappings) -> Result<Vec<PublicKey>, DocError> {
        self.relationship(Purpose::Verification)
            .iter()
            .map(|entry| {
                let vm = self.resolve_entry(entry)?;
                mappings.key_from_verification_method(vm)
            })
            .collect()
    }

    /// DIDComm services ordered for sending: v1 style services by descending priority,
    /// then DIDComm v2 services
    fn didcomm_services(&self) -> Vec<&Service> {
        let mut legacy: Vec<&Service> = self
            .services()
            .iter()
            .filter(|svc| matches!(svc, Service::IndyAgent(_) | Service::DidCommV1(_)))
            .collect();

        legacy.sort_by(|a, b| b.priority().cmp(&a.priority()));

        let v2 = self
            .services()
            .iter()
            .filter(|svc| matches!(svc, Service::DidCommV2(_)));

        legacy.into_iter().chain(v2).collect()
    }

    /// Recipient keys of every DIDComm service, X25519 keys of v2 services are taken
    /// from `keyAgreement`. Duplicates are removed while keeping the first position
    fn recipient_keys(&self, mappings: &KeyDidMappings) -> Result<Vec<PublicKey>, DocError> {
        let mut keys: Vec<PublicKey> = Vec::new();

        for service in self.didcomm_services() {
            let resolved = match service {
                Service::DidCommV2(_) => self
                    .relationship(Purpose::Encryption)
                    .iter()
                    .map(|entry| {
                        let vm = self.resolve_entry(entry)?;
                        mappings.key_from_verification_method(vm)
                    })
                    .collect::<Result<Vec<PublicKey>, DocError>>()?,
                _ => service
                    .recipient_keys()
                    .iter()
                    .map(|reference| self.resolve_key_reference(reference, mappings))
                    .collect::<Result<Vec<PublicKey>, DocError>>()?,
            };

            for key in resolved {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }

        Ok(keys)
    }

    /// Resolves a key reference that may be a `did:key` url, a reference inside the
    /// document, or a bare base58 Ed25519 key as used by Indy agent services
    fn resolve_key_reference(
        &self,
        reference: &str,
        mappings: &KeyDidMappings,
    ) -> Result<PublicKey, DocError> {
        if DidKey::is_did_key(reference) {
            return Ok(DidKey::from_did(reference)?.key().to_owned());
        }

        if reference.contains('#') {
            let vm = self.dereference(reference)?;
            return mappings.key_from_verification_method(vm);
        }

        Ok(PublicKey::from_base58(KeyType::Ed25519, reference)?)
    }

    /// Same as [`DocumentAccessor::recipient_keys`] with X25519 keys mapped back to the
    /// Ed25519 authentication key sharing the same secret, used to pick signing keys
    fn recipient_signing_keys(&self, mappings: &KeyDidMappings) -> Result<Vec<PublicKey>, DocError> {
        let authentication = self.authentication_keys(mappings)?;
        let mut keys = Vec::new();

        for key in self.recipient_keys(mappings)? {
            let signing = match key.key_type() {
                KeyType::X25519 => authentication
                    .iter()
                    .find(|candidate| {
                        candidate.key_type() == KeyType::Ed25519
                            && convert_ed25519_to_x25519(candidate).ok().as_ref() == Some(&key)
                    })
                    .cloned(),
                KeyType::Ed25519 => Some(key),
                _ => None,
            };

            if let Some(signing) = signing {
                if !keys.contains(&signing) {
                    keys.push(signing);
                }
            }
        }

        Ok(keys)
    }
}

/// `DraftDocument` is a document under construction, it has no identifier yet
///
/// A peer did is computed from the draft content, after that the draft is turned into
/// a [`DidDocument`] with [`DraftDocument::into_document`]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(crate = "self::serde")]
pub struct DraftDocument {
    #[serde(flatten)]
    body: DocumentBody,
}

impl DraftDocument {
    pub(super) fn new(body: DocumentBody) -> Self {
        Self { body }
    }

    pub fn into_document(self, id: String) -> DidDocument {
        DidDocument {
            id,
            body: self.body,
        }
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, DocError> {
        serde_json::to_vec(self).map_err(|err| DocError::JSONError(err.to_string()))
    }
}

impl DocumentAccessor for DraftDocument {
    fn body(&self) -> &DocumentBody {
        &self.body
    }
}

/// `DidDocument` is a finalized document, its `id` can not be changed anymore
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct DidDocument {
    id: String,

    #[serde(flatten)]
    body: DocumentBody,
}

impl DidDocument {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Drops the identifier, the reverse of [`DraftDocument::into_document`]
    pub fn into_draft(self) -> DraftDocument {
        DraftDocument { body: self.body }
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, DocError> {
        serde_json::to_vec(self).map_err(|err| DocError::JSONError(err.to_string()))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, DocError> {
        serde_json::from_slice(bytes).map_err(|err| DocError::JSONError(err.to_string()))
    }
}

impl DocumentAccessor for DidDocument {
    fn body(&self) -> &DocumentBody {
        &self.body
    }
}

impl ToJSON for DidDocument {
    fn to_json(&self) -> Result<String, BaseError> {
        serde_json::to_string(self).map_err(|err| BaseError::ToJSONError(err.to_string()))
    }
}
