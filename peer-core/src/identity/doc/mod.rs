//! `doc` contains the `DID Document` model
//!
//! A document is assembled with [`DidDocumentBuilder`] into a [`DraftDocument`], which has
//! no identifier. Once the identifier is known (for peer dids it is computed from the
//! draft content) the draft becomes a [`DidDocument`]. The identifier can not be changed
//! after that point.
//!
//! The five verification relationships are addressed through [`Purpose`], each purpose
//! is bound to its relationship array by the fixed [`document::PURPOSE_TABLE`].
pub mod types;
pub use types::{
    DocError, KeyMaterial, OneOrMany, Purpose, VerificationEntry, VerificationMethod,
};

pub mod service;
pub use service::{
    DidCommV1Service, DidCommV2Endpoint, DidCommV2Service, GenericService, IndyAgentService,
    Service,
};

pub mod document;
pub use document::{DidDocument, DocumentAccessor, DocumentBody, DraftDocument};

mod builder;
pub use builder::DidDocumentBuilder;

pub mod mapping;
pub use mapping::KeyDidMappings;
