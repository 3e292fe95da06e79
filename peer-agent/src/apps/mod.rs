mod db;
pub use db::{Builder as DbBuilder, Collection as DbCollection};

mod identity;
pub use identity::{ConnectionRepository, DidRepository};

mod kms;
pub use kms::Ed25519Kms;
