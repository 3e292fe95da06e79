mod did;
pub use did::Repository as DidRepository;

mod connection;
pub use connection::Repository as ConnectionRepository;
