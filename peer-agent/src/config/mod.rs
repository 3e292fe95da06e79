mod agent;
pub use agent::Agent;

mod exchange;

mod database;
pub use database::{Database, RocksDBCommon, RocksDBOptions};

mod config;
pub use config::Config;

mod parser;
pub use parser::Parser;
