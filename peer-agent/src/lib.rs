//! `prople-peer-agent` wires the `prople-peer-core` DID Exchange protocol with its collaborators
//!
//! The core crate only defines storage and key management as traits. This crate provides
//! the concrete implementations used by an agent process:
//!
//! - a RocksDB storage, through `rstdev-storage`, used by the did and connection repositories
//! - an Ed25519 key manager
//! - a TOML configuration file parsed with `rstdev-config`
//! - a `tracing` subscriber which also receives the `log` records emitted by the core crate
//!
//! Everything is reachable from [`PeerAgent`]
use std::sync::Arc;

use rst_common::standard::uuid::Uuid;
use rst_common::with_logging::log::info;
use rstdev_storage::engine::rocksdb::executor::Executor;

use prople_peer_core::identity::connection::{
    ConnectionError, DidExchangeProtocol, KeyManagementBuilder, OutOfBandInvitation,
    OutOfBandRecord, OutOfBandRole, Routing,
};
use prople_peer_core::identity::doc::{DidCommV1Service, KeyDidMappings};
use prople_peer_core::identity::key::{DidKey, KeyType};

pub mod common;
use common::helpers;
use common::types::CommonError;

mod config;
pub use config::{Agent, Config, Database};

use config::Parser as ConfigManager;

pub mod logging;

mod apps;
pub use apps::{ConnectionRepository, DbBuilder, DidRepository, Ed25519Kms};

pub type AgentProtocol = DidExchangeProtocol<ConnectionRepository, DidRepository, Ed25519Kms>;

/// `PeerAgent` owns the storage and the keys of a single agent
///
/// Each call to [`PeerAgent::protocol`] returns a protocol instance sharing the same
/// storage and key manager
pub struct PeerAgent {
    config: Config,
    db: Executor,
    kms: Ed25519Kms,
    mappings: Arc<KeyDidMappings>,
}

impl PeerAgent {
    pub fn new(conf_file: String) -> Result<Self, CommonError> {
        let config = ConfigManager::new(conf_file)
            .parse()
            .map_err(|err| CommonError::ConfigError(err.to_string()))?;

        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self, CommonError> {
        helpers::validate(config.clone())?;

        let db = DbBuilder::new(config.clone())
            .build(|cfg| (cfg.db().get_common(), cfg.db().get_options()))?;

        Ok(Self {
            config,
            db,
            kms: Ed25519Kms::new(),
            mappings: Arc::new(KeyDidMappings::new()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn init_logging(&self) -> Result<(), CommonError> {
        logging::init(self.config.agent().log_filter().as_deref())?;
        info!("agent {} started", self.config.agent().name());

        Ok(())
    }

    pub fn protocol(&self) -> AgentProtocol {
        DidExchangeProtocol::new(
            ConnectionRepository::new(self.db.clone()),
            DidRepository::new(self.db.clone()),
            self.kms.clone(),
            self.mappings.clone(),
            self.config.exchange().clone(),
        )
    }

    /// Creates a routing backed by a new Ed25519 key of this agent
    pub async fn create_routing(&self, endpoints: Vec<String>) -> Result<Routing, ConnectionError> {
        let handle = self.kms.create_key(KeyType::Ed25519).await?;

        Ok(Routing {
            endpoints,
            recipient_key: handle.public_key,
            routing_keys: vec![],
            mediator_id: None,
        })
    }

    /// Creates an invitation with a single inline service, the invitation key is kept by
    /// this agent so the response can be signed with it
    pub async fn create_invitation(
        &self,
        endpoint: &str,
    ) -> Result<OutOfBandRecord, ConnectionError> {
        let handle = self.kms.create_key(KeyType::Ed25519).await?;
        let service = DidCommV1Service::new(
            "#inline-0".to_string(),
            endpoint.to_string(),
            vec![DidKey::new(handle.public_key).did()],
            vec![],
            0,
        );

        let exchange = self.config.exchange();
        Ok(OutOfBandRecord {
            id: Uuid::new_v4().to_string(),
            role: OutOfBandRole::Sender,
            invitation: OutOfBandInvitation {
                id: Uuid::new_v4().to_string(),
                label: exchange.label.clone(),
                services: vec![service],
            },
            alias: None,
            mediator_id: None,
            auto_accept_connection: Some(exchange.auto_accept_connections),
        })
    }

    pub fn receive_invitation(
        &self,
        invitation: OutOfBandInvitation,
        alias: Option<String>,
    ) -> OutOfBandRecord {
        OutOfBandRecord {
            id: Uuid::new_v4().to_string(),
            role: OutOfBandRole::Receiver,
            invitation,
            alias,
            mediator_id: None,
            auto_accept_connection: None,
        }
    }
}
