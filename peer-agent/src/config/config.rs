use rst_common::standard::serde::{self, Deserialize};

use prople_peer_core::identity::connection::ExchangeConfig;

use crate::common::types::{CommonError, ToValidate};

use super::{Agent, Database};

#[derive(Deserialize, Debug, Clone)]
#[serde(crate = "self::serde")]
pub struct Config {
    pub(super) agent: Agent,

    #[serde(default)]
    pub(super) exchange: ExchangeConfig,

    pub(super) db: Database,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn exchange(&self) -> &ExchangeConfig {
        &self.exchange
    }

    pub fn db(&self) -> &Database {
        &self.db
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agent: Agent::default(),
            exchange: ExchangeConfig::default(),
            db: Database::default(),
        }
    }
}

impl ToValidate for Config {
    fn validate(&self) -> Result<(), CommonError> {
        _ = self.agent.validate()?;
        _ = ToValidate::validate(&self.exchange)?;
        _ = self.db.validate()?;

        Ok(())
    }
}
