use rst_common::standard::serde::{self, Deserialize, Serialize};

use crate::identity::peer::NumAlgo;

use super::types::ConnectionError;

const DEFAULT_LABEL: &str = "prople-peer-agent";
const DEFAULT_REQUEST_NUM_ALGO: u8 = 1;

/// `ExchangeConfig` holds the defaults of the handshake
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde", default)]
pub struct ExchangeConfig {
    pub label: String,
    pub peer_num_algo_for_requests: u8,
    pub auto_accept_connections: bool,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
            peer_num_algo_for_requests: DEFAULT_REQUEST_NUM_ALGO,
            auto_accept_connections: false,
        }
    }
}

impl ExchangeConfig {
    pub fn new(label: &str, peer_num_algo_for_requests: u8, auto_accept_connections: bool) -> Self {
        Self {
            label: label.to_string(),
            peer_num_algo_for_requests,
            auto_accept_connections,
        }
    }

    /// numAlgo 0 can not carry services, so it is never used for requests
    pub fn num_algo(&self) -> Result<NumAlgo, ConnectionError> {
        let num_algo = NumAlgo::from_digit(self.peer_num_algo_for_requests)
            .map_err(|err| ConnectionError::ValidationError(err.to_string()))?;

        match num_algo {
            NumAlgo::InceptionKeyWithoutDoc => Err(ConnectionError::ValidationError(
                "peer_num_algo_for_requests can not be 0".to_string(),
            )),
            _ => Ok(num_algo),
        }
    }

    pub fn validate(&self) -> Result<(), ConnectionError> {
        if self.label.trim().is_empty() {
            return Err(ConnectionError::ValidationError(
                "label can not be empty".to_string(),
            ));
        }

        self.num_algo().map(|_| ())
    }
}
