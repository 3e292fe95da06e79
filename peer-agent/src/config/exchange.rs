use prople_peer_core::identity::connection::ExchangeConfig;

use crate::common::types::{CommonError, ToValidate};

impl ToValidate for ExchangeConfig {
    fn validate(&self) -> Result<(), CommonError> {
        ExchangeConfig::validate(self)
            .map_err(|err| CommonError::ValidationError(format!("config: exchange: {}", err)))
    }
}
