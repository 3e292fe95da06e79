use rst_common::standard::serde::{self, Deserialize};

use crate::common::types::{CommonError, ToValidate};

#[derive(Deserialize, Debug, Clone)]
#[serde(crate = "self::serde")]
pub struct Agent {
    pub(super) name: String,

    #[serde(default)]
    pub(super) log_filter: Option<String>,
}

impl Agent {
    pub fn name(&self) -> String {
        self.name.to_owned()
    }

    pub fn log_filter(&self) -> Option<String> {
        self.log_filter.to_owned()
    }
}

impl Default for Agent {
    fn default() -> Self {
        Self {
            name: "".to_string(),
            log_filter: None,
        }
    }
}

impl ToValidate for Agent {
    fn validate(&self) -> Result<(), CommonError> {
        if self.name.is_empty() {
            return Err(CommonError::ValidationError(
                "config: agent:name is missing".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstdev_config::format::use_toml;
    use rstdev_config::parser::from_file;
    use rstdev_config::{types::ConfigError, Builder};

    use crate::common::helpers::testconfig::fixture_path;

    #[test]
    fn test_parse_agent_config() -> Result<(), ConfigError> {
        let config_toml = {
            let config_builder: Result<Agent, ConfigError> =
                Builder::new(from_file(fixture_path("config_agent.toml")))
                    .fetch()?
                    .parse(use_toml);

            config_builder
        };

        assert!(!config_toml.is_err());

        let config_agent = config_toml.unwrap();
        assert_eq!(config_agent.name(), "alice".to_string());
        assert_eq!(config_agent.log_filter(), Some("prople_peer_core=info".to_string()));
        assert!(config_agent.validate().is_ok());
        Ok(())
    }

    #[test]
    fn test_missing_name() {
        let validation = Agent::default().validate();
        assert!(matches!(
            validation.unwrap_err(),
            CommonError::ValidationError(_)
        ));
    }
}
