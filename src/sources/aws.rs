//! AWS-backed secret and parameter stores.
//!
//! Clients are constructed by the caller (region, credentials and retry
//! policy are SDK concerns), then wrapped here.

use crate::error::{ConfigError, Result};
use async_trait::async_trait;

#[cfg(feature = "secrets-aws")]
pub use secrets::AwsSecretsManager;

#[cfg(feature = "parameters-aws")]
pub use parameters::AwsParameterStore;

#[cfg(feature = "secrets-aws")]
mod secrets {
    use super::*;
    use crate::sources::SecretsBackend;
    use aws_sdk_secretsmanager::Client;
    use aws_sdk_secretsmanager::error::DisplayErrorContext;

    /// [`SecretsBackend`] over AWS Secrets Manager.
    #[derive(Debug, Clone)]
    pub struct AwsSecretsManager {
        client: Client,
    }

    impl AwsSecretsManager {
        /// Wrap an existing client.
        pub fn new(client: Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl SecretsBackend for AwsSecretsManager {
        async fn get_secret_string(&self, secret_id: &str) -> Result<Option<String>> {
            match self.client.get_secret_value().secret_id(secret_id).send().await {
                Ok(output) => Ok(output.secret_string().map(str::to_string)),
                Err(err) => {
                    if err
                        .as_service_error()
                        .is_some_and(|e| e.is_resource_not_found_exception())
                    {
                        return Ok(None);
                    }
                    Err(ConfigError::BackendError(format!(
                        "GetSecretValue '{}' failed: {}",
                        secret_id,
                        DisplayErrorContext(&err)
                    )))
                }
            }
        }

        async fn is_available(&self) -> bool {
            self.client.config().region().is_some()
        }
    }
}

#[cfg(feature = "parameters-aws")]
mod parameters {
    use super::*;
    use crate::sources::{Parameter, ParameterBackend, ParameterPage};
    use aws_sdk_ssm::Client;
    use aws_sdk_ssm::error::DisplayErrorContext;

    /// [`ParameterBackend`] over AWS Systems Manager Parameter Store.
    #[derive(Debug, Clone)]
    pub struct AwsParameterStore {
        client: Client,
    }

    impl AwsParameterStore {
        /// Wrap an existing client.
        pub fn new(client: Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl ParameterBackend for AwsParameterStore {
        async fn get_parameters_by_path(
            &self,
            path: &str,
            next_token: Option<String>,
        ) -> Result<ParameterPage> {
            let output = self
                .client
                .get_parameters_by_path()
                .path(path)
                .recursive(true)
                .with_decryption(true)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|err| {
                    ConfigError::BackendError(format!(
                        "GetParametersByPath '{}' failed: {}",
                        path,
                        DisplayErrorContext(&err)
                    ))
                })?;

            let parameters = output
                .parameters()
                .iter()
                .filter_map(|p| {
                    Some(Parameter {
                        name: p.name()?.to_string(),
                        value: p.value()?.to_string(),
                    })
                })
                .collect();

            Ok(ParameterPage {
                parameters,
                next_token: output.next_token().map(str::to_string),
            })
        }

        async fn is_available(&self) -> bool {
            self.client.config().region().is_some()
        }
    }
}
