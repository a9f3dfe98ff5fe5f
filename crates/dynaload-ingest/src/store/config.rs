use serde::{Deserialize, Serialize};

/// Region used when neither the CLI nor `AWS_REGION` names one
pub const DEFAULT_REGION: &str = "eu-west-1";

#[derive(Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Custom endpoint, e.g. DynamoDB Local or LocalStack; `None` uses AWS
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl StoreConfig {
    /// Local emulators accept any static key pair
    pub fn for_local(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            region: DEFAULT_REGION.to_string(),
            access_key: Some("test".to_string()),
            secret_key: Some("test".to_string()),
        }
    }

    /// Static key pair when both halves are present
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) => Some((access.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

// Keeps the secret out of logs
impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "***"))
            .finish()
    }
}
