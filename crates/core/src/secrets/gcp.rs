use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, StatusCode};
use secrecy::SecretString;
use serde::Deserialize;

use super::{SecretError, SecretProvider};

const SECRET_MANAGER_BASE_URL: &str = "https://secretmanager.googleapis.com";

/// Google Secret Manager over REST, authenticated with the instance service account
/// token served by the metadata server.
#[derive(Clone, Debug)]
pub struct GcpSecretManagerProvider {
    client: Client,
    project: String,
    metadata_url: String,
    api_base_url: String,
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
}

#[derive(Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Deserialize)]
struct SecretPayload {
    data: String,
}

impl GcpSecretManagerProvider {
    pub fn new(project: impl Into<String>, metadata_url: impl Into<String>) -> Self {
        Self::with_endpoints(project, metadata_url, SECRET_MANAGER_BASE_URL)
    }

    pub fn with_endpoints(
        project: impl Into<String>,
        metadata_url: impl Into<String>,
        api_base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            project: project.into(),
            metadata_url: metadata_url.into().trim_end_matches('/').to_string(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn version_url(&self, name: &str) -> String {
        format!(
            "{}/v1/projects/{}/secrets/{}/versions/latest:access",
            self.api_base_url, self.project, name
        )
    }

    async fn access_token(&self, name: &str) -> Result<String, SecretError> {
        let retrieval = |reason: String| SecretError::Retrieval { name: name.to_string(), reason };

        let response = self
            .client
            .get(format!("{}/instance/service-accounts/default/token", self.metadata_url))
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|error| retrieval(format!("metadata token request failed: {error}")))?;

        if !response.status().is_success() {
            return Err(retrieval(format!("metadata server returned {}", response.status())));
        }

        let token: MetadataToken = response
            .json()
            .await
            .map_err(|error| retrieval(format!("failed to decode metadata token: {error}")))?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl SecretProvider for GcpSecretManagerProvider {
    fn backend_name(&self) -> &'static str {
        "gcp"
    }

    async fn fetch(&self, name: &str) -> Result<SecretString, SecretError> {
        let token = self.access_token(name).await?;
        let retrieval = |reason: String| SecretError::Retrieval { name: name.to_string(), reason };

        let response = self
            .client
            .get(self.version_url(name))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|error| retrieval(format!("secret manager request failed: {error}")))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(SecretError::NotFound { name: name.to_string() }),
            status if !status.is_success() => {
                return Err(retrieval(format!("secret manager returned {status}")))
            }
            _ => {}
        }

        let body: AccessSecretVersionResponse = response
            .json()
            .await
            .map_err(|error| retrieval(format!("failed to decode secret response: {error}")))?;

        decode_payload(name, &body.payload.data)
    }
}

fn decode_payload(name: &str, data: &str) -> Result<SecretString, SecretError> {
    let malformed = |reason: String| SecretError::Malformed { name: name.to_string(), reason };

    let bytes = STANDARD.decode(data.trim()).map_err(|error| malformed(error.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|error| malformed(error.to_string()))?;
    Ok(SecretString::from(text))
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::{decode_payload, GcpSecretManagerProvider};
    use crate::secrets::SecretError;

    #[test]
    fn version_url_targets_latest_version() {
        let provider = GcpSecretManagerProvider::with_endpoints(
            "travel-project",
            "http://metadata.internal/computeMetadata/v1/",
            "https://secrets.example.com/",
        );

        assert_eq!(
            provider.version_url("SERPAPI_KEY"),
            "https://secrets.example.com/v1/projects/travel-project/secrets/SERPAPI_KEY/versions/latest:access"
        );
    }

    #[test]
    fn payload_is_base64_utf8() {
        let decoded = decode_payload("SERPAPI_KEY", "c2VjcmV0LWtleQ==").expect("valid payload");
        assert_eq!(decoded.expose_secret(), "secret-key");

        assert!(matches!(
            decode_payload("SERPAPI_KEY", "%%%"),
            Err(SecretError::Malformed { .. })
        ));
    }
}
