//! # AWS Private CA Authentication
//!
//! Builds the AWS SDK configuration for an issuer.
//!
//! When the issuer names a credentials Secret, static keys are read from it;
//! otherwise the SDK default credential chain (IRSA, instance profile) applies.

use crate::crd::{AwsCredentialsSecretReference, AwsPcaIssuerSpec};
use crate::provider::{AuthorityKey, ProvisionerError};
use aws_config::SdkConfig;
use aws_credential_types::Credentials;
use k8s_openapi::api::core::v1::Secret;
use kube::Api;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Secret key holding the access key id when no selector is given
pub const DEFAULT_ACCESS_KEY_ID_KEY: &str = "AWS_ACCESS_KEY_ID";
/// Secret key holding the secret access key when no selector is given
pub const DEFAULT_SECRET_ACCESS_KEY_KEY: &str = "AWS_SECRET_ACCESS_KEY";

const CREDENTIALS_PROVIDER_NAME: &str = "IssuerSecret";

/// Namespace the credentials Secret is read from
///
/// The reference's own namespace wins, then the issuer's namespace. Cluster
/// issuers fall back to the namespace the controller runs in.
#[must_use]
pub fn secret_namespace(
    reference: &AwsCredentialsSecretReference,
    key: &AuthorityKey,
    controller_namespace: &str,
) -> String {
    reference
        .namespace
        .as_deref()
        .filter(|ns| !ns.is_empty())
        .or(key.namespace.as_deref())
        .unwrap_or(controller_namespace)
        .to_string()
}

fn secret_value(secret: &Secret, key: &str) -> Result<Zeroizing<String>, ProvisionerError> {
    let name = secret.metadata.name.as_deref().unwrap_or_default();
    let bytes = secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .ok_or_else(|| {
            ProvisionerError::Configuration(format!("secret {name} has no key {key}"))
        })?;
    let value = String::from_utf8(bytes.0.clone()).map_err(|e| {
        ProvisionerError::Configuration(format!("secret {name} key {key} is not valid UTF-8: {e}"))
    })?;
    let value = Zeroizing::new(value);
    if value.trim().is_empty() {
        return Err(ProvisionerError::Configuration(format!(
            "secret {name} key {key} is empty"
        )));
    }
    Ok(value)
}

/// Static credentials from a Secret, honouring the key selectors
///
/// # Errors
///
/// Returns [`ProvisionerError::Configuration`] when a key is missing or empty.
pub fn credentials_from_secret(
    secret: &Secret,
    reference: &AwsCredentialsSecretReference,
) -> Result<Credentials, ProvisionerError> {
    let access_key_key = reference
        .access_key_id_selector
        .as_ref()
        .map_or(DEFAULT_ACCESS_KEY_ID_KEY, |s| s.key.as_str());
    let secret_key_key = reference
        .secret_access_key_selector
        .as_ref()
        .map_or(DEFAULT_SECRET_ACCESS_KEY_KEY, |s| s.key.as_str());

    let access_key_id = secret_value(secret, access_key_key)?;
    let secret_access_key = secret_value(secret, secret_key_key)?;

    Ok(Credentials::new(
        access_key_id.as_str(),
        secret_access_key.as_str(),
        None,
        None,
        CREDENTIALS_PROVIDER_NAME,
    ))
}

async fn load_secret_credentials(
    client: &kube::Client,
    reference: &AwsCredentialsSecretReference,
    namespace: &str,
) -> Result<Credentials, ProvisionerError> {
    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let secret = secrets.get(&reference.name).await.map_err(|e| {
        ProvisionerError::Configuration(format!(
            "failed to read credentials secret {namespace}/{}: {e}",
            reference.name
        ))
    })?;
    credentials_from_secret(&secret, reference)
}

/// Create AWS SDK config for an issuer
///
/// # Errors
///
/// Returns [`ProvisionerError::Configuration`] when the credentials Secret cannot be read.
pub async fn create_sdk_config(
    client: &kube::Client,
    key: &AuthorityKey,
    spec: &AwsPcaIssuerSpec,
    controller_namespace: &str,
) -> Result<SdkConfig, ProvisionerError> {
    let mut builder = aws_config::defaults(aws_config::BehaviorVersion::latest());

    if let Some(region) = spec.region.as_deref().filter(|r| !r.is_empty()) {
        builder = builder.region(aws_config::Region::new(region.to_string()));
    }

    match spec.secret_ref.as_ref().filter(|r| !r.name.is_empty()) {
        Some(reference) => {
            let namespace = secret_namespace(reference, key, controller_namespace);
            info!(
                authority = %key,
                secret = %format!("{namespace}/{}", reference.name),
                "Using static credentials from secret"
            );
            let credentials = load_secret_credentials(client, reference, &namespace).await?;
            builder = builder.credentials_provider(credentials);
        }
        None => {
            debug!(authority = %key, "No secretRef configured, using default AWS credential chain");
        }
    }

    Ok(builder.load().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::SecretKeySelector;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    fn secret(entries: &[(&str, &str)]) -> Secret {
        let data: BTreeMap<String, ByteString> = entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
            .collect();
        Secret {
            metadata: kube::api::ObjectMeta {
                name: Some("creds".to_string()),
                ..Default::default()
            },
            data: Some(data),
            ..Default::default()
        }
    }

    fn reference(namespace: Option<&str>) -> AwsCredentialsSecretReference {
        AwsCredentialsSecretReference {
            name: "creds".to_string(),
            namespace: namespace.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_secret_namespace_resolution_order() {
        let issuer = AuthorityKey::issuer("ns1", "issuer1");
        let cluster = AuthorityKey::cluster_issuer("clusterissuer1");

        assert_eq!(secret_namespace(&reference(Some("explicit")), &issuer, "ctrl"), "explicit");
        assert_eq!(secret_namespace(&reference(None), &issuer, "ctrl"), "ns1");
        assert_eq!(secret_namespace(&reference(Some("")), &issuer, "ctrl"), "ns1");
        assert_eq!(secret_namespace(&reference(None), &cluster, "ctrl"), "ctrl");
    }

    #[test]
    fn test_credentials_from_default_keys() {
        let secret = secret(&[
            (DEFAULT_ACCESS_KEY_ID_KEY, "AKIAEXAMPLE"),
            (DEFAULT_SECRET_ACCESS_KEY_KEY, "secret"),
        ]);
        let credentials = credentials_from_secret(&secret, &reference(None)).unwrap();
        assert_eq!(credentials.access_key_id(), "AKIAEXAMPLE");
        assert_eq!(credentials.secret_access_key(), "secret");
    }

    #[test]
    fn test_credentials_from_selectors() {
        let secret = secret(&[("id", "AKIAOTHER"), ("key", "other-secret")]);
        let reference = AwsCredentialsSecretReference {
            access_key_id_selector: Some(SecretKeySelector {
                key: "id".to_string(),
            }),
            secret_access_key_selector: Some(SecretKeySelector {
                key: "key".to_string(),
            }),
            ..reference(None)
        };
        let credentials = credentials_from_secret(&secret, &reference).unwrap();
        assert_eq!(credentials.access_key_id(), "AKIAOTHER");
        assert_eq!(credentials.secret_access_key(), "other-secret");
    }

    #[test]
    fn test_missing_or_empty_key_is_configuration_error() {
        let missing = secret(&[(DEFAULT_ACCESS_KEY_ID_KEY, "AKIAEXAMPLE")]);
        assert!(matches!(
            credentials_from_secret(&missing, &reference(None)),
            Err(ProvisionerError::Configuration(_))
        ));

        let empty = secret(&[
            (DEFAULT_ACCESS_KEY_ID_KEY, " "),
            (DEFAULT_SECRET_ACCESS_KEY_KEY, "secret"),
        ]);
        assert!(matches!(
            credentials_from_secret(&empty, &reference(None)),
            Err(ProvisionerError::Configuration(_))
        ));
    }
}
