//! Object-storage clients (S3-compatible).
//!
//! Fields under `[storage]`, each prefixed with the resource name:
//! `access_key`, `access_secret` and `bucket` are required; `region_name`,
//! `endpoint`, `enable_https` (true), `enable_cdn` (true) and
//! `cdn_endpoint` are optional.

use std::fmt;

use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use secrecy::{ExposeSecret, SecretString};
use strata_config::Config;

use crate::credentials::Secrets;
use crate::error::{Error, Result};
use crate::resource::{Resource, ResourceKind};
use crate::settings::Fields;

/// Region used to sign requests when none is configured.
const FALLBACK_REGION: &str = "us-east-1";

/// Validated object-storage fields
pub struct StorageSettings {
    /// Access key id
    pub access_key: SecretString,
    /// Secret access key
    pub access_secret: SecretString,
    /// Bucket name
    pub bucket: String,
    /// Region; empty when not configured
    pub region: String,
    /// Custom endpoint (S3-compatible services)
    pub endpoint: Option<String>,
    /// Use `https` for derived URLs
    pub enable_https: bool,
    /// Serve downloads from `cdn_endpoint`
    pub enable_cdn: bool,
    /// CDN host for download links
    pub cdn_endpoint: Option<String>,
}

impl StorageSettings {
    fn scheme(&self) -> &'static str {
        if self.enable_https { "https" } else { "http" }
    }

    /// Signing region.
    fn signing_region(&self) -> &str {
        if self.region.is_empty() {
            FALLBACK_REGION
        } else {
            &self.region
        }
    }

    /// Endpoint URL passed to the SDK, or `None` to let it resolve AWS
    /// endpoints itself.
    fn endpoint_url(&self) -> Option<String> {
        match &self.endpoint {
            Some(endpoint) => Some(with_scheme(endpoint, self.scheme())),
            None if !self.enable_https => Some(format!(
                "http://s3.{}.amazonaws.com",
                self.signing_region()
            )),
            None => None,
        }
    }

    /// Base URL that object keys are appended to for download links.
    fn download_base(&self) -> String {
        if self.enable_cdn
            && let Some(cdn) = &self.cdn_endpoint
        {
            return with_scheme(cdn, self.scheme());
        }
        match &self.endpoint {
            Some(endpoint) => format!("{}/{}", with_scheme(endpoint, self.scheme()), self.bucket),
            None => format!(
                "{}://{}.s3.{}.amazonaws.com",
                self.scheme(),
                self.bucket,
                self.signing_region()
            ),
        }
    }
}

impl fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageSettings")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("enable_https", &self.enable_https)
            .field("enable_cdn", &self.enable_cdn)
            .finish_non_exhaustive()
    }
}

fn with_scheme(host: &str, scheme: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.contains("://") {
        host.to_string()
    } else {
        format!("{scheme}://{host}")
    }
}

/// Builds [`ObjectStore`] clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct StorageResource;

impl Resource for StorageResource {
    const KIND: ResourceKind = ResourceKind::ObjectStorage;
    type Settings = StorageSettings;
    type Instance = ObjectStore;

    fn configure(&self, name: &str, config: &Config, secrets: &Secrets) -> Result<StorageSettings> {
        let fields = Fields::new(Self::KIND, name, config);
        Ok(StorageSettings {
            access_key: fields.secret("access_key", secrets)?,
            access_secret: fields.secret("access_secret", secrets)?,
            bucket: fields.string("bucket")?,
            region: fields.string_or("region_name", "")?,
            endpoint: fields.optional_string("endpoint")?,
            enable_https: fields.bool_or("enable_https", true)?,
            enable_cdn: fields.bool_or("enable_cdn", true)?,
            cdn_endpoint: fields.optional_string("cdn_endpoint")?,
        })
    }

    async fn create(&self, name: &str, settings: StorageSettings) -> Result<ObjectStore> {
        let credentials = Credentials::new(
            settings.access_key.expose_secret(),
            settings.access_secret.expose_secret(),
            None,
            None,
            "strata",
        );

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.signing_region().to_string()))
            .credentials_provider(credentials);
        if let Some(endpoint) = settings.endpoint_url() {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        tracing::debug!(
            name,
            bucket = %settings.bucket,
            region = settings.signing_region(),
            "creating object storage client"
        );

        Ok(ObjectStore {
            name: name.to_string(),
            client: Client::from_conf(builder.build()),
            download_base: settings.download_base(),
            bucket: settings.bucket,
        })
    }

    async fn probe(&self, name: &str, store: &ObjectStore) -> Result<()> {
        store
            .client
            .head_bucket()
            .bucket(&store.bucket)
            .send()
            .await
            .map(drop)
            .map_err(|e| {
                Error::connectivity(
                    name,
                    format!(
                        "bucket '{}' is not reachable: {}",
                        store.bucket,
                        DisplayErrorContext(&e)
                    ),
                    e,
                )
            })
    }
}

/// A client bound to one bucket.
pub struct ObjectStore {
    name: String,
    client: Client,
    bucket: String,
    download_base: String,
}

impl ObjectStore {
    /// Resource name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Underlying SDK client, for operations not wrapped here.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Upload `body` under `key`.
    pub async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_content_type(content_type.map(str::to_string))
            .send()
            .await
            .map(drop)
            .map_err(|e| self.op_error("put_object", key, e))
    }

    /// Download the object stored under `key`.
    pub async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| self.op_error("get_object", key, e))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| self.op_error("get_object", key, e))?;
        Ok(data.into_bytes().to_vec())
    }

    /// Delete the object stored under `key`.
    pub async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map(drop)
            .map_err(|e| self.op_error("delete_object", key, e))
    }

    /// Make the object under `key` publicly readable.
    pub async fn set_public(&self, key: &str) -> Result<()> {
        self.client
            .put_object_acl()
            .bucket(&self.bucket)
            .key(key)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map(drop)
            .map_err(|e| self.op_error("set_public", key, e))
    }

    /// Public download link for `key`; served from the CDN when one is
    /// configured and enabled.
    pub fn download_uri(&self, key: &str) -> String {
        format!("{}/{}", self.download_base, key.trim_start_matches('/'))
    }

    fn op_error<E>(&self, operation: &str, key: &str, source: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::internal(
            &self.name,
            format!(
                "{operation} s3://{}/{key} failed: {}",
                self.bucket,
                DisplayErrorContext(&source)
            ),
            source,
        )
    }
}

impl fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStore")
            .field("name", &self.name)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BASE: &str = r#"
        [storage.media]
        access_key = "AKIA"
        access_secret = "shh"
        bucket = "assets"
    "#;

    fn configure(extra: &str) -> Result<StorageSettings> {
        let config = Config::from_toml_str(&format!("{BASE}\n{extra}")).unwrap();
        StorageResource.configure("media", &config, &Secrets::none())
    }

    #[test]
    fn defaults() {
        let settings = configure("").unwrap();
        assert!(settings.enable_https);
        assert!(settings.enable_cdn);
        assert_eq!(settings.region, "");
        assert_eq!(settings.signing_region(), "us-east-1");
        assert_eq!(settings.endpoint_url(), None);
    }

    #[test]
    fn missing_bucket_is_fatal() {
        let config = Config::from_toml_str(&BASE.replace("bucket = \"assets\"", "")).unwrap();
        let err = StorageResource
            .configure("media", &config, &Secrets::none())
            .unwrap_err();
        assert!(matches!(err, Error::ConfigMissing { ref field, .. } if field == "bucket"));
    }

    #[test]
    fn custom_endpoint_gets_scheme_from_enable_https() {
        let settings = configure("endpoint = \"minio.local:9000\"\nenable_https = false").unwrap();
        assert_eq!(settings.endpoint_url().as_deref(), Some("http://minio.local:9000"));
        assert_eq!(settings.download_base(), "http://minio.local:9000/assets");
    }

    #[test]
    fn download_links_prefer_cdn_when_enabled() {
        let settings = configure("cdn_endpoint = \"cdn.example.com\"\nregion_name = \"eu-west-1\"")
            .unwrap();
        assert_eq!(settings.download_base(), "https://cdn.example.com");

        let settings = configure(
            "cdn_endpoint = \"cdn.example.com\"\nregion_name = \"eu-west-1\"\nenable_cdn = false",
        )
        .unwrap();
        assert_eq!(
            settings.download_base(),
            "https://assets.s3.eu-west-1.amazonaws.com"
        );
    }

    #[tokio::test]
    async fn download_uri_joins_key() {
        let settings = configure("cdn_endpoint = \"https://cdn.example.com/\"").unwrap();
        let store = StorageResource.create("media", settings).await.unwrap();
        assert_eq!(
            store.download_uri("/img/a.png"),
            "https://cdn.example.com/img/a.png"
        );
        assert_eq!(store.bucket(), "assets");
    }
}
