/// Azure Blob Storage reader.
///
/// Requests are authenticated either by SharedKey signing with the account
/// access key or by appending a SAS token to the blob URL.
use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode, Url};
use sha2::Sha256;
use tracing::debug;

use super::{ObjectStore, StorageError};
use crate::config::StorageConfig;

type HmacSha256 = Hmac<Sha256>;

/// `x-ms-version` sent with SharedKey requests.
pub const STORAGE_API_VERSION: &str = "2021-08-06";

pub enum BlobCredential {
    /// Public container, no authentication.
    Anonymous,
    /// SAS query string, without the leading `?`.
    Sas(String),
    SharedKey { account: String, key: Vec<u8> },
}

impl BlobCredential {
    pub fn sas(token: &str) -> Self {
        Self::Sas(token.trim_start_matches('?').to_string())
    }

    /// `key_base64` is the access key exactly as shown in the portal.
    pub fn shared_key(account: &str, key_base64: &str) -> Result<Self, StorageError> {
        if account.is_empty() {
            return Err(StorageError::Config(
                "SharedKey auth needs the storage account name".to_string(),
            ));
        }
        let key = STANDARD
            .decode(key_base64.trim())
            .map_err(|e| StorageError::Config(format!("account key is not valid base64: {e}")))?;
        Ok(Self::SharedKey {
            account: account.to_string(),
            key,
        })
    }
}

pub struct AzureBlobStore {
    http: Client,
    container_url: Url,
    credential: BlobCredential,
}

impl AzureBlobStore {
    /// `base_url` is the account endpoint, e.g. `https://acct.blob.core.windows.net`.
    pub fn new(
        base_url: &str,
        container: &str,
        credential: BlobCredential,
    ) -> Result<Self, StorageError> {
        if container.is_empty() {
            return Err(StorageError::Config("container name is empty".to_string()));
        }
        let container_url = Url::parse(&format!("{}/{}", base_url.trim_end_matches('/'), container))
            .map_err(|e| StorageError::Config(format!("invalid blob endpoint {base_url}: {e}")))?;

        Ok(Self {
            http: Client::new(),
            container_url,
            credential,
        })
    }

    /// The account key wins over a SAS token when both are configured.
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let base_url = match (&config.endpoint, config.account.is_empty()) {
            (Some(endpoint), _) => endpoint.clone(),
            (None, false) => format!("https://{}.blob.core.windows.net", config.account),
            (None, true) => {
                return Err(StorageError::Config(
                    "storage account name is empty".to_string(),
                ));
            }
        };
        let credential = if !config.account_key.is_empty() {
            BlobCredential::shared_key(&config.account, &config.account_key)?
        } else if !config.sas_token.is_empty() {
            BlobCredential::sas(&config.sas_token)
        } else {
            BlobCredential::Anonymous
        };
        Self::new(&base_url, &config.container, credential)
    }

    fn blob_url(&self, path: &str) -> Result<Url, StorageError> {
        if path.is_empty() || path.starts_with('/') {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        let mut url = self.container_url.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidPath(path.to_string()))?
            .pop_if_empty()
            .extend(path.split('/'));
        if let BlobCredential::Sas(token) = &self.credential {
            if !token.is_empty() {
                url.set_query(Some(token));
            }
        }
        Ok(url)
    }
}

/// SharedKey string-to-sign for a request without body or conditional headers.
///
/// `ms_headers` are the `x-ms-*` headers sent with the request.
fn string_to_sign(method: &str, url: &Url, account: &str, ms_headers: &[(&str, &str)]) -> String {
    // Content-Encoding .. Range: eleven standard headers, all empty
    let mut out = format!("{method}\n{}", "\n".repeat(11));

    let headers: BTreeMap<String, &str> = ms_headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
        .collect();
    for (name, value) in headers {
        out.push_str(&format!("{name}:{value}\n"));
    }

    out.push_str(&format!("/{account}{}", url.path()));
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url.query_pairs() {
        params
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into_owned());
    }
    for (name, mut values) in params {
        values.sort();
        out.push_str(&format!("\n{name}:{}", values.join(",")));
    }
    out
}

fn sign(key: &[u8], string_to_sign: &str) -> Result<String, StorageError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StorageError::Config(format!("unusable account key: {e}")))?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

#[async_trait]
impl ObjectStore for AzureBlobStore {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let url = self.blob_url(path)?;
        let mut req = self.http.get(url.clone());

        if let BlobCredential::SharedKey { account, key } = &self.credential {
            let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
            let to_sign = string_to_sign(
                "GET",
                &url,
                account,
                &[("x-ms-date", date.as_str()), ("x-ms-version", STORAGE_API_VERSION)],
            );
            let signature = sign(key, &to_sign)?;
            req = req
                .header("x-ms-date", date)
                .header("x-ms-version", STORAGE_API_VERSION)
                .header(AUTHORIZATION, format!("SharedKey {account}:{signature}"));
        }

        let res = req.send().await?;

        match res.status() {
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(path.to_string())),
            status if !status.is_success() => Err(StorageError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            }),
            _ => {
                let bytes = res.bytes().await?;
                debug!("downloaded blob {path} ({} bytes)", bytes.len());
                Ok(bytes.to_vec())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, header_exists, header_regex, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ACCOUNT_KEY: &str = "dGVzdC1hY2NvdW50LWtleS0wMTIzNDU2Nzg5";

    fn store_for(server: &MockServer) -> AzureBlobStore {
        AzureBlobStore::new(
            &server.uri(),
            "rag-images",
            BlobCredential::sas("?sv=2024-05-04&sig=abc"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_blob_with_sas() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rag-images/manual.pdf_page3.png"))
            .and(query_param("sig", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .expect(1)
            .mount(&server)
            .await;

        let bytes = store_for(&server).fetch("manual.pdf_page3.png").await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_fetch_blob_with_shared_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rag-images/manual.pdf_page3.png"))
            .and(header_regex("authorization", r"^SharedKey ragstore:[A-Za-z0-9+/]{43}=$"))
            .and(header_exists("x-ms-date"))
            .and(header("x-ms-version", STORAGE_API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let credential = BlobCredential::shared_key("ragstore", ACCOUNT_KEY).unwrap();
        let store = AzureBlobStore::new(&server.uri(), "rag-images", credential).unwrap();
        assert_eq!(store.fetch("manual.pdf_page3.png").await.unwrap(), b"png");

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests[0].url.query(), None);
    }

    #[test]
    fn test_shared_key_signature() {
        let url =
            Url::parse("https://ragstore.blob.core.windows.net/rag-images/reports/my%20doc.png").unwrap();
        let to_sign = string_to_sign(
            "GET",
            &url,
            "ragstore",
            &[
                ("x-ms-version", "2021-08-06"),
                ("x-ms-date", "Tue, 01 Oct 2024 00:00:00 GMT"),
            ],
        );
        assert_eq!(
            to_sign,
            "GET\n\n\n\n\n\n\n\n\n\n\n\n\
             x-ms-date:Tue, 01 Oct 2024 00:00:00 GMT\n\
             x-ms-version:2021-08-06\n\
             /ragstore/rag-images/reports/my%20doc.png"
        );

        let key = STANDARD.decode(ACCOUNT_KEY).unwrap();
        assert_eq!(
            sign(&key, &to_sign).unwrap(),
            "zB9TPJvmtdFHI511z8vju7G4TCw9gndoWEaZU19/ba8="
        );
    }

    #[test]
    fn test_canonical_resource_sorts_query() {
        let url = Url::parse("https://a.blob.core.windows.net/c/b.png?timeout=30&comp=metadata").unwrap();
        let to_sign = string_to_sign("GET", &url, "a", &[]);
        assert!(to_sign.ends_with("/a/c/b.png\ncomp:metadata\ntimeout:30"));
    }

    #[test]
    fn test_from_config_prefers_account_key() {
        let config = StorageConfig {
            account: "ragstore".to_string(),
            account_key: ACCOUNT_KEY.to_string(),
            sas_token: "sv=2024&sig=abc".to_string(),
            container: "rag-images".to_string(),
            ..StorageConfig::default()
        };
        let store = AzureBlobStore::from_config(&config).unwrap();
        assert!(matches!(store.credential, BlobCredential::SharedKey { .. }));
        assert_eq!(store.blob_url("a.png").unwrap().query(), None);
    }

    #[test]
    fn test_invalid_account_key() {
        assert!(matches!(
            BlobCredential::shared_key("ragstore", "not base64!"),
            Err(StorageError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_encodes_path_segments() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rag-images/reports/my%20doc.pdf_page0.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
            .mount(&server)
            .await;

        let encoded = store_for(&server)
            .fetch_base64("reports/my doc.pdf_page0.png")
            .await
            .unwrap();
        assert_eq!(encoded, "cG5n");
    }

    #[tokio::test]
    async fn test_fetch_missing_blob() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = store_for(&server).fetch("gone.png").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(p) if p == "gone.png"));
    }

    #[tokio::test]
    async fn test_fetch_forbidden_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = store_for(&server).fetch("secret.png").await.unwrap_err();
        assert!(matches!(err, StorageError::Status { status: 403, .. }));
    }

    #[test]
    fn test_account_endpoint_from_config() {
        let config = StorageConfig {
            account: "ragstore".to_string(),
            container: "rag-images".to_string(),
            ..StorageConfig::default()
        };
        let store = AzureBlobStore::from_config(&config).unwrap();
        let url = store.blob_url("a.png").unwrap();
        assert_eq!(url.as_str(), "https://ragstore.blob.core.windows.net/rag-images/a.png");
    }

    #[test]
    fn test_rejects_absolute_path() {
        let store = AzureBlobStore::new(
            "https://x.blob.core.windows.net",
            "c",
            BlobCredential::Anonymous,
        )
        .unwrap();
        assert!(store.blob_url("/etc/passwd").is_err());
        assert!(store.blob_url("").is_err());
    }
}
