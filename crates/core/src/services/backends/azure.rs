//! Azure Blob storage over the REST API.
//!
//! Supports the connection-string forms handed out by the portal and by
//! Azurite: account key (Shared Key signing) or SAS token.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, ETAG, IF_MATCH,
};
use reqwest::{Client, Method, Response, StatusCode};
use sha2::Sha256;
use url::Url;

use crate::config::BlobConfig;
use crate::services::blob::{BlobError, BlobStore};

/// REST API version sent with every request.
pub const API_VERSION: &str = "2021-08-06";

const DEVSTORE_ACCOUNT: &str = "devstoreaccount1";
const DEVSTORE_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEVSTORE_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

type HmacSha256 = Hmac<Sha256>;

/// How requests are authorized.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    SharedKey { account: String, key: Vec<u8> },
    /// SAS token without the leading `?`.
    Sas(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::SharedKey { account, .. } => {
                f.debug_struct("SharedKey").field("account", account).finish_non_exhaustive()
            }
            Credential::Sas(_) => f.write_str("Sas(..)"),
        }
    }
}

/// Parsed storage connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub account: String,
    pub blob_endpoint: Url,
    pub credential: Credential,
}

impl ConnectionString {
    pub fn parse(raw: &str) -> Result<Self, BlobError> {
        let mut pairs: HashMap<String, String> = HashMap::new();
        for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                BlobError::ConnectionString(format!(
                    "segment without '=' ({} chars)",
                    segment.len()
                ))
            })?;
            pairs.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        if pairs.get("usedevelopmentstorage").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
            return Ok(Self {
                account: DEVSTORE_ACCOUNT.to_string(),
                blob_endpoint: Url::parse(DEVSTORE_ENDPOINT)?,
                credential: Credential::SharedKey {
                    account: DEVSTORE_ACCOUNT.to_string(),
                    key: decode_key(DEVSTORE_KEY)?,
                },
            });
        }

        let account = pairs.get("accountname").cloned().unwrap_or_default();
        let blob_endpoint = match pairs.get("blobendpoint") {
            Some(endpoint) => Url::parse(endpoint)?,
            None => {
                if account.is_empty() {
                    return Err(BlobError::ConnectionString(
                        "missing AccountName or BlobEndpoint".to_string(),
                    ));
                }
                let protocol =
                    pairs.get("defaultendpointsprotocol").map(String::as_str).unwrap_or("https");
                let suffix =
                    pairs.get("endpointsuffix").map(String::as_str).unwrap_or("core.windows.net");
                Url::parse(&format!("{protocol}://{account}.blob.{suffix}"))?
            }
        };

        let credential = if let Some(key) = pairs.get("accountkey") {
            if account.is_empty() {
                return Err(BlobError::ConnectionString(
                    "AccountKey requires AccountName".to_string(),
                ));
            }
            Credential::SharedKey { account: account.clone(), key: decode_key(key)? }
        } else if let Some(sas) = pairs.get("sharedaccesssignature") {
            Credential::Sas(sas.trim_start_matches('?').to_string())
        } else {
            return Err(BlobError::ConnectionString(
                "missing AccountKey or SharedAccessSignature".to_string(),
            ));
        };

        Ok(Self { account, blob_endpoint, credential })
    }
}

fn decode_key(key: &str) -> Result<Vec<u8>, BlobError> {
    STANDARD
        .decode(key)
        .map_err(|e| BlobError::ConnectionString(format!("AccountKey is not valid base64: {e}")))
}

/// Build the Shared Key string-to-sign for a request.
///
/// `Date` is always empty because requests carry `x-ms-date`; a zero
/// content length is signed as the empty string.
pub fn string_to_sign(
    method: &Method,
    url: &Url,
    account: &str,
    headers: &HeaderMap,
    content_length: u64,
) -> String {
    let header = |name: HeaderName| {
        headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("").to_string()
    };
    let length = if content_length == 0 { String::new() } else { content_length.to_string() };

    let mut out = String::new();
    out.push_str(method.as_str());
    out.push('\n');
    // Content-Encoding, Content-Language
    out.push_str("\n\n");
    out.push_str(&length);
    out.push('\n');
    // Content-MD5
    out.push('\n');
    out.push_str(&header(CONTENT_TYPE));
    out.push('\n');
    // Date, If-Modified-Since
    out.push_str("\n\n");
    out.push_str(&header(IF_MATCH));
    out.push('\n');
    // If-None-Match, If-Unmodified-Since, Range
    out.push_str("\n\n\n");
    out.push_str(&canonicalized_headers(headers));
    out.push_str(&canonicalized_resource(url, account));
    out
}

fn canonicalized_headers(headers: &HeaderMap) -> String {
    let mut ms: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let name = name.as_str().to_ascii_lowercase();
        if name.starts_with("x-ms-") {
            ms.insert(name, value.to_str().unwrap_or("").trim().to_string());
        }
    }
    ms.into_iter().map(|(k, v)| format!("{k}:{v}\n")).collect()
}

fn canonicalized_resource(url: &Url, account: &str) -> String {
    let mut out = format!("/{}{}", account, url.path());
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (k, v) in url.query_pairs() {
        params.entry(k.to_ascii_lowercase()).or_default().push(v.into_owned());
    }
    for (k, mut values) in params {
        values.sort();
        out.push_str(&format!("\n{}:{}", k, values.join(",")));
    }
    out
}

/// `SharedKey <account>:<base64(hmac-sha256(key, string_to_sign))>`
pub fn authorization_header(account: &str, key: &[u8], string_to_sign: &str) -> Result<String, BlobError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| BlobError::ConnectionString(format!("unusable AccountKey: {e}")))?;
    mac.update(string_to_sign.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());
    Ok(format!("SharedKey {account}:{signature}"))
}

fn rfc1123_now() -> String {
    chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

fn header_value(value: &str) -> Result<HeaderValue, BlobError> {
    HeaderValue::from_str(value)
        .map_err(|e| BlobError::ConnectionString(format!("value not usable in a header: {e}")))
}

/// Blob store backed by an Azure storage account (or Azurite).
#[derive(Debug, Clone)]
pub struct AzureBlobStore {
    http: Client,
    endpoint: Url,
    credential: Credential,
    max_retries: u32,
    retry_delay: Duration,
}

impl AzureBlobStore {
    pub fn new(connection: ConnectionString) -> Self {
        Self {
            http: Client::new(),
            endpoint: connection.blob_endpoint,
            credential: connection.credential,
            max_retries: 3,
            retry_delay: Duration::from_millis(200),
        }
    }

    pub fn from_connection_string(raw: &str) -> Result<Self, BlobError> {
        Ok(Self::new(ConnectionString::parse(raw)?))
    }

    pub fn from_config(config: &BlobConfig) -> Result<Self, BlobError> {
        let raw = config.connection_string.as_deref().ok_or_else(|| {
            BlobError::ConnectionString("CONNECTION_STRING is not set".to_string())
        })?;
        Ok(Self::from_connection_string(raw)?
            .with_retries(config.max_retries, Duration::from_millis(config.retry_delay_ms)))
    }

    /// Retry budget for transient download failures; the delay doubles per attempt.
    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = base_delay;
        self
    }

    pub fn container_url(&self, container: &str) -> Result<Url, BlobError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| BlobError::ConnectionString("blob endpoint cannot be a base URL".into()))?
            .pop_if_empty()
            .push(container);
        Ok(url)
    }

    /// `/` inside a blob name is kept as a virtual directory separator.
    pub fn blob_url(&self, container: &str, blob: &str) -> Result<Url, BlobError> {
        let mut url = self.container_url(container)?;
        url.path_segments_mut()
            .map_err(|_| BlobError::ConnectionString("blob endpoint cannot be a base URL".into()))?
            .extend(blob.split('/'));
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        mut url: Url,
        mut headers: HeaderMap,
        body: Option<Vec<u8>>,
    ) -> Result<Response, BlobError> {
        headers.insert("x-ms-date", header_value(&rfc1123_now())?);
        headers.insert("x-ms-version", HeaderValue::from_static(API_VERSION));
        let content_length = body.as_ref().map(|b| b.len() as u64).unwrap_or(0);

        match &self.credential {
            Credential::SharedKey { account, key } => {
                let sts = string_to_sign(&method, &url, account, &headers, content_length);
                let auth = authorization_header(account, key, &sts)?;
                headers.insert(AUTHORIZATION, header_value(&auth)?);
            }
            Credential::Sas(token) => {
                let query = match url.query() {
                    Some(existing) if !existing.is_empty() => format!("{existing}&{token}"),
                    _ => token.clone(),
                };
                url.set_query(Some(&query));
            }
        }

        let mut request = self.http.request(method, url).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }
        request.send().await.map_err(|e| BlobError::Request(e.without_url()))
    }
}

async fn error_body(response: Response) -> BlobError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    BlobError::Status { status, body }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn download(&self, container: &str, blob: &str) -> Result<Vec<u8>, BlobError> {
        let url = self.blob_url(container, blob)?;
        let mut data: Vec<u8> = Vec::new();
        let mut etag: Option<HeaderValue> = None;
        let mut expected_len: Option<u64> = None;
        let mut attempt: u32 = 0;

        tracing::info!(container, blob, "downloading blob");
        loop {
            let mut headers = HeaderMap::new();
            if !data.is_empty() {
                headers.insert("x-ms-range", header_value(&format!("bytes={}-", data.len()))?);
                if let Some(tag) = &etag {
                    headers.insert(IF_MATCH, tag.clone());
                }
            }

            let failure = match self.send(Method::GET, url.clone(), headers, None).await {
                Err(BlobError::Request(e)) => e.to_string(),
                Err(other) => return Err(other),
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::NOT_FOUND {
                        return Err(BlobError::NotFound {
                            container: container.to_string(),
                            blob: blob.to_string(),
                        });
                    }
                    if is_transient(status) {
                        format!("status {status}")
                    } else if !status.is_success() {
                        return Err(error_body(response).await);
                    } else {
                        if !data.is_empty() && status != StatusCode::PARTIAL_CONTENT {
                            tracing::warn!(
                                container,
                                blob,
                                %status,
                                discarded = data.len(),
                                "range ignored on resume, restarting read"
                            );
                            data.clear();
                            etag = None;
                            expected_len = None;
                        }
                        if etag.is_none() {
                            etag = response.headers().get(ETAG).cloned();
                        }
                        if expected_len.is_none() {
                            expected_len = response.content_length();
                        }
                        match read_into(response, &mut data).await {
                            Ok(()) => {
                                tracing::info!(container, blob, bytes = data.len(), "blob downloaded");
                                return Ok(data);
                            }
                            Err(e) => e.to_string(),
                        }
                    }
                }
            };

            if expected_len.is_some_and(|n| data.len() as u64 >= n) {
                return Ok(data);
            }
            if attempt >= self.max_retries {
                return Err(BlobError::RetriesExhausted { attempts: attempt + 1, last: failure });
            }
            let delay = self.retry_delay.saturating_mul(1u32 << attempt.min(16));
            attempt += 1;
            tracing::warn!(
                container,
                blob,
                attempt,
                resume_at = data.len(),
                "transient blob read failure, retrying: {failure}"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn upload(&self, container: &str, blob: &str, data: Vec<u8>) -> Result<(), BlobError> {
        let url = self.blob_url(container, blob)?;
        let mut headers = HeaderMap::new();
        headers.insert("x-ms-blob-type", HeaderValue::from_static("BlockBlob"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));

        let size = data.len();
        tracing::info!(container, blob, bytes = size, "uploading blob");
        let response = self.send(Method::PUT, url, headers, Some(data)).await?;
        if !response.status().is_success() {
            return Err(error_body(response).await);
        }
        Ok(())
    }

    async fn ensure_container(&self, container: &str) -> Result<(), BlobError> {
        let mut url = self.container_url(container)?;
        url.query_pairs_mut().append_pair("restype", "container");
        let response = self.send(Method::PUT, url, HeaderMap::new(), None).await?;
        match response.status() {
            StatusCode::CREATED => {
                tracing::info!(container, "created storage container");
                Ok(())
            }
            StatusCode::CONFLICT => Ok(()),
            _ => Err(error_body(response).await),
        }
    }
}

/// A SAS token rides in the query string, so errors never carry the URL.
async fn read_into(mut response: Response, data: &mut Vec<u8>) -> Result<(), reqwest::Error> {
    while let Some(chunk) = response.chunk().await.map_err(reqwest::Error::without_url)? {
        data.extend_from_slice(&chunk);
    }
    Ok(())
}
