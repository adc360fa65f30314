//! Minimal InfluxDB v2 HTTP client.
//!
//! Covers the three calls the agent needs: bucket lookup at startup, single
//! point writes, and Flux queries returning CSV. Requests are plain HTTP/1
//! over a pooled `hyper-util` client; there is no retry and no timeout on
//! individual calls.

// Local crates
use crate::{helpers::load_config::InfluxConfig, influx::point::Point};

// External crates
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{
    Method, Request, StatusCode, Uri,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use serde::Deserialize;
use std::fmt;
use tracing::instrument;
use url::Url;

/// Errors talking to the metrics store.
#[derive(Debug, thiserror::Error)]
pub enum InfluxError {
    #[error("invalid InfluxDB url: {0}")]
    InvalidUrl(String),
    #[error("failed to build request: {0}")]
    Request(#[from] hyper::http::Error),
    #[error("request to InfluxDB failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),
    #[error("failed to read InfluxDB response: {0}")]
    Body(#[from] hyper::Error),
    #[error("InfluxDB responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("unexpected InfluxDB response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("malformed CSV in InfluxDB response: {0}")]
    Csv(#[from] csv::Error),
    #[error("bucket '{0}' not found")]
    BucketNotFound(String),
}

#[derive(Debug, Deserialize)]
struct BucketList {
    #[serde(default)]
    buckets: Vec<Bucket>,
}

#[derive(Debug, Deserialize)]
struct Bucket {
    name: String,
}

/// Long-lived handle to one InfluxDB organization and bucket.
#[derive(Clone)]
pub struct InfluxClient {
    http: Client<HttpConnector, Full<Bytes>>,
    base: Url,
    token: String,
    org: String,
    bucket: String,
}

impl fmt::Debug for InfluxClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxClient")
            .field("base", &self.base.as_str())
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl InfluxClient {
    /// Build a client from an already validated [`InfluxConfig`].
    pub fn new(config: &InfluxConfig) -> Result<Self, InfluxError> {
        let base = Url::parse(&config.url).map_err(|e| InfluxError::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(InfluxError::InvalidUrl(config.url.clone()));
        }

        let http = Client::builder(TokioExecutor::new()).build_http();

        Ok(Self {
            http,
            base,
            token: config.token.clone(),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn url(&self) -> &str {
        self.base.as_str()
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Uri, InfluxError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| InfluxError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(path.split('/'));
        url.query_pairs_mut().clear().extend_pairs(params);

        url.as_str()
            .parse::<Uri>()
            .map_err(|e| InfluxError::InvalidUrl(e.to_string()))
    }

    async fn send(
        &self,
        method: Method,
        uri: Uri,
        content_type: Option<&str>,
        accept: &str,
        body: Bytes,
    ) -> Result<Bytes, InfluxError> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .header(ACCEPT, accept);
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        let request = builder.body(Full::new(body))?;

        let response = self.http.request(request).await?;
        let status = response.status();
        let body = response.into_body().collect().await?.to_bytes();

        if !status.is_success() {
            return Err(InfluxError::Status {
                status,
                body: String::from_utf8_lossy(&body).trim().to_string(),
            });
        }
        Ok(body)
    }

    /// Confirms the configured bucket exists and the token can see it.
    #[instrument(
        name = "ue_metrics_influx::verify_bucket",
        target = "influx::client",
        skip_all,
        fields(bucket = %self.bucket),
        level = "debug"
    )]
    pub async fn verify_bucket(&self) -> Result<(), InfluxError> {
        let uri = self.endpoint(
            "api/v2/buckets",
            &[("name", self.bucket.as_str()), ("org", self.org.as_str())],
        )?;
        let body = self
            .send(Method::GET, uri, None, "application/json", Bytes::new())
            .await?;

        let list: BucketList = serde_json::from_slice(&body)?;
        if list.buckets.iter().any(|b| b.name == self.bucket) {
            tracing::debug!("Bucket found");
            Ok(())
        } else {
            Err(InfluxError::BucketNotFound(self.bucket.clone()))
        }
    }

    /// Write one point; the server assigns the timestamp.
    pub async fn write_point(&self, point: &Point) -> Result<(), InfluxError> {
        let uri = self.endpoint(
            "api/v2/write",
            &[("org", self.org.as_str()), ("bucket", self.bucket.as_str())],
        )?;
        self.send(
            Method::POST,
            uri,
            Some("text/plain; charset=utf-8"),
            "application/json",
            Bytes::from(point.to_line_protocol()),
        )
        .await?;
        Ok(())
    }

    /// Run a Flux query and return the raw CSV response.
    #[instrument(
        name = "ue_metrics_influx::query",
        target = "influx::client",
        skip_all,
        level = "debug"
    )]
    pub async fn query_csv(&self, flux: &str) -> Result<String, InfluxError> {
        let uri = self.endpoint("api/v2/query", &[("org", self.org.as_str())])?;
        let body = self
            .send(
                Method::POST,
                uri,
                Some("application/vnd.flux"),
                "application/csv",
                Bytes::from(flux.to_string()),
            )
            .await?;

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}
