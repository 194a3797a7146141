use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use super::listing::{HtmlListingDecoder, ListingDecoder};
use super::{ChildDescriptor, Gateway, OBJECT_MARKER};
use crate::{GatewayFsError, Result};

/// Blocking client for a path-style gateway (`<base>/ipfs/<cid>`).
pub struct HttpGateway<D = HtmlListingDecoder> {
    client: Client,
    base_url: String,
    decoder: D,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Self::with_decoder(base_url, timeout, HtmlListingDecoder)
    }
}

impl<D: ListingDecoder> HttpGateway<D> {
    pub fn with_decoder(base_url: &str, timeout: Duration, decoder: D) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(std::io::Error::other)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            decoder,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the index page for directory `cid`.
    pub fn listing_url(&self, cid: &str) -> String {
        format!("{}/{}/{}/", self.base_url, OBJECT_MARKER, cid)
    }

    /// URL of the raw bytes of file `cid`.
    pub fn content_url(&self, cid: &str) -> String {
        format!("{}/{}/{}", self.base_url, OBJECT_MARKER, cid)
    }

    /// One GET, whole body. Every failure is reported as `NotFound`.
    fn get(&self, url: &str, cid: &str) -> Result<Vec<u8>> {
        debug!(%url, "GET");
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| GatewayFsError::NotFound(format!("{cid}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GatewayFsError::NotFound(format!("{cid}: HTTP {status}")));
        }

        let body = resp
            .bytes()
            .map_err(|e| GatewayFsError::NotFound(format!("{cid}: reading body: {e}")))?;
        Ok(body.to_vec())
    }
}

impl<D: ListingDecoder> Gateway for HttpGateway<D> {
    fn fetch_listing(&self, cid: &str) -> Result<Vec<ChildDescriptor>> {
        let body = self.get(&self.listing_url(cid), cid)?;
        self.decoder.decode(&body)
    }

    fn fetch_content(&self, cid: &str) -> Result<Vec<u8>> {
        self.get(&self.content_url(cid), cid)
    }
}
