//! Top-level client handle.
//!
//! Holds the HTTP transport and hands out resource clients; the CLI (or any
//! other adapter) builds one of these per invocation.

use crate::error::ClientResult;
use crate::http::HttpClient;
use crate::sol005::ns::NsClient;
use crate::sol005::pdu::PduClient;

pub struct ManoClient {
    http: HttpClient,
}

impl ManoClient {
    pub fn new(base_url: &str) -> ClientResult<Self> {
        Ok(Self {
            http: HttpClient::new(base_url)?,
        })
    }

    /// Exchange credentials for a bearer token used by all later requests.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        project: &str,
    ) -> ClientResult<()> {
        self.http.authenticate(username, password, project).await
    }

    pub fn ns(&self) -> NsClient<'_> {
        NsClient::new(&self.http)
    }

    pub fn pdu(&self) -> PduClient<'_> {
        PduClient::new(&self.http)
    }

    /// Direct access to the transport, e.g. for custom wait wiring.
    pub fn http(&self) -> &HttpClient {
        &self.http
    }
}
