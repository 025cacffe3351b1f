//! Physical deployment unit (PDU) descriptor operations.

use log::debug;
use serde_json::Value;

use crate::error::{ClientError, ClientResult};
use crate::http::HttpClient;
use crate::sol005::{is_uuid, DeleteStatus};

const API_BASE: &str = "/pdu/v1/pdu_descriptors";

pub struct PduClient<'a> {
    http: &'a HttpClient,
}

impl<'a> PduClient<'a> {
    pub fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    pub async fn list(&self, filter: Option<&str>) -> ClientResult<Vec<Value>> {
        let path = match filter {
            Some(filter) => format!("{API_BASE}?{filter}"),
            None => API_BASE.to_string(),
        };
        let (_, body) = self.http.get_cmd(&path).await?;
        match body {
            Some(text) => Ok(serde_json::from_str(&text)?),
            None => Ok(Vec::new()),
        }
    }

    /// Look up a PDU descriptor by name or id.
    pub async fn get(&self, name: &str) -> ClientResult<Value> {
        let member = if is_uuid(name) { "_id" } else { "name" };
        for pdu in self.list(None).await? {
            if pdu.get(member).and_then(Value::as_str) == Some(name) {
                return Ok(pdu);
            }
        }
        Err(ClientError::NotFound(format!("pdud {name} not found")))
    }

    /// Fetch one PDU descriptor directly from its endpoint.
    pub async fn get_individual(&self, name: &str) -> ClientResult<Value> {
        let pdu = self.get(name).await?;
        let id = descriptor_id(&pdu)?;
        let (_, body) = self.http.get_cmd(&format!("{API_BASE}/{id}")).await?;
        match body {
            Some(text) => Ok(serde_json::from_str(&text)?),
            None => Err(ClientError::NotFound(format!("pdu {name} not found"))),
        }
    }

    /// Register a PDU descriptor and return its id.
    pub async fn create(&self, descriptor: &Value) -> ClientResult<String> {
        self.submit(descriptor, None).await
    }

    /// Overwrite an existing PDU descriptor.
    pub async fn update(&self, name: &str, descriptor: &Value) -> ClientResult<String> {
        let pdu = self.get(name).await?;
        let endpoint = format!("{API_BASE}/{}", descriptor_id(&pdu)?);
        self.submit(descriptor, Some(&endpoint)).await
    }

    async fn submit(
        &self,
        descriptor: &Value,
        update_endpoint: Option<&str>,
    ) -> ClientResult<String> {
        let (http_code, body) = match update_endpoint {
            Some(endpoint) => self.http.put_cmd(endpoint, descriptor).await?,
            None => self.http.post_cmd(API_BASE, descriptor).await?,
        };
        debug!("submit pdu -> {http_code}");
        let resp: Value = match body {
            Some(text) => serde_json::from_str(&text)?,
            None => Value::Null,
        };
        let id = resp
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::UnexpectedResponse(resp.to_string()))?;
        Ok(id.to_string())
    }

    pub async fn delete(&self, name: &str, force: bool) -> ClientResult<DeleteStatus> {
        let pdu = self.get(name).await?;
        let id = descriptor_id(&pdu)?;
        let querystring = if force { "?FORCE=True" } else { "" };
        let (http_code, body) = self
            .http
            .delete_cmd(&format!("{API_BASE}/{id}{querystring}"))
            .await?;
        match http_code {
            202 => Ok(DeleteStatus::InProgress),
            204 => Ok(DeleteStatus::Deleted),
            _ => Err(ClientError::Operation(format!(
                "failed to delete pdu {} - {}",
                name,
                body.unwrap_or_default()
            ))),
        }
    }
}

fn descriptor_id(pdu: &Value) -> ClientResult<&str> {
    pdu.get("_id")
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::UnexpectedResponse(pdu.to_string()))
}
