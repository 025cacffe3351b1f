//! Network service (NS) lifecycle operations.

use log::debug;
use serde_json::{json, Map, Value};

use crate::error::{ClientError, ClientResult};
use crate::http::HttpClient;
use crate::sol005::{is_uuid, DeleteStatus};
use crate::wait::{wait_for_status, EntityKind, TIMEOUT_NS_OPERATION};

const API_BASE: &str = "/nslcm/v1/ns_instances_content";
const API_INSTANCES: &str = "/nslcm/v1/ns_instances";
const API_OP_OCCS: &str = "/nslcm/v1/ns_lcm_op_occs";

/// Parameters for instantiating a network service.
///
/// `config` is an optional YAML document merged into the instantiation
/// request after validation; `ssh_keys` holds public key material, one entry
/// per key.
#[derive(Clone, Debug, Default)]
pub struct NsCreateParams {
    pub nsd_id: String,
    pub ns_name: String,
    pub vim_account_id: String,
    pub description: String,
    pub ssh_keys: Vec<String>,
    pub config: Option<String>,
}

pub struct NsClient<'a> {
    http: &'a HttpClient,
}

impl<'a> NsClient<'a> {
    pub fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    /// Block until the LCM operation `id` reaches a terminal state.
    async fn wait(&self, id: &str, delete_flag: bool) -> ClientResult<()> {
        wait_for_status(
            EntityKind::Ns,
            id,
            TIMEOUT_NS_OPERATION,
            API_OP_OCCS,
            self.http,
            delete_flag,
        )
        .await
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

    /// Look up an NS by name or id.
    pub async fn get(&self, name: &str) -> ClientResult<Value> {
        let member = if is_uuid(name) { "_id" } else { "name" };
        for ns in self.list(None).await? {
            if ns.get(member).and_then(Value::as_str) == Some(name) {
                return Ok(ns);
            }
        }
        Err(ClientError::NotFound(format!("ns '{name}' not found")))
    }

    /// Fetch one NS directly from its instance endpoint.
    pub async fn get_individual(&self, name: &str) -> ClientResult<Value> {
        let ns_id = if is_uuid(name) {
            name.to_string()
        } else {
            let ns = self.get(name).await?;
            instance_id(&ns)?.to_string()
        };
        let (_, body) = self.http.get_cmd(&format!("{API_BASE}/{ns_id}")).await?;
        match body {
            Some(text) => Ok(serde_json::from_str(&text)?),
            None => Err(ClientError::NotFound(format!("ns '{name}' not found"))),
        }
    }

    /// Delete an NS. With `wait`, polls the deletion's LCM operation until the
    /// instance is gone (a 404 from the status endpoint).
    pub async fn delete(&self, name: &str, force: bool, wait: bool) -> ClientResult<DeleteStatus> {
        let ns = self.get(name).await?;
        let id = instance_id(&ns)?;
        let querystring = if force { "?FORCE=True" } else { "" };
        let (http_code, body) = self
            .http
            .delete_cmd(&format!("{API_BASE}/{id}{querystring}"))
            .await?;
        debug!("DELETE ns {id} -> {http_code}");
        match http_code {
            202 => {
                if wait {
                    if let Some(text) = body {
                        let resp: Value = serde_json::from_str(&text)?;
                        // For the delete operation the response carries '_id'.
                        let op_id = resp.get("_id").and_then(Value::as_str).ok_or_else(|| {
                            ClientError::UnexpectedResponse(resp.to_string())
                        })?;
                        self.wait(op_id, true).await?;
                        return Ok(DeleteStatus::Deleted);
                    }
                }
                Ok(DeleteStatus::InProgress)
            }
            204 => Ok(DeleteStatus::Deleted),
            _ => Err(ClientError::Operation(format!(
                "failed to delete ns {} - {}",
                name,
                body.unwrap_or_default()
            ))),
        }
    }

    /// Instantiate a network service and return its instance id.
    pub async fn create(&self, params: &NsCreateParams, wait: bool) -> ClientResult<String> {
        self.create_inner(params, wait).await.map_err(|err| {
            ClientError::Operation(format!(
                "failed to create ns: {} nsd: {}\nerror:\n{}",
                params.ns_name, params.nsd_id, err
            ))
        })
    }

    async fn create_inner(&self, params: &NsCreateParams, wait: bool) -> ClientResult<String> {
        let document = build_instance_document(params)?;
        let (_, body) = self.http.post_cmd(API_BASE, &document).await?;
        let resp: Value = match body {
            Some(text) => serde_json::from_str(&text)?,
            None => Value::Null,
        };
        let id = resp
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::UnexpectedResponse(resp.to_string()))?
            .to_string();
        if wait {
            // Creation is tracked through the spawned LCM operation.
            let op_id = resp
                .get("nslcmop_id")
                .and_then(Value::as_str)
                .ok_or_else(|| ClientError::UnexpectedResponse(resp.to_string()))?;
            self.wait(op_id, false).await?;
        }
        Ok(id)
    }

    /// List the LCM operations of an NS.
    pub async fn list_op(&self, name: &str, filter: Option<&str>) -> ClientResult<Vec<Value>> {
        let ns = self.get(name).await?;
        let id = instance_id(&ns)?;
        let filter_string = filter.map(|f| format!("&{f}")).unwrap_or_default();
        let path = format!("{API_OP_OCCS}?nsInstanceId={id}{filter_string}");
        let (http_code, body) = self.http.get_cmd(&path).await.map_err(|err| {
            ClientError::Operation(format!(
                "failed to get operation list of NS {name}:\nerror:\n{err}"
            ))
        })?;
        if http_code == 200 {
            match body {
                Some(text) => Ok(serde_json::from_str(&text)?),
                None => Err(ClientError::Operation(format!(
                    "failed to get operation list of NS {name}:\nerror:\nunexpected response from server"
                ))),
            }
        } else {
            Err(ClientError::Operation(format!(
                "failed to get operation list of NS {}:\nerror:\n{}",
                name,
                body.unwrap_or_default()
            )))
        }
    }

    /// Fetch the status payload of one LCM operation.
    pub async fn get_op(&self, operation_id: &str) -> ClientResult<Value> {
        let (http_code, body) = self
            .http
            .get_cmd(&format!("{API_OP_OCCS}/{operation_id}"))
            .await
            .map_err(|err| {
                ClientError::Operation(format!(
                    "failed to get status of operation {operation_id}:\nerror:\n{err}"
                ))
            })?;
        if http_code == 200 {
            match body {
                Some(text) => Ok(serde_json::from_str(&text)?),
                None => Err(ClientError::Operation(format!(
                    "failed to get status of operation {operation_id}:\nerror:\nunexpected response from server"
                ))),
            }
        } else {
            Err(ClientError::Operation(format!(
                "failed to get status of operation {}:\nerror:\n{}",
                operation_id,
                body.unwrap_or_default()
            )))
        }
    }

    /// Execute a named operation (action, scale, ...) on an NS and return the
    /// spawned operation id.
    pub async fn exec_op(
        &self,
        name: &str,
        op_name: &str,
        op_data: Option<&Value>,
        wait: bool,
    ) -> ClientResult<String> {
        self.exec_op_inner(name, op_name, op_data, wait)
            .await
            .map_err(|err| {
                ClientError::Operation(format!("failed to exec operation {name}:\nerror:\n{err}"))
            })
    }

    async fn exec_op_inner(
        &self,
        name: &str,
        op_name: &str,
        op_data: Option<&Value>,
        wait: bool,
    ) -> ClientResult<String> {
        let ns = self.get(name).await?;
        let id = instance_id(&ns)?;
        let endpoint = format!("{API_INSTANCES}/{id}/{op_name}");
        let body_value = op_data.cloned().unwrap_or_else(|| json!({}));
        let (_, body) = self.http.post_cmd(&endpoint, &body_value).await?;
        let resp: Value = match body {
            Some(text) => serde_json::from_str(&text)?,
            None => Value::Null,
        };
        let op_id = resp
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::UnexpectedResponse(resp.to_string()))?
            .to_string();
        if wait {
            self.wait(&op_id, false).await?;
        }
        Ok(op_id)
    }

    /// Scale a VNF of an NS by adding or removing VDUs.
    pub async fn scale_vnf(
        &self,
        ns_name: &str,
        vnf_name: &str,
        scaling_group: &str,
        scale_in: bool,
        wait: bool,
    ) -> ClientResult<String> {
        let op_data = build_scale_request(vnf_name, scaling_group, scale_in);
        self.exec_op(ns_name, "scale", Some(&op_data), wait)
            .await
            .map_err(|err| {
                ClientError::Operation(format!(
                    "failed to scale vnf {vnf_name} of ns {ns_name}:\nerror:\n{err}"
                ))
            })
    }

    /// Read one member of an NS record.
    pub async fn get_field(&self, ns_name: &str, field: &str) -> ClientResult<Value> {
        let nsr = self.get(ns_name).await?;
        nsr.get(field).cloned().ok_or_else(|| {
            ClientError::NotFound(format!("failed to find {field} in ns {ns_name}"))
        })
    }
}

fn instance_id(ns: &Value) -> ClientResult<&str> {
    ns.get("_id")
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::UnexpectedResponse(ns.to_string()))
}

/// Build the instance-content document POSTed to instantiate an NS.
///
/// The optional YAML config is validated and merged on top of the base
/// members, so config keys the server understands pass through untouched
/// (`timeout_ns_deploy`, `placement-engine`, ...).
fn build_instance_document(params: &NsCreateParams) -> ClientResult<Value> {
    let mut document = Map::new();
    document.insert("nsdId".to_string(), json!(params.nsd_id));
    document.insert("nsName".to_string(), json!(params.ns_name));
    document.insert("nsDescription".to_string(), json!(params.description));
    document.insert("vimAccountId".to_string(), json!(params.vim_account_id));
    if !params.ssh_keys.is_empty() {
        document.insert("ssh_keys".to_string(), json!(params.ssh_keys));
    }
    if let Some(config) = params.config.as_deref() {
        let config: Value = serde_yaml::from_str(config)?;
        let mut config = match config {
            Value::Object(map) => map,
            other => {
                return Err(ClientError::InvalidInput(format!(
                    "Error at --config: expected a mapping, got {other}"
                )))
            }
        };
        // Legacy spelling of the virtual link list.
        if let Some(vlds) = config.remove("vim-network-name") {
            config.insert("vld".to_string(), vlds);
        }
        if let Some(vlds) = config.get("vld") {
            let items = vlds.as_array().ok_or_else(invalid_vld)?;
            if !items.iter().all(Value::is_object) {
                return Err(invalid_vld());
            }
        }
        if let Some(params_ns) = config.get("additionalParamsForNs") {
            if !params_ns.is_object() {
                return Err(ClientError::InvalidInput(
                    "Error at --config 'additionalParamsForNs' must be a dictionary".to_string(),
                ));
            }
        }
        if let Some(params_vnf) = config.get("additionalParamsForVnf") {
            let items = params_vnf.as_array().ok_or_else(|| {
                ClientError::InvalidInput(
                    "Error at --config 'additionalParamsForVnf' must be a list".to_string(),
                )
            })?;
            for item in items {
                if !item.is_object() {
                    return Err(ClientError::InvalidInput(
                        "Error at --config 'additionalParamsForVnf' items must be dictionaries"
                            .to_string(),
                    ));
                }
                if item.get("member-vnf-index").is_none() {
                    return Err(ClientError::InvalidInput(
                        "Error at --config 'additionalParamsForVnf' items must contain 'member-vnf-index'"
                            .to_string(),
                    ));
                }
            }
        }
        for (key, value) in config {
            document.insert(key, value);
        }
    }
    Ok(Value::Object(document))
}

fn invalid_vld() -> ClientError {
    ClientError::InvalidInput("Error at --config 'vld' must be a list of dictionaries".to_string())
}

fn build_scale_request(vnf_name: &str, scaling_group: &str, scale_in: bool) -> Value {
    let scale_type = if scale_in { "SCALE_IN" } else { "SCALE_OUT" };
    json!({
        "scaleType": "SCALE_VNF",
        "scaleVnfData": {
            "scaleVnfType": scale_type,
            "scaleByStepData": {
                "member-vnf-index": vnf_name,
                "scaling-group-descriptor": scaling_group,
            },
        },
    })
}
