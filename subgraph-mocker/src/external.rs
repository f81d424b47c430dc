//! Structures for the data exchanged with the router coprocessor protocol.

use std::collections::HashMap;

use http::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use strum_macros::Display;
use strum_macros::EnumString;

/// Version of the externalised data understood by this coprocessor.
pub(crate) const EXTERNALIZABLE_VERSION: u8 = 1;

#[derive(Clone, Debug, Display, EnumString, Deserialize, PartialEq, Serialize)]
pub(crate) enum PipelineStep {
    RouterRequest,
    RouterResponse,
    SupergraphRequest,
    SupergraphResponse,
    ExecutionRequest,
    ExecutionResponse,
    SubgraphRequest,
    SubgraphResponse,
}

#[derive(Clone, Debug, Default, Display, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum Control {
    #[default]
    Continue,
    Break(u16),
}

impl Control {
    pub(crate) fn status(status: StatusCode) -> Self {
        Control::Break(status.as_u16())
    }
}

/// A coprocessor payload. Only the fields this coprocessor reads or answers with are modelled;
/// payloads of other stages are echoed as raw JSON.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Externalizable<T> {
    pub(crate) version: u8,
    pub(crate) stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) control: Option<Control>,
    pub(crate) id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) headers: Option<HashMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) body: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) context: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) subgraph_request_id: Option<String>,
}

impl<T> Externalizable<T> {
    /// Answer a request, keeping its identifying fields and context.
    pub(crate) fn reply<U>(self, control: Control, body: U) -> Externalizable<U> {
        Externalizable {
            version: EXTERNALIZABLE_VERSION,
            stage: self.stage,
            control: Some(control),
            id: self.id,
            headers: None,
            body: Some(body),
            context: self.context,
            uri: None,
            method: None,
            service_name: self.service_name,
            subgraph_request_id: self.subgraph_request_id,
        }
    }
}

/// The GraphQL request sent to a subgraph.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubgraphRequestBody {
    pub(crate) query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) operation_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) variables: Option<Value>,
}
