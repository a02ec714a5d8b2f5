//! HTTP GraphQL transport.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;
use vitrine_api_types::{GraphqlRequest, GraphqlResponse};

use crate::cache::{QueryRequest, Transport, TransportError};
use crate::config::TransportSettings;

use super::error::InfraError;

const TENANT_HEADER: &str = "x-tenant-id";
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Posts each request to a GraphQL endpoint and returns its `data` member.
#[derive(Debug, Clone)]
pub struct GraphqlTransport {
    client: Client,
    endpoint: Url,
    timeout: Duration,
    tenant: Option<String>,
    lenient_operations: BTreeSet<String>,
}

impl GraphqlTransport {
    pub fn new(settings: &TransportSettings) -> Result<Self, InfraError> {
        let endpoint = settings.endpoint.clone().ok_or_else(|| {
            InfraError::configuration(
                "transport endpoint is required (use --endpoint or VITRINE__TRANSPORT__ENDPOINT)",
            )
        })?;

        let client = Client::builder()
            .user_agent(Self::user_agent())
            .build()
            .map_err(|err| InfraError::http(err.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            timeout: settings.timeout,
            tenant: settings.tenant.clone(),
            lenient_operations: settings.lenient_operations.clone(),
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("vitrine/", env!("CARGO_PKG_VERSION"))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn is_lenient(&self, operation: Option<&str>) -> bool {
        operation.is_some_and(|name| self.lenient_operations.contains(name))
    }

    fn map_send_error(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::network(error.to_string())
        }
    }

    fn interpret(
        &self,
        operation: Option<&str>,
        response: GraphqlResponse,
    ) -> Result<Value, TransportError> {
        if response.has_errors() {
            let all_authorization = response.errors.iter().all(|error| error.is_authorization());
            if all_authorization && self.is_lenient(operation) {
                warn!(
                    operation = operation.unwrap_or("anonymous"),
                    errors = response.errors.len(),
                    "Authorization errors swallowed for lenient operation"
                );
                return Ok(response
                    .data
                    .unwrap_or_else(|| Value::Object(Map::new())));
            }

            let messages = response
                .errors
                .into_iter()
                .map(|error| error.message)
                .collect();
            return Err(TransportError::GraphQl(messages));
        }

        match response.data {
            Some(Value::Null) | None => Err(TransportError::decode("response carried no data")),
            Some(data) => Ok(data),
        }
    }
}

#[async_trait]
impl Transport for GraphqlTransport {
    async fn execute(&self, request: &QueryRequest) -> Result<Value, TransportError> {
        let operation = request.operation_name();
        let body = GraphqlRequest {
            query: request.query(),
            variables: request.variables(),
            operation_name: operation,
        };

        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .json(&body);
        if let Some(tenant) = self.tenant.as_deref() {
            builder = builder.header(TENANT_HEADER, tenant);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| self.map_send_error(err))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| self.map_send_error(err))?;

        debug!(
            operation = operation.unwrap_or("anonymous"),
            status = status.as_u16(),
            bytes = bytes.len(),
            "GraphQL response received"
        );

        if !status.is_success() && !is_graphql_error_status(status, &bytes) {
            let text = String::from_utf8_lossy(&bytes);
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let parsed: GraphqlResponse = serde_json::from_slice(&bytes)
            .map_err(|err| TransportError::decode(err.to_string()))?;
        self.interpret(operation, parsed)
    }
}

/// Some servers answer GraphQL-level failures with a 4xx status and a
/// regular `errors` body; those are handled like a 200 with errors.
fn is_graphql_error_status(status: StatusCode, body: &[u8]) -> bool {
    status.is_client_error()
        && serde_json::from_slice::<GraphqlResponse>(body).is_ok_and(|parsed| parsed.has_errors())
}
