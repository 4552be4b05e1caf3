// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Fleet gateway HTTP API client.
//!
//! This module implements the three fleet collaborators against the fleet gateway's
//! JSON API. Requests are issued exactly once: a failure is surfaced to the
//! reconciliation pass, which aborts and is retried by the controller requeue.
//!
//! # Endpoints
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | GET | `/api/v1/resourceGroups/{rg}/scaleSets?prefix=` | list scale sets |
//! | GET | `/api/v1/resourceGroups/{rg}/instances?prefix=` | list instances per scale set |
//! | POST | `/api/v1/resourceGroups/{rg}/scaleSets/{name}/deleteInstances` | delete instances |
//! | POST | `/api/v1/resourceGroups/{rg}/metrics/query` | aggregated metric samples |

use super::types::{MetricQuery, MetricSample, VmInstance, VmInventory};
use super::{InstanceMutator, MetricsGateway, TopologyEnumerator};
use crate::failover_errors::GatewayError;
use reqwest::{Client as HttpClient, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, error};
use url::Url;

const API_PREFIX: [&str; 2] = ["api", "v1"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScaleSetListResponse {
    #[serde(default)]
    scale_sets: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceListResponse {
    #[serde(default)]
    scale_sets: BTreeMap<String, Vec<VmInstance>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteInstancesRequest<'a> {
    instance_ids: &'a [String],
    adjust_capacity: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MetricQueryRequest<'a> {
    scale_set_names: &'a [String],
    metric_name: &'a str,
    metric_namespace: &'a str,
    aggregation: super::Aggregation,
    window_seconds: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetricQueryResponse {
    #[serde(default)]
    samples: Vec<MetricSample>,
}

/// Client for the fleet gateway HTTP API.
#[derive(Clone, Debug)]
pub struct FleetApiClient {
    http: HttpClient,
    base_url: String,
    token: Option<String>,
}

impl FleetApiClient {
    /// Create a client for the gateway at `base_url`.
    ///
    /// `token`, when set, is sent as a bearer token on every request.
    #[must_use]
    pub fn new(http: HttpClient, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token,
        }
    }

    /// Base URL this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build an endpoint URL from path segments, percent-encoding each segment.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let invalid = |reason: String| GatewayError::InvalidEndpoint {
            endpoint: self.base_url.clone(),
            reason,
        };

        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(API_PREFIX)
            .extend(segments);
        Ok(url)
    }

    fn with_prefix_query(mut url: Url, prefix: &str) -> Url {
        url.query_pairs_mut().append_pair("prefix", prefix);
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request and decode a JSON body, mapping every failure to a `GatewayError`.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &Url,
    ) -> Result<T, GatewayError> {
        let response = self.send(request, url).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::MalformedResponse {
                endpoint: url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn send(
        &self,
        request: RequestBuilder,
        url: &Url,
    ) -> Result<reqwest::Response, GatewayError> {
        debug!(url = %url, "Fleet gateway request");

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| GatewayError::Connection {
                endpoint: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(url = %url, status = %status, "Fleet gateway request successful");
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        error!(url = %url, status = %status, error = %message, "Fleet gateway request failed");

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Unauthorized {
                endpoint: url.to_string(),
                status_code: status.as_u16(),
                message,
            },
            _ => GatewayError::Http {
                endpoint: url.to_string(),
                status_code: status.as_u16(),
                message,
            },
        })
    }
}

#[async_trait::async_trait]
impl MetricsGateway for FleetApiClient {
    async fn query(&self, query: &MetricQuery) -> Result<Vec<MetricSample>, GatewayError> {
        let url = self.endpoint(&[
            "resourceGroups",
            &query.resource_group,
            "metrics",
            "query",
        ])?;
        let body = MetricQueryRequest {
            scale_set_names: &query.scale_set_names,
            metric_name: &query.metric_name,
            metric_namespace: &query.metric_namespace,
            aggregation: query.aggregation,
            window_seconds: query.window.as_secs(),
        };

        let response: MetricQueryResponse = self
            .send_json(self.http.post(url.clone()).json(&body), &url)
            .await?;
        Ok(response.samples)
    }
}

#[async_trait::async_trait]
impl TopologyEnumerator for FleetApiClient {
    async fn list_scale_sets(
        &self,
        resource_group: &str,
        prefix: &str,
    ) -> Result<Vec<String>, GatewayError> {
        let url = Self::with_prefix_query(
            self.endpoint(&["resourceGroups", resource_group, "scaleSets"])?,
            prefix,
        );
        let response: ScaleSetListResponse =
            self.send_json(self.http.get(url.clone()), &url).await?;
        Ok(response.scale_sets)
    }

    async fn list_instances(
        &self,
        prefix: &str,
        resource_group: &str,
    ) -> Result<VmInventory, GatewayError> {
        let url = Self::with_prefix_query(
            self.endpoint(&["resourceGroups", resource_group, "instances"])?,
            prefix,
        );
        let response: InstanceListResponse =
            self.send_json(self.http.get(url.clone()), &url).await?;
        Ok(VmInventory::new(response.scale_sets))
    }
}

#[async_trait::async_trait]
impl InstanceMutator for FleetApiClient {
    async fn delete_instances(
        &self,
        resource_group: &str,
        scale_set_name: &str,
        instance_ids: &[String],
        adjust_capacity: bool,
    ) -> Result<(), GatewayError> {
        let url = self.endpoint(&[
            "resourceGroups",
            resource_group,
            "scaleSets",
            scale_set_name,
            "deleteInstances",
        ])?;
        let body = DeleteInstancesRequest {
            instance_ids,
            adjust_capacity,
        };

        self.send(self.http.post(url.clone()).json(&body), &url)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod http_tests;
