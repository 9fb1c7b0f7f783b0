// Copyright (c) 2020-present, UMD Database Group.
//
// This program is free software: you can use, redistribute, and/or modify
// it under the terms of the GNU Affero General Public License, version 3
// or later ("AGPL"), as published by the Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <http://www.gnu.org/licenses/>.

//! The gateway-service façade over Amazon API Gateway v2.

use crate::error::{Result, StratusError};
use crate::services::{ApiSummary, GatewayService, IntegrationInput, IntegrationSummary, RouteSummary};
use async_trait::async_trait;
use rusoto_apigatewayv2::{
    ApiGatewayV2, ApiGatewayV2Client, CreateApiRequest, CreateIntegrationRequest,
    CreateRouteRequest, DeleteApiError, DeleteApiRequest, GetApisRequest, GetIntegrationsRequest,
    GetRoutesRequest, UpdateIntegrationRequest,
};
use rusoto_core::RusotoError;

const AUTO_CREATED_DESCRIPTION: &str = "Stratus automatically created.";

/// Amazon API Gateway v2 wrapper implementing [GatewayService].
pub struct ApiGatewayService {
    client: ApiGatewayV2Client,
}

impl ApiGatewayService {
    /// Wraps an API Gateway v2 client.
    pub fn new(client: ApiGatewayV2Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GatewayService for ApiGatewayService {
    async fn get_apis(&self) -> Result<Vec<ApiSummary>> {
        let mut apis = vec![];
        let mut next_token = None;

        // The service returns the APIs in pages.
        loop {
            let response = self
                .client
                .get_apis(GetApisRequest {
                    next_token: next_token.clone(),
                    ..Default::default()
                })
                .await
                .map_err(|e| StratusError::AWS(e.to_string()))?;
            if let Some(items) = response.items {
                for api in items {
                    apis.push(ApiSummary {
                        api_id: api.api_id.unwrap_or_default(),
                        name: api.name,
                        api_endpoint: api.api_endpoint.unwrap_or_default(),
                    });
                }
            }
            if response.next_token.is_none() {
                break;
            }
            next_token = response.next_token;
        }

        Ok(apis)
    }

    async fn create_api(&self, name: &str, target_arn: &str) -> Result<ApiSummary> {
        let response = self
            .client
            .create_api(CreateApiRequest {
                name: name.to_owned(),
                protocol_type: "HTTP".to_owned(),
                description: Some(AUTO_CREATED_DESCRIPTION.to_owned()),
                target: Some(target_arn.to_owned()),
                ..Default::default()
            })
            .await
            .map_err(|e| StratusError::AWS(e.to_string()))?;

        Ok(ApiSummary {
            api_id: response
                .api_id
                .ok_or_else(|| StratusError::AWS("No API id!".to_string()))?,
            name: response.name.unwrap_or_else(|| name.to_owned()),
            api_endpoint: response.api_endpoint.unwrap_or_default(),
        })
    }

    async fn get_integrations(&self, api_id: &str) -> Result<Vec<IntegrationSummary>> {
        let mut integrations = vec![];
        let mut next_token = None;

        loop {
            let response = self
                .client
                .get_integrations(GetIntegrationsRequest {
                    api_id: api_id.to_owned(),
                    next_token: next_token.clone(),
                    ..Default::default()
                })
                .await
                .map_err(|e| StratusError::AWS(e.to_string()))?;
            if let Some(items) = response.items {
                for integration in items {
                    integrations.push(IntegrationSummary {
                        integration_id: integration.integration_id.unwrap_or_default(),
                        integration_uri: integration.integration_uri.unwrap_or_default(),
                    });
                }
            }
            if response.next_token.is_none() {
                break;
            }
            next_token = response.next_token;
        }

        Ok(integrations)
    }

    async fn create_integration(
        &self,
        api_id: &str,
        integration_uri: &str,
        input: &IntegrationInput,
    ) -> Result<IntegrationSummary> {
        let response = self
            .client
            .create_integration(CreateIntegrationRequest {
                api_id: api_id.to_owned(),
                connection_type: Some("INTERNET".to_owned()),
                description: Some(AUTO_CREATED_DESCRIPTION.to_owned()),
                integration_method: Some(input.method.clone()),
                integration_type: "AWS_PROXY".to_owned(),
                integration_uri: Some(integration_uri.to_owned()),
                payload_format_version: input.payload_format_version.clone(),
                timeout_in_millis: input.timeout_in_millis,
                ..Default::default()
            })
            .await
            .map_err(|e| StratusError::AWS(e.to_string()))?;

        Ok(IntegrationSummary {
            integration_id: response
                .integration_id
                .ok_or_else(|| StratusError::AWS("No integration id!".to_string()))?,
            integration_uri: response
                .integration_uri
                .unwrap_or_else(|| integration_uri.to_owned()),
        })
    }

    async fn update_integration(
        &self,
        api_id: &str,
        integration_id: &str,
        input: &IntegrationInput,
    ) -> Result<IntegrationSummary> {
        let response = self
            .client
            .update_integration(UpdateIntegrationRequest {
                api_id: api_id.to_owned(),
                integration_id: integration_id.to_owned(),
                integration_method: Some(input.method.clone()),
                payload_format_version: input.payload_format_version.clone(),
                timeout_in_millis: input.timeout_in_millis,
                ..Default::default()
            })
            .await
            .map_err(|e| StratusError::AWS(e.to_string()))?;

        Ok(IntegrationSummary {
            integration_id: response
                .integration_id
                .unwrap_or_else(|| integration_id.to_owned()),
            integration_uri: response.integration_uri.unwrap_or_default(),
        })
    }

    async fn get_routes(&self, api_id: &str) -> Result<Vec<RouteSummary>> {
        let mut routes = vec![];
        let mut next_token = None;

        loop {
            let response = self
                .client
                .get_routes(GetRoutesRequest {
                    api_id: api_id.to_owned(),
                    next_token: next_token.clone(),
                    ..Default::default()
                })
                .await
                .map_err(|e| StratusError::AWS(e.to_string()))?;
            if let Some(items) = response.items {
                for route in items {
                    routes.push(RouteSummary {
                        route_id: route.route_id.unwrap_or_default(),
                        route_key: route.route_key,
                    });
                }
            }
            if response.next_token.is_none() {
                break;
            }
            next_token = response.next_token;
        }

        Ok(routes)
    }

    async fn create_route(
        &self,
        api_id: &str,
        route_key: &str,
        target: &str,
    ) -> Result<RouteSummary> {
        let response = self
            .client
            .create_route(CreateRouteRequest {
                api_id: api_id.to_owned(),
                route_key: route_key.to_owned(),
                authorization_type: Some("NONE".to_owned()),
                target: Some(target.to_owned()),
                ..Default::default()
            })
            .await
            .map_err(|e| StratusError::AWS(e.to_string()))?;

        Ok(RouteSummary {
            route_id: response.route_id.unwrap_or_default(),
            route_key: response.route_key.unwrap_or_else(|| route_key.to_owned()),
        })
    }

    async fn delete_api(&self, api_id: &str) -> Result<()> {
        self.client
            .delete_api(DeleteApiRequest {
                api_id: api_id.to_owned(),
            })
            .await
            .map_err(|e| match e {
                RusotoError::Service(DeleteApiError::NotFound(msg)) => StratusError::NotFound(msg),
                other => StratusError::AWS(other.to_string()),
            })
    }
}
