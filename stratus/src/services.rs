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

//! Capability interfaces over the remote control-plane services.
//!
//! Each trait turns one remote service into a set of uniform awaitable calls
//! returning a success value or a classified [StratusError]. The façade
//! implementations in [`crate::aws`] perform no retries and hold no policy;
//! all reconciliation decisions live in [`crate::deploy`]. The reconcilers
//! only ever see these traits, which keeps them testable against the
//! in-memory doubles in [`crate::test_util`].

use crate::error::Result;
use crate::manifest::FunctionSpec;
use async_trait::async_trait;
use bytes::Bytes;

/// The stable identity of a deployed function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDescriptor {
    /// The function name.
    pub name: String,
    /// The function ARN.
    pub arn: String,
    /// The execution role ARN attached to the function, if reported.
    pub role: Option<String>,
}

/// A gateway API, keyed by its user-visible name.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiSummary {
    /// The remote API identifier.
    pub api_id: String,
    /// The API name. Trigger reconciliation matches on it.
    pub name: String,
    /// The public invoke endpoint.
    pub api_endpoint: String,
}

/// An integration binding an API to a backend, keyed by its target URI.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationSummary {
    /// The remote integration identifier.
    pub integration_id: String,
    /// The backend URI the integration points at.
    pub integration_uri: String,
}

/// A route selecting an integration by method and path.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSummary {
    /// The remote route identifier.
    pub route_id: String,
    /// The route key, `"<METHOD> <Path>"`.
    pub route_key: String,
}

/// The settings applied to an integration on create or update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegrationInput {
    /// The HTTP method forwarded to the backend.
    pub method: String,
    /// The payload format version, if the event names one.
    pub payload_format_version: Option<String>,
    /// The integration timeout in milliseconds, if the event names one.
    pub timeout_in_millis: Option<i64>,
}

/// An invoke-permission grant on a function.
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionGrant {
    /// The function the statement is attached to.
    pub function_name: String,
    /// The deterministic statement identifier.
    pub statement_id: String,
    /// The granted action, e.g. `lambda:InvokeFunction`.
    pub action: String,
    /// The service principal receiving the grant.
    pub principal: String,
    /// The source ARN the grant is scoped to.
    pub source_arn: String,
}

/// Operations on the compute service (Lambda).
#[async_trait]
pub trait ComputeService: Send + Sync {
    /// Fetches the function by name. Returns [StratusError::NotFound] when it
    /// does not exist.
    ///
    /// [StratusError::NotFound]: crate::error::StratusError::NotFound
    async fn get_function(&self, name: &str) -> Result<FunctionDescriptor>;

    /// Creates the function with the given role and code archive. Returns
    /// [StratusError::RoleNotAssumable] while a freshly created role has not
    /// propagated.
    ///
    /// [StratusError::RoleNotAssumable]: crate::error::StratusError::RoleNotAssumable
    async fn create_function(
        &self,
        spec: &FunctionSpec,
        role: &str,
        code: Bytes,
    ) -> Result<FunctionDescriptor>;

    /// Replaces the function's code archive.
    async fn update_function_code(&self, name: &str, code: Bytes) -> Result<FunctionDescriptor>;

    /// Updates the function's runtime configuration. The code location is
    /// deliberately absent from this payload.
    async fn update_function_configuration(&self, spec: &FunctionSpec)
        -> Result<FunctionDescriptor>;

    /// Deletes the function by name.
    async fn delete_function(&self, name: &str) -> Result<()>;

    /// Adds an invoke-permission statement to the function.
    async fn add_permission(&self, grant: &PermissionGrant) -> Result<()>;

    /// Removes the permission statement with the given identifier.
    async fn remove_permission(&self, function_name: &str, statement_id: &str) -> Result<()>;
}

/// Operations on the identity service (IAM).
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Creates an IAM role with the given trust policy and returns its ARN.
    async fn create_role(
        &self,
        role_name: &str,
        trust_policy: &str,
        description: &str,
    ) -> Result<String>;
}

/// Operations on the gateway service (API Gateway v2).
#[async_trait]
pub trait GatewayService: Send + Sync {
    /// Lists all APIs in the region.
    async fn get_apis(&self) -> Result<Vec<ApiSummary>>;

    /// Creates an HTTP-protocol API targeting the function ARN.
    async fn create_api(&self, name: &str, target_arn: &str) -> Result<ApiSummary>;

    /// Lists the integrations attached to an API.
    async fn get_integrations(&self, api_id: &str) -> Result<Vec<IntegrationSummary>>;

    /// Creates a proxy integration pointing at `integration_uri`.
    async fn create_integration(
        &self,
        api_id: &str,
        integration_uri: &str,
        input: &IntegrationInput,
    ) -> Result<IntegrationSummary>;

    /// Updates an existing integration in place.
    async fn update_integration(
        &self,
        api_id: &str,
        integration_id: &str,
        input: &IntegrationInput,
    ) -> Result<IntegrationSummary>;

    /// Lists the routes attached to an API.
    async fn get_routes(&self, api_id: &str) -> Result<Vec<RouteSummary>>;

    /// Creates a route with no authorization pointing at `target`.
    async fn create_route(&self, api_id: &str, route_key: &str, target: &str)
        -> Result<RouteSummary>;

    /// Deletes an API. The remote system cascades the deletion to its
    /// integrations and routes.
    async fn delete_api(&self, api_id: &str) -> Result<()>;
}
