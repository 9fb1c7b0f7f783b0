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

//! Common unit test utility methods.
//!
//! In-memory doubles for the remote control plane. They keep the resource
//! state a real deployment would create (functions, roles, APIs with their
//! integrations and routes, permission statements) so reconciliation tests
//! can assert convergence across repeated runs, and they count calls so tests
//! can assert which paths were taken.

use crate::aws::lambda::ROLE_NOT_ASSUMABLE_MESSAGE;
use crate::error::{Result, StratusError};
use crate::manifest::FunctionSpec;
use crate::package::Packager;
use crate::services::{
    ApiSummary, ComputeService, FunctionDescriptor, GatewayService, IdentityService,
    IntegrationInput, IntegrationSummary, PermissionGrant, RouteSummary,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A packager that hands back a fixed archive without touching the disk.
#[derive(Default)]
pub struct FixedPackager;

impl Packager for FixedPackager {
    fn resolve(&self, _code_uri: &str, _function_name: &str) -> Result<Bytes> {
        Ok(Bytes::from_static(b"PK\x03\x04fixture"))
    }
}

/// An in-memory compute service.
#[derive(Default)]
pub struct InMemoryCompute {
    /// The functions that currently exist, keyed by name.
    pub functions: Mutex<HashMap<String, FunctionDescriptor>>,
    /// Permission statement ids per function.
    pub permissions: Mutex<HashMap<String, Vec<String>>>,
    /// Number of create attempts that should fail with the role-propagation
    /// error before one succeeds.
    pub role_failures: AtomicUsize,
    /// Calls to `create_function`.
    pub create_calls: AtomicUsize,
    /// Calls to `update_function_code`.
    pub update_code_calls: AtomicUsize,
    /// Calls to `update_function_configuration`.
    pub update_config_calls: AtomicUsize,
    /// Calls to `add_permission`.
    pub add_permission_calls: AtomicUsize,
    /// Calls to `remove_permission`.
    pub remove_permission_calls: AtomicUsize,
}

fn function_arn(name: &str) -> String {
    format!("arn:aws:lambda:us-east-1:123456789012:function:{}", name)
}

impl InMemoryCompute {
    /// Makes a function exist remotely before the test runs.
    pub fn seed_function(&self, name: &str) {
        self.functions.lock().unwrap().insert(
            name.to_string(),
            FunctionDescriptor {
                name: name.to_string(),
                arn: function_arn(name),
                role: Some(format!("arn:aws:iam::123456789012:role/{}-role", name)),
            },
        );
    }

    /// Returns the permission statement ids attached to a function.
    pub fn statements(&self, name: &str) -> Vec<String> {
        self.permissions
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ComputeService for InMemoryCompute {
    async fn get_function(&self, name: &str) -> Result<FunctionDescriptor> {
        self.functions
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| StratusError::NotFound(format!("Function not found: {}", name)))
    }

    async fn create_function(
        &self,
        spec: &FunctionSpec,
        role: &str,
        _code: Bytes,
    ) -> Result<FunctionDescriptor> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.role_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.role_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StratusError::RoleNotAssumable(
                ROLE_NOT_ASSUMABLE_MESSAGE.to_string(),
            ));
        }

        let descriptor = FunctionDescriptor {
            name: spec.function_name.clone(),
            arn: function_arn(&spec.function_name),
            role: Some(role.to_string()),
        };
        self.functions
            .lock()
            .unwrap()
            .insert(spec.function_name.clone(), descriptor.clone());
        Ok(descriptor)
    }

    async fn update_function_code(&self, name: &str, _code: Bytes) -> Result<FunctionDescriptor> {
        self.update_code_calls.fetch_add(1, Ordering::SeqCst);
        self.get_function(name).await
    }

    async fn update_function_configuration(
        &self,
        spec: &FunctionSpec,
    ) -> Result<FunctionDescriptor> {
        self.update_config_calls.fetch_add(1, Ordering::SeqCst);
        self.get_function(&spec.function_name).await
    }

    async fn delete_function(&self, name: &str) -> Result<()> {
        self.functions
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StratusError::NotFound(format!("Function not found: {}", name)))
    }

    async fn add_permission(&self, grant: &PermissionGrant) -> Result<()> {
        self.add_permission_calls.fetch_add(1, Ordering::SeqCst);
        let mut permissions = self.permissions.lock().unwrap();
        let statements = permissions
            .entry(grant.function_name.clone())
            .or_insert_with(Vec::new);
        if statements.contains(&grant.statement_id) {
            return Err(StratusError::AWS(format!(
                "Statement already exists: {}",
                grant.statement_id
            )));
        }
        statements.push(grant.statement_id.clone());
        Ok(())
    }

    async fn remove_permission(&self, function_name: &str, statement_id: &str) -> Result<()> {
        self.remove_permission_calls.fetch_add(1, Ordering::SeqCst);
        let mut permissions = self.permissions.lock().unwrap();
        let statements = permissions.entry(function_name.to_string()).or_default();
        match statements.iter().position(|id| id == statement_id) {
            Some(index) => {
                statements.remove(index);
                Ok(())
            }
            None => Err(StratusError::NotFound(format!(
                "Statement not found: {}",
                statement_id
            ))),
        }
    }
}

/// An in-memory identity service.
#[derive(Default)]
pub struct InMemoryIdentity {
    /// The role names created so far.
    pub roles: Mutex<Vec<String>>,
}

#[async_trait]
impl IdentityService for InMemoryIdentity {
    async fn create_role(
        &self,
        role_name: &str,
        _trust_policy: &str,
        _description: &str,
    ) -> Result<String> {
        self.roles.lock().unwrap().push(role_name.to_string());
        Ok(format!("arn:aws:iam::123456789012:role/{}", role_name))
    }
}

/// One API held by the in-memory gateway, with its dependent chain.
pub struct FakeApi {
    /// The API itself.
    pub summary: ApiSummary,
    /// The integrations attached to the API.
    pub integrations: Vec<IntegrationSummary>,
    /// The routes attached to the API.
    pub routes: Vec<RouteSummary>,
}

/// An in-memory gateway service.
#[derive(Default)]
pub struct InMemoryGateway {
    /// The APIs that currently exist.
    pub apis: Mutex<Vec<FakeApi>>,
    /// API ids deleted so far.
    pub deleted: Mutex<Vec<String>>,
    /// Calls to `create_api`.
    pub create_api_calls: AtomicUsize,
    /// Calls to `create_integration`.
    pub create_integration_calls: AtomicUsize,
    /// Calls to `update_integration`.
    pub update_integration_calls: AtomicUsize,
    /// Calls to `create_route`.
    pub create_route_calls: AtomicUsize,
    next_id: AtomicUsize,
}

impl InMemoryGateway {
    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Makes an API with one integration exist remotely before the test runs.
    pub fn seed_api(&self, name: &str, integration_uri: &str) {
        let api_id = self.next_id("api");
        self.apis.lock().unwrap().push(FakeApi {
            summary: ApiSummary {
                api_id: api_id.clone(),
                name: name.to_string(),
                api_endpoint: format!("https://{}.execute-api.us-east-1.amazonaws.com", api_id),
            },
            integrations: vec![IntegrationSummary {
                integration_id: self.next_id("integration"),
                integration_uri: integration_uri.to_string(),
            }],
            routes: vec![],
        });
    }
}

#[async_trait]
impl GatewayService for InMemoryGateway {
    async fn get_apis(&self) -> Result<Vec<ApiSummary>> {
        Ok(self
            .apis
            .lock()
            .unwrap()
            .iter()
            .map(|api| api.summary.clone())
            .collect())
    }

    async fn create_api(&self, name: &str, _target_arn: &str) -> Result<ApiSummary> {
        self.create_api_calls.fetch_add(1, Ordering::SeqCst);
        let api_id = self.next_id("api");
        let summary = ApiSummary {
            api_id: api_id.clone(),
            name: name.to_string(),
            api_endpoint: format!("https://{}.execute-api.us-east-1.amazonaws.com", api_id),
        };
        self.apis.lock().unwrap().push(FakeApi {
            summary: summary.clone(),
            integrations: vec![],
            routes: vec![],
        });
        Ok(summary)
    }

    async fn get_integrations(&self, api_id: &str) -> Result<Vec<IntegrationSummary>> {
        let apis = self.apis.lock().unwrap();
        let api = apis
            .iter()
            .find(|api| api.summary.api_id == api_id)
            .ok_or_else(|| StratusError::NotFound(format!("API not found: {}", api_id)))?;
        Ok(api.integrations.clone())
    }

    async fn create_integration(
        &self,
        api_id: &str,
        integration_uri: &str,
        _input: &IntegrationInput,
    ) -> Result<IntegrationSummary> {
        self.create_integration_calls.fetch_add(1, Ordering::SeqCst);
        let integration = IntegrationSummary {
            integration_id: self.next_id("integration"),
            integration_uri: integration_uri.to_string(),
        };
        let mut apis = self.apis.lock().unwrap();
        let api = apis
            .iter_mut()
            .find(|api| api.summary.api_id == api_id)
            .ok_or_else(|| StratusError::NotFound(format!("API not found: {}", api_id)))?;
        api.integrations.push(integration.clone());
        Ok(integration)
    }

    async fn update_integration(
        &self,
        api_id: &str,
        integration_id: &str,
        _input: &IntegrationInput,
    ) -> Result<IntegrationSummary> {
        self.update_integration_calls.fetch_add(1, Ordering::SeqCst);
        let apis = self.apis.lock().unwrap();
        let api = apis
            .iter()
            .find(|api| api.summary.api_id == api_id)
            .ok_or_else(|| StratusError::NotFound(format!("API not found: {}", api_id)))?;
        api.integrations
            .iter()
            .find(|integration| integration.integration_id == integration_id)
            .cloned()
            .ok_or_else(|| {
                StratusError::NotFound(format!("Integration not found: {}", integration_id))
            })
    }

    async fn get_routes(&self, api_id: &str) -> Result<Vec<RouteSummary>> {
        let apis = self.apis.lock().unwrap();
        let api = apis
            .iter()
            .find(|api| api.summary.api_id == api_id)
            .ok_or_else(|| StratusError::NotFound(format!("API not found: {}", api_id)))?;
        Ok(api.routes.clone())
    }

    async fn create_route(
        &self,
        api_id: &str,
        route_key: &str,
        _target: &str,
    ) -> Result<RouteSummary> {
        self.create_route_calls.fetch_add(1, Ordering::SeqCst);
        let route = RouteSummary {
            route_id: self.next_id("route"),
            route_key: route_key.to_string(),
        };
        let mut apis = self.apis.lock().unwrap();
        let api = apis
            .iter_mut()
            .find(|api| api.summary.api_id == api_id)
            .ok_or_else(|| StratusError::NotFound(format!("API not found: {}", api_id)))?;
        api.routes.push(route.clone());
        Ok(route)
    }

    async fn delete_api(&self, api_id: &str) -> Result<()> {
        let mut apis = self.apis.lock().unwrap();
        match apis.iter().position(|api| api.summary.api_id == api_id) {
            Some(index) => {
                apis.remove(index);
                self.deleted.lock().unwrap().push(api_id.to_string());
                Ok(())
            }
            None => Err(StratusError::NotFound(format!("API not found: {}", api_id))),
        }
    }
}
