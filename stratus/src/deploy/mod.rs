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

//! The deployment orchestrator.
//!
//! Validates the manifest, sequences the function reconciler and the trigger
//! reconciler (function first on deploy, triggers first on remove), and
//! assembles the report returned to the caller.

pub mod function;
pub mod trigger;

use crate::aws::client::AwsClients;
use crate::aws::gateway::ApiGatewayService;
use crate::aws::iam::IamService;
use crate::aws::lambda::LambdaService;
use crate::error::{Result, StratusError};
use crate::manifest::{Credentials, FunctionSpec, Manifest};
use crate::package::{Packager, ZipPackager};
use crate::services::{ComputeService, GatewayService, IdentityService};
use self::function::FunctionReconciler;
use self::trigger::{ReconciliationResult, TriggerReconciler};
use log::info;
use serde::Serialize;
use std::sync::Arc;

/// The function part of a deploy report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionSummary {
    /// The function name.
    #[serde(rename = "Name")]
    pub name: String,
    /// The function ARN.
    #[serde(rename = "Arn")]
    pub arn: String,
}

/// The report returned by [Deployer::deploy].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeployOutput {
    /// The deployed function.
    #[serde(rename = "Function")]
    pub function: FunctionSummary,
    /// The per-event trigger outcomes.
    #[serde(rename = "Event")]
    pub event: ReconciliationResult,
    /// The synthesized role ARN, present only when the manifest had none.
    /// The caller persists it so future runs reuse the role.
    #[serde(skip)]
    pub resolved_role: Option<String>,
}

/// The function part of a remove report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemovedFunction {
    /// The function name.
    #[serde(rename = "Name")]
    pub name: String,
}

/// The report returned by [Deployer::remove].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoveOutput {
    /// The AWS region the removal ran against.
    #[serde(rename = "Region")]
    pub region: String,
    /// The removed function.
    #[serde(rename = "FunctionName")]
    pub function_name: RemovedFunction,
    /// The per-event trigger outcomes.
    #[serde(rename = "Event")]
    pub event: ReconciliationResult,
}

/// Sequences the reconcilers against a manifest.
pub struct Deployer {
    compute: Arc<dyn ComputeService>,
    identity: Arc<dyn IdentityService>,
    gateway: Arc<dyn GatewayService>,
    packager: Arc<dyn Packager>,
}

impl Deployer {
    /// Creates a deployer over explicit capability handles.
    pub fn new(
        compute: Arc<dyn ComputeService>,
        identity: Arc<dyn IdentityService>,
        gateway: Arc<dyn GatewayService>,
        packager: Arc<dyn Packager>,
    ) -> Self {
        Self {
            compute,
            identity,
            gateway,
            packager,
        }
    }

    /// Creates a deployer backed by the real AWS service façades.
    pub fn from_clients(clients: &AwsClients) -> Self {
        Deployer::new(
            Arc::new(LambdaService::new(clients.lambda.clone())),
            Arc::new(IamService::new(clients.iam.clone())),
            Arc::new(ApiGatewayService::new(clients.gateway.clone())),
            Arc::new(ZipPackager::default()),
        )
    }

    /// Deploys the function and its triggers.
    pub async fn deploy(&self, manifest: &Manifest) -> Result<DeployOutput> {
        validate_credentials(&manifest.credentials)?;
        let function_name = validate_function_name(&manifest.function)?;

        info!(
            "Starting deploy of AWS Lambda \"{}\" to the AWS region \"{}\".",
            function_name, manifest.region
        );
        let functions =
            FunctionReconciler::new(&*self.compute, &*self.identity, &*self.packager);
        let function = functions.deploy(&manifest.function).await?;
        info!("Successfully deployed the AWS Lambda function.");

        let triggers = TriggerReconciler::new(&*self.compute, &*self.gateway);
        let event = triggers
            .deploy(&manifest.events, function_name, &function.arn)
            .await?;

        let resolved_role = match manifest.function.role {
            None => Some(function.role.clone()),
            Some(_) => None,
        };

        Ok(DeployOutput {
            function: FunctionSummary {
                name: function.name,
                arn: function.arn,
            },
            event,
            resolved_role,
        })
    }

    /// Removes the triggers and then the function.
    pub async fn remove(&self, manifest: &Manifest) -> Result<RemoveOutput> {
        validate_credentials(&manifest.credentials)?;
        let function_name = validate_function_name(&manifest.function)?;

        let triggers = TriggerReconciler::new(&*self.compute, &*self.gateway);
        let event = triggers.remove(&manifest.events, function_name).await?;

        info!(
            "Starting remove of AWS Lambda \"{}\" in the AWS region \"{}\".",
            function_name, manifest.region
        );
        let functions =
            FunctionReconciler::new(&*self.compute, &*self.identity, &*self.packager);
        functions.remove(&manifest.function).await?;
        info!("Successfully removed the AWS Lambda function.");

        Ok(RemoveOutput {
            region: manifest.region.clone(),
            function_name: RemovedFunction {
                name: function_name.to_owned(),
            },
            event,
        })
    }
}

fn validate_credentials(credentials: &Credentials) -> Result<()> {
    if credentials.access_key_id.is_empty() && credentials.secret_access_key.is_empty() {
        return Err(StratusError::Validation("Credentials not found.".to_string()));
    }
    Ok(())
}

fn validate_function_name(function: &FunctionSpec) -> Result<&str> {
    if function.function_name.is_empty() {
        return Err(StratusError::Validation("FunctionName is empty.".to_string()));
    }
    Ok(&function.function_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{Manifest, TriggerSpec, API_EVENT_TYPE};
    use crate::test_util::{FixedPackager, InMemoryCompute, InMemoryGateway, InMemoryIdentity};
    use super::trigger::EventOutcome;

    fn manifest() -> Manifest {
        let mut manifest = Manifest {
            credentials: Credentials {
                access_key_id: "AKIAEXAMPLE".to_string(),
                secret_access_key: "secret".to_string(),
            },
            region: "us-east-1".to_string(),
            function: FunctionSpec {
                function_name: "hello".to_string(),
                code: "./src".to_string(),
                role: Some("arn:aws:iam::123456789012:role/fixed".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        manifest.events.insert(
            "hello-api".to_string(),
            TriggerSpec {
                event_type: API_EVENT_TYPE.to_string(),
                method: Some("get".to_string()),
                path: "/items".to_string(),
                ..Default::default()
            },
        );
        manifest
    }

    fn deployer() -> (Deployer, Arc<InMemoryCompute>, Arc<InMemoryGateway>) {
        let compute = Arc::new(InMemoryCompute::default());
        let gateway = Arc::new(InMemoryGateway::default());
        let deployer = Deployer::new(
            compute.clone(),
            Arc::new(InMemoryIdentity::default()),
            gateway.clone(),
            Arc::new(FixedPackager::default()),
        );
        (deployer, compute, gateway)
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_remote_call() {
        let (deployer, compute, _) = deployer();
        let mut manifest = manifest();
        manifest.credentials = Credentials::default();

        let result = deployer.deploy(&manifest).await;
        assert!(matches!(result, Err(StratusError::Validation(_))));
        assert_eq!(
            0,
            compute
                .create_calls
                .load(std::sync::atomic::Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn missing_function_name_fails_validation() {
        let (deployer, _, _) = deployer();
        let mut manifest = manifest();
        manifest.function.function_name.clear();

        let deploy = deployer.deploy(&manifest).await;
        assert!(matches!(deploy, Err(StratusError::Validation(_))));
        let remove = deployer.remove(&manifest).await;
        assert!(matches!(remove, Err(StratusError::Validation(_))));
    }

    #[tokio::test]
    async fn deploy_reports_the_function_and_its_endpoint() -> Result<()> {
        let (deployer, _, _) = deployer();
        let output = deployer.deploy(&manifest()).await?;

        assert_eq!("hello", output.function.name);
        assert!(output.function.arn.ends_with(":function:hello"));
        // The manifest supplied a role, so nothing needs persisting.
        assert_eq!(None, output.resolved_role);
        match &output.event["hello-api"] {
            EventOutcome::Endpoint { api_endpoint, uri } => {
                assert!(uri.starts_with(api_endpoint));
                assert!(uri.ends_with("/items"));
            }
            other => panic!("expected an endpoint entry, got {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn deploy_hands_back_a_synthesized_role_for_persistence() -> Result<()> {
        let (deployer, _, _) = deployer();
        let mut manifest = manifest();
        manifest.function.role = None;

        // The in-memory compute accepts the role immediately, so the
        // propagation sleep is the only cost of this path.
        let output = deployer.deploy(&manifest).await?;
        let role = output.resolved_role.expect("role should be handed back");
        assert!(role.contains("s-hello-role-"));
        Ok(())
    }

    #[tokio::test]
    async fn remove_reports_region_function_and_events() -> Result<()> {
        let (deployer, _, _) = deployer();
        let manifest = manifest();
        deployer.deploy(&manifest).await?;

        let output = deployer.remove(&manifest).await?;
        assert_eq!("us-east-1", output.region);
        assert_eq!("hello", output.function_name.name);
        assert!(matches!(
            output.event["hello-api"],
            EventOutcome::Message { .. }
        ));
        Ok(())
    }

    #[test]
    fn reports_serialize_with_the_wire_field_names() -> Result<()> {
        let output = DeployOutput {
            function: FunctionSummary {
                name: "hello".to_string(),
                arn: "arn:aws:lambda:us-east-1:123456789012:function:hello".to_string(),
            },
            event: ReconciliationResult::new(),
            resolved_role: Some("hidden".to_string()),
        };
        let json = serde_json::to_value(&output)?;
        assert_eq!("hello", json["Function"]["Name"]);
        assert!(json.get("resolved_role").is_none());
        Ok(())
    }
}
