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

//! The function reconciler.
//!
//! Owns the create-vs-update decision for the compute function, the automatic
//! provisioning of a missing execution role, and the bounded retry past the
//! role's propagation delay.

use crate::config::{
    STRATUS_ROLE_PROPAGATION_DELAY, STRATUS_ROLE_RETRY_BUDGET, STRATUS_ROLE_RETRY_INTERVAL,
};
use crate::error::{Result, StratusError};
use crate::manifest::FunctionSpec;
use crate::package::Packager;
use crate::services::{ComputeService, IdentityService};
use bytes::Bytes;
use log::{error, info, warn};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::time::Duration;

/// The trust policy attached to synthesized roles, granting the compute
/// service `sts:AssumeRole`.
const TRUST_POLICY_DOCUMENT: &str = r#"{
  "Version": "2012-10-17",
  "Statement": [{
    "Effect": "Allow",
    "Action": ["sts:AssumeRole"],
    "Principal": {
      "Service": ["lambda.amazonaws.com"]
    }
  }]
}"#;

/// The stable identifiers of the reconciled function, handed back to the
/// orchestrator so the role can be persisted for future runs.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionOutput {
    /// The function name.
    pub name: String,
    /// The function ARN.
    pub arn: String,
    /// The role ARN actually used, pre-supplied or synthesized.
    pub role: String,
}

/// Brings the remote function to match a [FunctionSpec], creating or updating
/// it as needed.
pub struct FunctionReconciler<'a> {
    compute: &'a dyn ComputeService,
    identity: &'a dyn IdentityService,
    packager: &'a dyn Packager,
    propagation_delay: Duration,
    retry_interval: Duration,
}

impl<'a> FunctionReconciler<'a> {
    /// Creates a reconciler over the given capability handles.
    pub fn new(
        compute: &'a dyn ComputeService,
        identity: &'a dyn IdentityService,
        packager: &'a dyn Packager,
    ) -> Self {
        Self {
            compute,
            identity,
            packager,
            propagation_delay: *STRATUS_ROLE_PROPAGATION_DELAY,
            retry_interval: *STRATUS_ROLE_RETRY_INTERVAL,
        }
    }

    /// Overrides the role-propagation sleeps. Used by tests.
    pub fn set_delays(&mut self, propagation: Duration, retry: Duration) -> &mut Self {
        self.propagation_delay = propagation;
        self.retry_interval = retry;
        self
    }

    /// Converges the remote function to `spec`, regardless of whether it
    /// previously existed.
    pub async fn deploy(&self, spec: &FunctionSpec) -> Result<FunctionOutput> {
        let code = self.packager.resolve(&spec.code, &spec.function_name)?;

        match self.compute.get_function(&spec.function_name).await {
            Ok(_) => {
                info!(
                    "Function \"{}\" already exists, updating code and configuration.",
                    spec.function_name
                );
                self.compute
                    .update_function_code(&spec.function_name, code)
                    .await?;
                let descriptor = self.compute.update_function_configuration(spec).await?;
                let role = descriptor.role.clone().or_else(|| spec.role.clone());
                Ok(FunctionOutput {
                    name: descriptor.name,
                    arn: descriptor.arn,
                    role: role.unwrap_or_default(),
                })
            }
            Err(StratusError::NotFound(_)) => self.create(spec, code).await,
            Err(e) => Err(e),
        }
    }

    /// Deletes the remote function. Absence is not specially handled; the
    /// remote error surfaces as-is.
    pub async fn remove(&self, spec: &FunctionSpec) -> Result<()> {
        self.compute.delete_function(&spec.function_name).await
    }

    async fn create(&self, spec: &FunctionSpec, code: Bytes) -> Result<FunctionOutput> {
        let (role, retry_budget) = match &spec.role {
            Some(role) => (role.clone(), 1),
            None => {
                warn!(
                    "The configuration does not have role information, \
                     generating the role automatically."
                );
                let role = self.create_role(&spec.function_name).await?;
                warn!(
                    "Start trying to create the function after {:?} of sleep.",
                    self.propagation_delay
                );
                tokio::time::sleep(self.propagation_delay).await;
                (role, *STRATUS_ROLE_RETRY_BUDGET)
            }
        };

        let mut attempt = 1;
        loop {
            match self.compute.create_function(spec, &role, code.clone()).await {
                Ok(descriptor) => {
                    return Ok(FunctionOutput {
                        name: descriptor.name,
                        arn: descriptor.arn,
                        role,
                    });
                }
                Err(StratusError::RoleNotAssumable(msg)) if attempt < retry_budget => {
                    error!("Create failure: {}", msg);
                    info!("Retry {} times", attempt);
                    tokio::time::sleep(self.retry_interval).await;
                    attempt += 1;
                }
                Err(StratusError::RoleNotAssumable(msg)) => {
                    // Budget exhausted; surface the original message.
                    return Err(StratusError::AWS(msg));
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn create_role(&self, function_name: &str) -> Result<String> {
        let role_name = format!("s-{}-role-{}", function_name, random_suffix());
        info!("Start generating role: {}", role_name);
        let arn = self
            .identity
            .create_role(
                &role_name,
                TRUST_POLICY_DOCUMENT,
                "stratus auto generated role.",
            )
            .await?;
        info!("Successfully generated role.");
        Ok(arn)
    }
}

fn random_suffix() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{FixedPackager, InMemoryCompute, InMemoryIdentity};
    use std::sync::atomic::Ordering;

    fn spec(role: Option<&str>) -> FunctionSpec {
        FunctionSpec {
            function_name: "hello".to_string(),
            code: "./src".to_string(),
            runtime: Some("nodejs12.x".to_string()),
            handler: Some("index.handler".to_string()),
            role: role.map(str::to_string),
            ..Default::default()
        }
    }

    fn reconciler<'a>(
        compute: &'a InMemoryCompute,
        identity: &'a InMemoryIdentity,
        packager: &'a FixedPackager,
    ) -> FunctionReconciler<'a> {
        let mut reconciler = FunctionReconciler::new(compute, identity, packager);
        reconciler.set_delays(Duration::ZERO, Duration::ZERO);
        reconciler
    }

    #[tokio::test]
    async fn absent_function_takes_the_create_path_and_provisions_a_role() -> Result<()> {
        let compute = InMemoryCompute::default();
        let identity = InMemoryIdentity::default();
        let packager = FixedPackager::default();

        let output = reconciler(&compute, &identity, &packager)
            .deploy(&spec(None))
            .await?;

        assert_eq!("hello", output.name);
        assert_eq!(1, compute.create_calls.load(Ordering::SeqCst));
        let roles = identity.roles.lock().unwrap();
        assert_eq!(1, roles.len());
        assert!(roles[0].starts_with("s-hello-role-"));
        assert_eq!("s-hello-role-".len() + 8, roles[0].len());
        assert!(output.role.contains(&roles[0]));
        Ok(())
    }

    #[tokio::test]
    async fn present_function_takes_the_update_path_and_never_creates_a_role() -> Result<()> {
        let compute = InMemoryCompute::default();
        compute.seed_function("hello");
        let identity = InMemoryIdentity::default();
        let packager = FixedPackager::default();

        let output = reconciler(&compute, &identity, &packager)
            .deploy(&spec(None))
            .await?;

        assert_eq!("hello", output.name);
        assert_eq!(0, compute.create_calls.load(Ordering::SeqCst));
        assert_eq!(1, compute.update_code_calls.load(Ordering::SeqCst));
        assert_eq!(1, compute.update_config_calls.load(Ordering::SeqCst));
        assert!(identity.roles.lock().unwrap().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn retries_within_budget_until_the_role_propagates() -> Result<()> {
        let compute = InMemoryCompute::default();
        compute.role_failures.store(2, Ordering::SeqCst);
        let identity = InMemoryIdentity::default();
        let packager = FixedPackager::default();

        let output = reconciler(&compute, &identity, &packager)
            .deploy(&spec(None))
            .await?;

        assert_eq!("hello", output.name);
        // Two failures, success on the third attempt.
        assert_eq!(3, compute.create_calls.load(Ordering::SeqCst));
        Ok(())
    }

    #[tokio::test]
    async fn exhausting_the_budget_surfaces_the_original_message() -> Result<()> {
        let compute = InMemoryCompute::default();
        compute.role_failures.store(5, Ordering::SeqCst);
        let identity = InMemoryIdentity::default();
        let packager = FixedPackager::default();

        let result = reconciler(&compute, &identity, &packager)
            .deploy(&spec(None))
            .await;

        assert_eq!(5, compute.create_calls.load(Ordering::SeqCst));
        match result {
            Err(StratusError::AWS(msg)) => {
                assert_eq!(crate::aws::lambda::ROLE_NOT_ASSUMABLE_MESSAGE, msg)
            }
            other => panic!("expected an AWS error, got {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn presupplied_role_gets_no_retry() -> Result<()> {
        let compute = InMemoryCompute::default();
        compute.role_failures.store(1, Ordering::SeqCst);
        let identity = InMemoryIdentity::default();
        let packager = FixedPackager::default();

        let result = reconciler(&compute, &identity, &packager)
            .deploy(&spec(Some("arn:aws:iam::123456789012:role/fixed")))
            .await;

        assert!(result.is_err());
        assert_eq!(1, compute.create_calls.load(Ordering::SeqCst));
        assert!(identity.roles.lock().unwrap().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn removing_an_absent_function_surfaces_the_remote_error() {
        let compute = InMemoryCompute::default();
        let identity = InMemoryIdentity::default();
        let packager = FixedPackager::default();

        let result = reconciler(&compute, &identity, &packager)
            .remove(&spec(None))
            .await;
        assert!(matches!(result, Err(StratusError::NotFound(_))));
    }
}
