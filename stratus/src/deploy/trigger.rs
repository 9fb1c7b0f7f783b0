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

//! The trigger reconciler.
//!
//! Converges the gateway resource chain Api -> Integration -> Route ->
//! Permission for each `Api` event. Every step is a get-or-create keyed on a
//! stable identifier (API name, integration URI, route key, statement id), so
//! re-running a deploy converges instead of duplicating resources. Events and
//! chain steps run strictly in sequence: each step needs the identifier the
//! previous one produced, and serializing events avoids concurrent mutation
//! when two events name the same API.

use crate::config::{
    STRATUS_GATEWAY_TIMEOUT_MS, STRATUS_PAYLOAD_FORMAT_VERSION, STRATUS_PERMISSION_NAMESPACE,
};
use crate::error::{Result, StratusError};
use crate::manifest::{TriggerSpec, API_EVENT_TYPE};
use crate::services::{
    ApiSummary, ComputeService, GatewayService, IntegrationInput, IntegrationSummary,
    PermissionGrant,
};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

const DEFAULT_INTEGRATION_METHOD: &str = "post";
const GATEWAY_PRINCIPAL: &str = "apigateway.amazonaws.com";
const INVOKE_ACTION: &str = "lambda:InvokeFunction";

/// The per-event outcome of a trigger reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventOutcome {
    /// The event was reconciled into a reachable endpoint.
    Endpoint {
        /// The API's public endpoint.
        #[serde(rename = "ApiEndpoint")]
        api_endpoint: String,
        /// The endpoint joined with the event's path.
        #[serde(rename = "Uri")]
        uri: String,
    },
    /// The event was skipped or completed with a message.
    Message {
        /// A human-readable skip or completion message.
        #[serde(rename = "Message")]
        message: String,
    },
}

/// Per-event outcomes keyed by event name. One entry per input event, never
/// partially constructed.
pub type ReconciliationResult = BTreeMap<String, EventOutcome>;

/// Derives the deterministic permission statement identifier for a function.
/// Stable across runs, which is what makes permission management idempotent.
pub fn permission_statement_id(function_name: &str) -> String {
    Uuid::new_v5(&STRATUS_PERMISSION_NAMESPACE, function_name.as_bytes()).to_string()
}

/// Builds the `execute-api` source ARN the invoke permission is scoped to,
/// with the partition fields parsed out of the function ARN.
pub fn execute_api_source_arn(function_arn: &str, api_id: &str, path: &str) -> Result<String> {
    let parts: Vec<&str> = function_arn.split(':').collect();
    if parts.len() < 5 {
        return Err(StratusError::Internal(format!(
            "Malformed function ARN: {}",
            function_arn
        )));
    }
    Ok(format!(
        "arn:aws:execute-api:{}:{}:{}/*/*{}",
        parts[3], parts[4], api_id, path
    ))
}

fn route_key(method: &str, path: &str) -> String {
    format!("{} {}", method.to_uppercase(), path)
}

/// Idempotently converges the gateway resource chain for each event.
pub struct TriggerReconciler<'a> {
    compute: &'a dyn ComputeService,
    gateway: &'a dyn GatewayService,
}

impl<'a> TriggerReconciler<'a> {
    /// Creates a reconciler over the given capability handles.
    pub fn new(compute: &'a dyn ComputeService, gateway: &'a dyn GatewayService) -> Self {
        Self { compute, gateway }
    }

    /// Deploys every event against the function, returning one outcome per
    /// event. Non-`Api` events are skipped with a message; any chain failure
    /// aborts the whole call.
    pub async fn deploy(
        &self,
        events: &BTreeMap<String, TriggerSpec>,
        function_name: &str,
        function_arn: &str,
    ) -> Result<ReconciliationResult> {
        let mut outcomes = ReconciliationResult::new();

        for (event_name, event) in events {
            if event.event_type != API_EVENT_TYPE {
                let message = format!(
                    "{} is not supported, so skip this configuration",
                    event.event_type
                );
                warn!("{}", message);
                outcomes.insert(event_name.clone(), EventOutcome::Message { message });
                continue;
            }

            info!("Start deploying {}.", event_name);
            let outcome = self
                .add_api_trigger(function_name, event_name, function_arn, event)
                .await?;
            outcomes.insert(event_name.clone(), outcome);
            info!("Successfully deployed {}.", event_name);
        }

        Ok(outcomes)
    }

    /// Removes every event's trigger. API deletion is best-effort; the
    /// permission revoke is issued unconditionally, and a missing statement
    /// is a no-op success.
    pub async fn remove(
        &self,
        events: &BTreeMap<String, TriggerSpec>,
        function_name: &str,
    ) -> Result<ReconciliationResult> {
        let mut outcomes = ReconciliationResult::new();

        for (event_name, event) in events {
            if event.event_type != API_EVENT_TYPE {
                let message = format!(
                    "{} is not supported, so skip this configuration",
                    event.event_type
                );
                warn!("{}", message);
                outcomes.insert(event_name.clone(), EventOutcome::Message { message });
                continue;
            }

            let outcome = self.remove_api_trigger(event_name, function_name).await?;
            outcomes.insert(event_name.clone(), outcome);
        }

        Ok(outcomes)
    }

    async fn add_api_trigger(
        &self,
        function_name: &str,
        event_name: &str,
        function_arn: &str,
        event: &TriggerSpec,
    ) -> Result<EventOutcome> {
        let api = self.reconcile_api(event_name, function_arn).await?;
        let integration = self
            .reconcile_integration(&api.api_id, event, function_arn)
            .await?;
        self.reconcile_route(&api.api_id, event, &integration.integration_id)
            .await?;
        self.reconcile_permission(function_name, function_arn, &api.api_id, &event.path)
            .await?;

        Ok(EventOutcome::Endpoint {
            api_endpoint: api.api_endpoint.clone(),
            uri: format!("{}{}", api.api_endpoint, event.path),
        })
    }

    async fn reconcile_api(&self, api_name: &str, function_arn: &str) -> Result<ApiSummary> {
        let apis = self.gateway.get_apis().await?;
        if let Some(api) = apis.into_iter().find(|api| api.name == api_name) {
            return Ok(api);
        }

        info!(
            "The API Gateway does not have \"{}\", start creating the API automatically.",
            api_name
        );
        let api = self.gateway.create_api(api_name, function_arn).await?;
        info!("Successfully created the API.");
        Ok(api)
    }

    async fn reconcile_integration(
        &self,
        api_id: &str,
        event: &TriggerSpec,
        function_arn: &str,
    ) -> Result<IntegrationSummary> {
        let method = event
            .method
            .clone()
            .unwrap_or_else(|| DEFAULT_INTEGRATION_METHOD.to_string());

        let integrations = self.gateway.get_integrations(api_id).await?;
        if let Some(existing) = integrations
            .into_iter()
            .find(|integration| integration.integration_uri == function_arn)
        {
            let input = IntegrationInput {
                method,
                payload_format_version: event.payload_format_version.clone(),
                timeout_in_millis: event.timeout_in_millis,
            };
            return self
                .gateway
                .update_integration(api_id, &existing.integration_id, &input)
                .await;
        }

        info!(
            "There is no \"{}\" in the integrations, start creating the integration automatically.",
            function_arn
        );
        let input = IntegrationInput {
            method,
            payload_format_version: Some(
                event
                    .payload_format_version
                    .clone()
                    .unwrap_or_else(|| STRATUS_PAYLOAD_FORMAT_VERSION.clone()),
            ),
            timeout_in_millis: Some(
                event.timeout_in_millis.unwrap_or(*STRATUS_GATEWAY_TIMEOUT_MS),
            ),
        };
        let integration = self
            .gateway
            .create_integration(api_id, function_arn, &input)
            .await?;
        info!("Successfully created the integration.");
        Ok(integration)
    }

    async fn reconcile_route(
        &self,
        api_id: &str,
        event: &TriggerSpec,
        integration_id: &str,
    ) -> Result<()> {
        let method = event
            .method
            .as_deref()
            .unwrap_or(DEFAULT_INTEGRATION_METHOD);
        let route_key = route_key(method, &event.path);

        let routes = self.gateway.get_routes(api_id).await?;
        if routes.iter().any(|route| route.route_key == route_key) {
            return Ok(());
        }

        info!(
            "There is no \"{}\" in the routes, start creating the route automatically.",
            route_key
        );
        self.gateway
            .create_route(api_id, &route_key, &format!("integrations/{}", integration_id))
            .await?;
        info!("Successfully created the route.");
        Ok(())
    }

    async fn reconcile_permission(
        &self,
        function_name: &str,
        function_arn: &str,
        api_id: &str,
        path: &str,
    ) -> Result<()> {
        let statement_id = permission_statement_id(function_name);

        // The statement may not exist yet; revoking first keeps the re-grant
        // idempotent.
        if let Err(e) = self
            .compute
            .remove_permission(function_name, &statement_id)
            .await
        {
            debug!("No permission statement to revoke: {}", e);
        }

        self.compute
            .add_permission(&PermissionGrant {
                function_name: function_name.to_owned(),
                statement_id,
                action: INVOKE_ACTION.to_owned(),
                principal: GATEWAY_PRINCIPAL.to_owned(),
                source_arn: execute_api_source_arn(function_arn, api_id, path)?,
            })
            .await
    }

    async fn remove_api_trigger(
        &self,
        api_name: &str,
        function_name: &str,
    ) -> Result<EventOutcome> {
        let apis = self.gateway.get_apis().await?;
        if let Some(api) = apis.iter().find(|api| api.name == api_name) {
            info!("Start removing API: {}", api_name);
            match self.gateway.delete_api(&api.api_id).await {
                Ok(()) => info!("Successfully removed the API."),
                Err(e) => error!("Delete failed: {}", e),
            }
        }

        info!("Start removing the permission.");
        let statement_id = permission_statement_id(function_name);
        match self
            .compute
            .remove_permission(function_name, &statement_id)
            .await
        {
            Ok(()) | Err(StratusError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let message = "Successfully remove Amazon API Gateway Trigger.".to_string();
        info!("{}", message);
        Ok(EventOutcome::Message { message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{InMemoryCompute, InMemoryGateway};
    use std::sync::atomic::Ordering;

    const FUNCTION_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:hello";

    fn api_event(method: &str, path: &str) -> TriggerSpec {
        TriggerSpec {
            event_type: API_EVENT_TYPE.to_string(),
            method: Some(method.to_string()),
            path: path.to_string(),
            ..Default::default()
        }
    }

    fn events(entries: Vec<(&str, TriggerSpec)>) -> BTreeMap<String, TriggerSpec> {
        entries
            .into_iter()
            .map(|(name, spec)| (name.to_string(), spec))
            .collect()
    }

    #[test]
    fn route_key_uppercases_the_method() {
        assert_eq!("GET /items", route_key("get", "/items"));
        assert_eq!("POST /", route_key("Post", "/"));
    }

    #[test]
    fn statement_id_is_deterministic() {
        assert_eq!(
            permission_statement_id("hello"),
            permission_statement_id("hello")
        );
        assert_ne!(
            permission_statement_id("hello"),
            permission_statement_id("world")
        );
    }

    #[test]
    fn source_arn_parses_partition_fields_from_the_function_arn() -> Result<()> {
        assert_eq!(
            "arn:aws:execute-api:us-east-1:123456789012:api-1/*/*/items",
            execute_api_source_arn(FUNCTION_ARN, "api-1", "/items")?
        );
        assert!(execute_api_source_arn("not-an-arn", "api-1", "/items").is_err());
        Ok(())
    }

    #[tokio::test]
    async fn deploying_twice_creates_each_resource_once() -> Result<()> {
        let compute = InMemoryCompute::default();
        compute.seed_function("hello");
        let gateway = InMemoryGateway::default();
        let reconciler = TriggerReconciler::new(&compute, &gateway);
        let events = events(vec![("hello-api", api_event("get", "/items"))]);

        let first = reconciler.deploy(&events, "hello", FUNCTION_ARN).await?;
        let second = reconciler.deploy(&events, "hello", FUNCTION_ARN).await?;
        assert_eq!(first, second);

        assert_eq!(1, gateway.create_api_calls.load(Ordering::SeqCst));
        assert_eq!(1, gateway.create_integration_calls.load(Ordering::SeqCst));
        assert_eq!(1, gateway.create_route_calls.load(Ordering::SeqCst));
        // The permission is revoked and re-granted with the same statement id
        // on every run.
        assert_eq!(2, compute.add_permission_calls.load(Ordering::SeqCst));
        let statements = compute.statements("hello");
        assert_eq!(vec![permission_statement_id("hello")], statements);
        Ok(())
    }

    #[tokio::test]
    async fn unsupported_event_is_skipped_without_gateway_calls() -> Result<()> {
        let compute = InMemoryCompute::default();
        let gateway = InMemoryGateway::default();
        let reconciler = TriggerReconciler::new(&compute, &gateway);
        let events = events(vec![(
            "nightly",
            TriggerSpec {
                event_type: "Schedule".to_string(),
                ..Default::default()
            },
        )]);

        let outcomes = reconciler.deploy(&events, "hello", FUNCTION_ARN).await?;
        match &outcomes["nightly"] {
            EventOutcome::Message { message } => {
                assert!(message.contains("Schedule"));
                assert!(message.contains("not supported"));
            }
            other => panic!("expected a skip entry, got {:?}", other),
        }
        assert_eq!(0, gateway.create_api_calls.load(Ordering::SeqCst));
        assert_eq!(0, gateway.create_integration_calls.load(Ordering::SeqCst));
        assert_eq!(0, gateway.create_route_calls.load(Ordering::SeqCst));
        assert_eq!(0, compute.add_permission_calls.load(Ordering::SeqCst));
        Ok(())
    }

    #[tokio::test]
    async fn existing_integration_is_updated_in_place() -> Result<()> {
        let compute = InMemoryCompute::default();
        compute.seed_function("hello");
        let gateway = InMemoryGateway::default();
        gateway.seed_api("hello-api", FUNCTION_ARN);
        let reconciler = TriggerReconciler::new(&compute, &gateway);
        let events = events(vec![("hello-api", api_event("get", "/items"))]);

        reconciler.deploy(&events, "hello", FUNCTION_ARN).await?;

        assert_eq!(0, gateway.create_api_calls.load(Ordering::SeqCst));
        assert_eq!(0, gateway.create_integration_calls.load(Ordering::SeqCst));
        assert_eq!(1, gateway.update_integration_calls.load(Ordering::SeqCst));
        // The route did not exist yet.
        assert_eq!(1, gateway.create_route_calls.load(Ordering::SeqCst));
        Ok(())
    }

    #[tokio::test]
    async fn removal_without_the_api_still_revokes_and_succeeds() -> Result<()> {
        let compute = InMemoryCompute::default();
        let gateway = InMemoryGateway::default();
        let reconciler = TriggerReconciler::new(&compute, &gateway);
        let events = events(vec![("hello-api", api_event("get", "/items"))]);

        let outcomes = reconciler.remove(&events, "hello").await?;
        assert_eq!(
            EventOutcome::Message {
                message: "Successfully remove Amazon API Gateway Trigger.".to_string()
            },
            outcomes["hello-api"]
        );
        assert_eq!(1, compute.remove_permission_calls.load(Ordering::SeqCst));
        assert!(gateway.deleted.lock().unwrap().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn removal_deletes_the_api_and_its_chain() -> Result<()> {
        let compute = InMemoryCompute::default();
        compute.seed_function("hello");
        let gateway = InMemoryGateway::default();
        let reconciler = TriggerReconciler::new(&compute, &gateway);
        let events = events(vec![("hello-api", api_event("get", "/items"))]);

        reconciler.deploy(&events, "hello", FUNCTION_ARN).await?;
        let outcomes = reconciler.remove(&events, "hello").await?;

        assert!(matches!(
            outcomes["hello-api"],
            EventOutcome::Message { .. }
        ));
        assert_eq!(1, gateway.deleted.lock().unwrap().len());
        assert!(gateway.apis.lock().unwrap().is_empty());
        Ok(())
    }
}
