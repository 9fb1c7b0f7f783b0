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

//! The compute-service façade over AWS Lambda.

use crate::error::{Result, StratusError};
use crate::manifest::FunctionSpec;
use crate::services::{ComputeService, FunctionDescriptor, PermissionGrant};
use async_trait::async_trait;
use bytes::Bytes;
use rusoto_core::RusotoError;
use rusoto_lambda::{
    AddPermissionRequest, CreateFunctionError, CreateFunctionRequest, DeleteFunctionError,
    DeleteFunctionRequest, Environment, FunctionCode, FunctionConfiguration, GetFunctionError,
    GetFunctionRequest, Lambda, LambdaClient, RemovePermissionError, RemovePermissionRequest,
    UpdateFunctionCodeRequest, UpdateFunctionConfigurationRequest,
};

/// The exact message Lambda returns while a freshly created role has not
/// propagated. Compared verbatim; anything else is a generic service error.
pub const ROLE_NOT_ASSUMABLE_MESSAGE: &str =
    "The role defined for the function cannot be assumed by Lambda.";

/// AWS Lambda wrapper implementing [ComputeService].
pub struct LambdaService {
    client: LambdaClient,
}

impl LambdaService {
    /// Wraps a Lambda client.
    pub fn new(client: LambdaClient) -> Self {
        Self { client }
    }
}

fn from_configuration(conf: FunctionConfiguration) -> Result<FunctionDescriptor> {
    Ok(FunctionDescriptor {
        name: conf
            .function_name
            .ok_or_else(|| StratusError::AWS("No function name!".to_string()))?,
        arn: conf
            .function_arn
            .ok_or_else(|| StratusError::AWS("No function ARN!".to_string()))?,
        role: conf.role,
    })
}

#[async_trait]
impl ComputeService for LambdaService {
    async fn get_function(&self, name: &str) -> Result<FunctionDescriptor> {
        let response = self
            .client
            .get_function(GetFunctionRequest {
                function_name: name.to_owned(),
                ..Default::default()
            })
            .await
            .map_err(|e| match e {
                RusotoError::Service(GetFunctionError::ResourceNotFound(msg)) => {
                    StratusError::NotFound(msg)
                }
                other => StratusError::AWS(other.to_string()),
            })?;

        from_configuration(
            response
                .configuration
                .ok_or_else(|| StratusError::AWS("No function configuration!".to_string()))?,
        )
    }

    async fn create_function(
        &self,
        spec: &FunctionSpec,
        role: &str,
        code: Bytes,
    ) -> Result<FunctionDescriptor> {
        let request = CreateFunctionRequest {
            function_name: spec.function_name.clone(),
            role: role.to_owned(),
            runtime: spec.runtime.clone(),
            handler: spec.handler.clone(),
            memory_size: spec.memory_size,
            timeout: spec.timeout,
            environment: spec.environment.clone().map(|variables| Environment {
                variables: Some(variables),
            }),
            tags: spec.tags.clone(),
            code: FunctionCode {
                zip_file: Some(code),
                ..Default::default()
            },
            ..Default::default()
        };

        let conf = self
            .client
            .create_function(request)
            .await
            .map_err(|e| match e {
                RusotoError::Service(CreateFunctionError::InvalidParameterValue(msg))
                    if msg == ROLE_NOT_ASSUMABLE_MESSAGE =>
                {
                    StratusError::RoleNotAssumable(msg)
                }
                other => StratusError::AWS(other.to_string()),
            })?;
        from_configuration(conf)
    }

    async fn update_function_code(&self, name: &str, code: Bytes) -> Result<FunctionDescriptor> {
        let conf = self
            .client
            .update_function_code(UpdateFunctionCodeRequest {
                function_name: name.to_owned(),
                zip_file: Some(code),
                ..Default::default()
            })
            .await
            .map_err(|e| StratusError::AWS(e.to_string()))?;
        from_configuration(conf)
    }

    async fn update_function_configuration(
        &self,
        spec: &FunctionSpec,
    ) -> Result<FunctionDescriptor> {
        let conf = self
            .client
            .update_function_configuration(UpdateFunctionConfigurationRequest {
                function_name: spec.function_name.clone(),
                runtime: spec.runtime.clone(),
                handler: spec.handler.clone(),
                memory_size: spec.memory_size,
                timeout: spec.timeout,
                role: spec.role.clone(),
                environment: spec.environment.clone().map(|variables| Environment {
                    variables: Some(variables),
                }),
                ..Default::default()
            })
            .await
            .map_err(|e| StratusError::AWS(e.to_string()))?;
        from_configuration(conf)
    }

    async fn delete_function(&self, name: &str) -> Result<()> {
        self.client
            .delete_function(DeleteFunctionRequest {
                function_name: name.to_owned(),
                ..Default::default()
            })
            .await
            .map_err(|e| match e {
                RusotoError::Service(DeleteFunctionError::ResourceNotFound(msg)) => {
                    StratusError::NotFound(msg)
                }
                other => StratusError::AWS(other.to_string()),
            })
    }

    async fn add_permission(&self, grant: &PermissionGrant) -> Result<()> {
        self.client
            .add_permission(AddPermissionRequest {
                function_name: grant.function_name.clone(),
                statement_id: grant.statement_id.clone(),
                action: grant.action.clone(),
                principal: grant.principal.clone(),
                source_arn: Some(grant.source_arn.clone()),
                ..Default::default()
            })
            .await
            .map_err(|e| StratusError::AWS(e.to_string()))?;
        Ok(())
    }

    async fn remove_permission(&self, function_name: &str, statement_id: &str) -> Result<()> {
        self.client
            .remove_permission(RemovePermissionRequest {
                function_name: function_name.to_owned(),
                statement_id: statement_id.to_owned(),
                ..Default::default()
            })
            .await
            .map_err(|e| match e {
                RusotoError::Service(RemovePermissionError::ResourceNotFound(msg)) => {
                    StratusError::NotFound(msg)
                }
                other => StratusError::AWS(other.to_string()),
            })
    }
}
