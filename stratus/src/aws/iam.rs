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

//! The identity-service façade over AWS IAM.

use crate::error::{Result, StratusError};
use crate::services::IdentityService;
use async_trait::async_trait;
use rusoto_iam::{CreateRoleRequest, Iam, IamClient};

/// AWS IAM wrapper implementing [IdentityService].
pub struct IamService {
    client: IamClient,
}

impl IamService {
    /// Wraps an IAM client.
    pub fn new(client: IamClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IdentityService for IamService {
    async fn create_role(
        &self,
        role_name: &str,
        trust_policy: &str,
        description: &str,
    ) -> Result<String> {
        let response = self
            .client
            .create_role(CreateRoleRequest {
                role_name: role_name.to_owned(),
                assume_role_policy_document: trust_policy.to_owned(),
                description: Some(description.to_owned()),
                ..Default::default()
            })
            .await
            .map_err(|e| StratusError::AWS(e.to_string()))?;
        Ok(response.role.arn)
    }
}
