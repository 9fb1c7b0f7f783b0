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

//! Construction of the per-region AWS service clients.
//!
//! The clients are an explicit struct of capability handles passed into the
//! deployer, never ambient global state.

use crate::error::{Result, StratusError};
use crate::manifest::Credentials;
use rusoto_apigatewayv2::ApiGatewayV2Client;
use rusoto_core::credential::StaticProvider;
use rusoto_core::{HttpClient, Region};
use rusoto_iam::IamClient;
use rusoto_lambda::LambdaClient;
use std::str::FromStr;

/// The authenticated per-region service clients consumed by the façades.
pub struct AwsClients {
    /// The compute-service client.
    pub lambda: LambdaClient,
    /// The identity-service client.
    pub iam: IamClient,
    /// The gateway-service client.
    pub gateway: ApiGatewayV2Client,
}

impl AwsClients {
    /// Builds the three service clients from static credentials and a region
    /// name. An unknown region name is a validation error.
    pub fn new(credentials: &Credentials, region: &str) -> Result<AwsClients> {
        let region = Region::from_str(region).map_err(|e| StratusError::Validation(e.to_string()))?;
        let provider = StaticProvider::new_minimal(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
        );

        Ok(AwsClients {
            lambda: LambdaClient::new_with(dispatcher()?, provider.clone(), region.clone()),
            iam: IamClient::new_with(dispatcher()?, provider.clone(), region.clone()),
            gateway: ApiGatewayV2Client::new_with(dispatcher()?, provider, region),
        })
    }
}

fn dispatcher() -> Result<HttpClient> {
    HttpClient::new().map_err(|e| StratusError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_region() {
        let credentials = Credentials {
            access_key_id: "AKIAEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
        };
        let result = AwsClients::new(&credentials, "narnia-north-1");
        assert!(matches!(result, Err(StratusError::Validation(_))));
    }

    #[test]
    fn builds_clients_for_known_region() {
        let credentials = Credentials {
            access_key_id: "AKIAEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
        };
        assert!(AwsClients::new(&credentials, "us-east-1").is_ok());
    }
}
