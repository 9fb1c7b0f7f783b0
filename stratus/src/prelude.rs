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

//! A "prelude" for users of the Stratus crate.

pub use crate::aws::client::AwsClients;
pub use crate::deploy::trigger::{EventOutcome, ReconciliationResult};
pub use crate::deploy::{DeployOutput, Deployer, FunctionSummary, RemoveOutput};
pub use crate::error::{Result, StratusError};
pub use crate::manifest::{Credentials, FunctionSpec, Manifest, TriggerSpec, API_EVENT_TYPE};
pub use crate::package::{Packager, ZipPackager};
pub use crate::services::{ComputeService, GatewayService, IdentityService};
