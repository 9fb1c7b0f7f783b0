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

#![warn(missing_docs, clippy::needless_borrow)]
#![allow(clippy::module_inception, clippy::upper_case_acronyms)]

//! Stratus deploys an AWS Lambda function together with its HTTP API trigger,
//! declaratively and idempotently. Re-running a deployment converges the
//! remote resources to the manifest instead of duplicating them, and a remove
//! tears the trigger chain and the function down again.

pub mod aws;
pub mod config;
pub mod deploy;
pub mod error;
pub mod manifest;
pub mod package;
pub mod prelude;
pub mod services;
pub mod test_util;
