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

//! Stratus error types

use std::error;
use std::fmt::{Display, Formatter};
use std::io;
use std::result;

/// Result type for operations that could result in an [StratusError]
pub type Result<T> = result::Result<T, StratusError>;

/// Stratus error
#[derive(Debug)]
pub enum StratusError {
    /// Error returned when the manifest is missing a mandatory field, such as
    /// the credentials or the function name. Raised before any remote call.
    Validation(String),
    /// Error returned when a remote resource does not exist. The function
    /// reconciler treats it as the signal to take the create path.
    NotFound(String),
    /// Error returned when a freshly created IAM role has not propagated yet
    /// and Lambda refuses to assume it. Retried up to a bounded budget.
    RoleNotAssumable(String),
    /// Error returned when accessing the AWS services fails in any other way.
    /// The original message is preserved verbatim.
    AWS(String),
    /// Error associated to I/O operations and associated traits.
    IoError(io::Error),
    /// Error returned when serde_json failed to serialize or deserialize data.
    SerdeJson(serde_json::Error),
    /// Error returned when the YAML manifest cannot be parsed or rewritten.
    Yaml(serde_yaml::Error),
    /// Error returned when the artifact packager fails to build the archive.
    Zip(zip::result::ZipError),
    /// Error returned as a consequence of an error in Stratus.
    /// This error should not happen in normal usage of Stratus.
    Internal(String),
}

impl From<io::Error> for StratusError {
    fn from(e: io::Error) -> Self {
        StratusError::IoError(e)
    }
}

impl From<serde_json::Error> for StratusError {
    fn from(e: serde_json::Error) -> Self {
        StratusError::SerdeJson(e)
    }
}

impl From<serde_yaml::Error> for StratusError {
    fn from(e: serde_yaml::Error) -> Self {
        StratusError::Yaml(e)
    }
}

impl From<zip::result::ZipError> for StratusError {
    fn from(e: zip::result::ZipError) -> Self {
        StratusError::Zip(e)
    }
}

impl From<&str> for StratusError {
    fn from(e: &str) -> Self {
        StratusError::Internal(e.to_string())
    }
}

impl Display for StratusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            StratusError::Validation(ref desc) => write!(f, "Validation error: {}", desc),
            StratusError::NotFound(ref desc) => write!(f, "Resource not found: {}", desc),
            StratusError::RoleNotAssumable(ref desc) => {
                write!(f, "Role not assumable yet: {}", desc)
            }
            StratusError::AWS(ref desc) => write!(f, "AWS error: {}", desc),
            StratusError::IoError(ref desc) => write!(f, "IO error: {}", desc),
            StratusError::SerdeJson(ref desc) => write!(f, "serde_json error: {:?}", desc),
            StratusError::Yaml(ref desc) => write!(f, "YAML error: {}", desc),
            StratusError::Zip(ref desc) => write!(f, "Zip error: {}", desc),
            StratusError::Internal(ref desc) => write!(
                f,
                "Internal error: {}. This was likely caused by a bug in Stratus' \
                    code and we would welcome that you file an bug report in our issue tracker",
                desc
            ),
        }
    }
}

impl error::Error for StratusError {}
