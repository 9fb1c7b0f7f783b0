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

//! Configuration settings that affect the whole system.

use ini::Ini;
use lazy_static::lazy_static;
use std::time::Duration;
use uuid::Uuid;

lazy_static! {
    /// Global settings.
    pub static ref STRATUS_CONF: Ini = Ini::load_from_str(include_str!("./config.toml")).unwrap();

    /// The default AWS region when the manifest does not name one.
    pub static ref STRATUS_DEFAULT_REGION: String = STRATUS_CONF["aws"]["region"].to_string();

    /// Sleep inserted between creating an IAM role and the first attempt to
    /// create the function with it, to absorb role propagation latency.
    pub static ref STRATUS_ROLE_PROPAGATION_DELAY: Duration = Duration::from_millis(
        STRATUS_CONF["lambda"]["role_propagation_delay_ms"].parse::<u64>().unwrap()
    );
    /// Sleep between create attempts while the role is not assumable yet.
    pub static ref STRATUS_ROLE_RETRY_INTERVAL: Duration = Duration::from_millis(
        STRATUS_CONF["lambda"]["role_retry_interval_ms"].parse::<u64>().unwrap()
    );
    /// Maximum number of create attempts for a freshly generated role.
    pub static ref STRATUS_ROLE_RETRY_BUDGET: usize =
        STRATUS_CONF["lambda"]["role_retry_budget"].parse::<usize>().unwrap();

    /// Payload format version used when an API event does not specify one.
    pub static ref STRATUS_PAYLOAD_FORMAT_VERSION: String =
        STRATUS_CONF["gateway"]["payload_format_version"].to_string();
    /// Integration timeout used when an API event does not specify one.
    pub static ref STRATUS_GATEWAY_TIMEOUT_MS: i64 =
        STRATUS_CONF["gateway"]["timeout_in_millis"].parse::<i64>().unwrap();
    /// UUIDv5 namespace from which permission statement identifiers are
    /// derived. Stable across runs, which makes permission management
    /// idempotent.
    pub static ref STRATUS_PERMISSION_NAMESPACE: Uuid =
        Uuid::parse_str(&STRATUS_CONF["gateway"]["permission_namespace"]).unwrap();

    /// Directory where the artifact packager drops generated archives.
    pub static ref STRATUS_PACKAGE_CACHE_DIR: String =
        STRATUS_CONF["package"]["cache_dir"].to_string();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;

    #[tokio::test]
    async fn setting_shows() -> Result<()> {
        let conf = Ini::load_from_str(include_str!("./config.toml")).unwrap();

        for (sec, prop) in &conf {
            println!("Section: {:?}", sec);
            for (key, value) in prop.iter() {
                println!("{:?}:{:?}", key, value);
            }
        }

        assert_eq!(
            6000,
            (&conf["lambda"]["role_propagation_delay_ms"])
                .parse::<u64>()
                .unwrap()
        );
        assert_eq!(
            5,
            (&conf["lambda"]["role_retry_budget"])
                .parse::<usize>()
                .unwrap()
        );
        assert_eq!("2.0", &conf["gateway"]["payload_format_version"]);
        assert_eq!(
            "8bbea2bd-3bcf-5055-932f-5b38be2464b1",
            STRATUS_PERMISSION_NAMESPACE.to_string()
        );

        Ok(())
    }
}
