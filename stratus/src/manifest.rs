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

//! The deployment manifest and its normalization.
//!
//! The on-disk manifest mirrors the YAML layout users write: PascalCase keys,
//! environment variables and tags as arrays of `{Key, Value}` pairs, events as
//! a list. Normalization is a pure transform into the structures the
//! reconcilers consume: key-unique maps and events keyed by name. The raw
//! structures are never mutated in place.

use crate::config::STRATUS_DEFAULT_REGION;
use crate::error::Result;
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// Static AWS credentials taken from the manifest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    /// The AWS access key ID.
    #[serde(rename = "AccessKeyID", default)]
    pub access_key_id: String,
    /// The AWS secret access key.
    #[serde(rename = "SecretAccessKey", default)]
    pub secret_access_key: String,
}

#[derive(Debug, Clone, Deserialize)]
struct KeyValue {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "Value")]
    value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawEnvironment {
    #[serde(rename = "Variables", default)]
    variables: Vec<KeyValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawFunction {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Code")]
    code: Option<String>,
    #[serde(rename = "Runtime")]
    runtime: Option<String>,
    #[serde(rename = "Handler")]
    handler: Option<String>,
    #[serde(rename = "MemorySize")]
    memory_size: Option<i64>,
    #[serde(rename = "Timeout")]
    timeout: Option<i64>,
    #[serde(rename = "Role")]
    role: Option<String>,
    #[serde(rename = "Environment")]
    environment: Option<RawEnvironment>,
    #[serde(rename = "Tags")]
    tags: Option<Vec<KeyValue>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawEventProperties {
    #[serde(rename = "Method")]
    method: Option<String>,
    #[serde(rename = "Path")]
    path: Option<String>,
    #[serde(rename = "PayloadFormatVersion")]
    payload_format_version: Option<String>,
    #[serde(rename = "TimeoutInMillis")]
    timeout_in_millis: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawEvent {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Type")]
    event_type: String,
    #[serde(rename = "Properties", default)]
    properties: RawEventProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawProperties {
    #[serde(rename = "Region")]
    region: Option<String>,
    #[serde(rename = "Function", default)]
    function: RawFunction,
    #[serde(rename = "Events", default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawManifest {
    #[serde(rename = "Credentials", default)]
    credentials: Credentials,
    #[serde(rename = "Properties", default)]
    properties: RawProperties,
}

/// The desired state of the compute function. One remote function resource
/// exists per name; the function reconciler owns its lifecycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionSpec {
    /// The unique function name.
    pub function_name: String,
    /// The code location: either a source directory to package, or a
    /// pre-built `.zip`/`.jar`/`.war` archive.
    pub code: String,
    /// The Lambda runtime identifier, e.g. `nodejs12.x`.
    pub runtime: Option<String>,
    /// The handler entry point within the code artifact.
    pub handler: Option<String>,
    /// Memory size in MB.
    pub memory_size: Option<i64>,
    /// Execution timeout in seconds.
    pub timeout: Option<i64>,
    /// Environment variables, key-unique.
    pub environment: Option<HashMap<String, String>>,
    /// Resource tags, key-unique.
    pub tags: Option<HashMap<String, String>>,
    /// The execution role ARN. When absent, the function reconciler
    /// synthesizes one and the caller persists it for future runs.
    pub role: Option<String>,
}

/// A single trigger definition, read-only input to the trigger reconciler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerSpec {
    /// The event type tag. Only [`API_EVENT_TYPE`] is implemented; other
    /// types are recognized but skipped.
    pub event_type: String,
    /// The HTTP method. Defaults to `post` during reconciliation.
    pub method: Option<String>,
    /// The route path, e.g. `/items`.
    pub path: String,
    /// The gateway payload format version, defaulting to `2.0`.
    pub payload_format_version: Option<String>,
    /// The integration timeout in milliseconds, defaulting to 30000.
    pub timeout_in_millis: Option<i64>,
}

/// The event type implemented by the trigger reconciler.
pub const API_EVENT_TYPE: &str = "Api";

/// The normalized manifest consumed by the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    /// The AWS credentials.
    pub credentials: Credentials,
    /// The AWS region name.
    pub region: String,
    /// The function spec.
    pub function: FunctionSpec,
    /// The triggers, keyed by their manifest-unique event name.
    pub events: BTreeMap<String, TriggerSpec>,
}

impl Manifest {
    /// Parses a YAML manifest and normalizes it.
    pub fn from_yaml(text: &str) -> Result<Manifest> {
        let raw: RawManifest = serde_yaml::from_str(text)?;
        Ok(normalize(raw))
    }

    /// Reads and parses the manifest at `path`.
    pub fn from_file(path: &Path) -> Result<Manifest> {
        Manifest::from_yaml(&fs::read_to_string(path)?)
    }
}

fn flatten(pairs: Vec<KeyValue>) -> HashMap<String, String> {
    pairs.into_iter().map(|kv| (kv.key, kv.value)).collect()
}

fn normalize(raw: RawManifest) -> Manifest {
    let function = FunctionSpec {
        function_name: raw.properties.function.name.unwrap_or_default(),
        code: raw.properties.function.code.unwrap_or_default(),
        runtime: raw.properties.function.runtime,
        handler: raw.properties.function.handler,
        memory_size: raw.properties.function.memory_size,
        timeout: raw.properties.function.timeout,
        environment: raw
            .properties
            .function
            .environment
            .map(|env| flatten(env.variables)),
        tags: raw.properties.function.tags.map(flatten),
        role: raw.properties.function.role,
    };

    let events = raw
        .properties
        .events
        .into_iter()
        .map(|event| {
            (
                event.name,
                TriggerSpec {
                    event_type: event.event_type,
                    method: event.properties.method,
                    path: event.properties.path.unwrap_or_default(),
                    payload_format_version: event.properties.payload_format_version,
                    timeout_in_millis: event.properties.timeout_in_millis,
                },
            )
        })
        .collect();

    Manifest {
        credentials: raw.credentials,
        region: raw
            .properties
            .region
            .unwrap_or_else(|| STRATUS_DEFAULT_REGION.clone()),
        function,
        events,
    }
}

/// Writes a synthesized role ARN back into the stored manifest, but only when
/// the manifest does not carry one already. The role is never deleted by the
/// engine, so persisting it makes future deploys reuse it instead of
/// generating a new one.
pub fn persist_role(path: &Path, role_arn: &str) -> Result<()> {
    let text = fs::read_to_string(path)?;
    let mut doc: Value = serde_yaml::from_str(&text)?;

    let function = doc
        .get_mut("Properties")
        .and_then(|properties| properties.get_mut("Function"));
    if let Some(Value::Mapping(function)) = function {
        let key = Value::String("Role".to_string());
        if !function.contains_key(&key) {
            function.insert(key, Value::String(role_arn.to_string()));
            fs::write(path, serde_yaml::to_string(&doc)?)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
Credentials:
  AccessKeyID: AKIAEXAMPLE
  SecretAccessKey: secret
Properties:
  Region: us-west-2
  Function:
    Name: hello
    Code: ./src
    Handler: index.handler
    Runtime: nodejs12.x
    MemorySize: 128
    Timeout: 30
    Environment:
      Variables:
        - Key: STAGE
          Value: prod
        - Key: DEBUG
          Value: "0"
    Tags:
      - Key: team
        Value: core
  Events:
    - Name: hello-api
      Type: Api
      Properties:
        Method: get
        Path: /items
    - Name: nightly
      Type: Schedule
"#;

    #[test]
    fn normalizes_pairs_into_maps() -> Result<()> {
        let manifest = Manifest::from_yaml(MANIFEST)?;
        assert_eq!("hello", manifest.function.function_name);
        assert_eq!("us-west-2", manifest.region);

        let env = manifest.function.environment.unwrap();
        assert_eq!(2, env.len());
        assert_eq!("prod", env["STAGE"]);
        assert_eq!("0", env["DEBUG"]);

        let tags = manifest.function.tags.unwrap();
        assert_eq!("core", tags["team"]);
        Ok(())
    }

    #[test]
    fn events_are_keyed_by_name() -> Result<()> {
        let manifest = Manifest::from_yaml(MANIFEST)?;
        assert_eq!(2, manifest.events.len());

        let api = &manifest.events["hello-api"];
        assert_eq!(API_EVENT_TYPE, api.event_type);
        assert_eq!(Some("get".to_string()), api.method);
        assert_eq!("/items", api.path);

        assert_eq!("Schedule", manifest.events["nightly"].event_type);
        Ok(())
    }

    #[test]
    fn region_defaults_when_missing() -> Result<()> {
        let manifest = Manifest::from_yaml("Credentials:\n  AccessKeyID: a\n")?;
        assert_eq!(*crate::config::STRATUS_DEFAULT_REGION, manifest.region);
        Ok(())
    }

    #[test]
    fn persist_role_only_fills_missing_role() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("s.yaml");
        fs::write(&path, MANIFEST)?;

        persist_role(&path, "arn:aws:iam::123456789012:role/s-hello-role-abcd1234")?;
        let manifest = Manifest::from_file(&path)?;
        assert_eq!(
            Some("arn:aws:iam::123456789012:role/s-hello-role-abcd1234".to_string()),
            manifest.function.role
        );

        // A second persist must not overwrite the recorded role.
        persist_role(&path, "arn:aws:iam::123456789012:role/other")?;
        let manifest = Manifest::from_file(&path)?;
        assert_eq!(
            Some("arn:aws:iam::123456789012:role/s-hello-role-abcd1234".to_string()),
            manifest.function.role
        );
        Ok(())
    }
}
