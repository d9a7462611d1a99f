//! Encoding and decoding of the raw provider spec and status
//!
//! The codec is built once by the process and handed to every machine scope.
//! It carries the apiVersion/kind pairs it accepts; nothing is registered in
//! global state.

use serde_json::Value;

use super::machine::ProviderSpec;
use super::provider::AlibabaCloudMachineProviderConfig;
use super::status::AlibabaCloudMachineProviderStatus;
use crate::{Error, Result};

/// API version of the provider config and status objects
pub const PROVIDER_API_VERSION: &str = "machine.openshift.io/v1";
/// Kind of the provider config object
pub const PROVIDER_CONFIG_KIND: &str = "AlibabaCloudMachineProviderConfig";
/// Kind of the provider status object
pub const PROVIDER_STATUS_KIND: &str = "AlibabaCloudMachineProviderStatus";

/// apiVersion/kind pair
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeKey {
    /// API version (e.g. "machine.openshift.io/v1")
    pub api_version: String,
    /// Kind
    pub kind: String,
}

impl TypeKey {
    /// Create a key
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }

    fn matches(&self, api_version: Option<&str>, kind: Option<&str>) -> bool {
        api_version.is_none_or(|v| v == self.api_version) && kind.is_none_or(|k| k == self.kind)
    }
}

/// Converts between raw JSON and typed provider objects
#[derive(Clone, Debug)]
pub struct ProviderSpecCodec {
    config_types: Vec<TypeKey>,
    status_type: TypeKey,
}

impl Default for ProviderSpecCodec {
    fn default() -> Self {
        Self::new(
            vec![TypeKey::new(PROVIDER_API_VERSION, PROVIDER_CONFIG_KIND)],
            TypeKey::new(PROVIDER_API_VERSION, PROVIDER_STATUS_KIND),
        )
    }
}

impl ProviderSpecCodec {
    /// Codec accepting `config_types` for the spec and writing `status_type` for the status
    pub fn new(config_types: Vec<TypeKey>, status_type: TypeKey) -> Self {
        Self {
            config_types,
            status_type,
        }
    }

    /// Decode `spec.providerSpec`.
    ///
    /// A missing value, an unknown apiVersion/kind or a malformed body is an error.
    /// Absent apiVersion/kind fields are accepted.
    pub fn decode_provider_spec(
        &self,
        spec: &ProviderSpec,
    ) -> Result<AlibabaCloudMachineProviderConfig> {
        let value = spec.value.as_ref().ok_or_else(|| {
            Error::serialization_for_kind(PROVIDER_CONFIG_KIND, "no value in providerSpec")
        })?;

        let (api_version, kind) = type_meta(value);
        if !self
            .config_types
            .iter()
            .any(|t| t.matches(api_version, kind))
        {
            return Err(Error::serialization_for_kind(
                PROVIDER_CONFIG_KIND,
                format!(
                    "unsupported provider spec type {}/{}",
                    api_version.unwrap_or_default(),
                    kind.unwrap_or_default()
                ),
            ));
        }

        serde_json::from_value(value.clone()).map_err(|e| {
            Error::serialization_for_kind(
                PROVIDER_CONFIG_KIND,
                format!("error unmarshalling providerSpec: {e}"),
            )
        })
    }

    /// Encode a provider config, stamping apiVersion/kind when absent.
    ///
    /// The first accepted config type is stamped, or the built-in config type
    /// when none is registered.
    pub fn encode_provider_spec(
        &self,
        config: &AlibabaCloudMachineProviderConfig,
    ) -> Result<ProviderSpec> {
        let (api_version, kind) = match self.config_types.first() {
            Some(t) => (t.api_version.as_str(), t.kind.as_str()),
            None => (PROVIDER_API_VERSION, PROVIDER_CONFIG_KIND),
        };
        let mut config = config.clone();
        config
            .api_version
            .get_or_insert_with(|| api_version.to_string());
        config.kind.get_or_insert_with(|| kind.to_string());
        Ok(ProviderSpec {
            value: Some(serde_json::to_value(&config)?),
        })
    }

    /// Decode `status.providerStatus`; absent means empty
    pub fn decode_provider_status(
        &self,
        raw: Option<&Value>,
    ) -> Result<AlibabaCloudMachineProviderStatus> {
        let Some(value) = raw else {
            return Ok(AlibabaCloudMachineProviderStatus::default());
        };
        if value.is_null() {
            return Ok(AlibabaCloudMachineProviderStatus::default());
        }
        serde_json::from_value(value.clone()).map_err(|e| {
            Error::serialization_for_kind(
                PROVIDER_STATUS_KIND,
                format!("error unmarshalling providerStatus: {e}"),
            )
        })
    }

    /// Encode a provider status with this codec's apiVersion/kind
    pub fn encode_provider_status(
        &self,
        status: &AlibabaCloudMachineProviderStatus,
    ) -> Result<Value> {
        let mut status = status.clone();
        status.api_version = Some(self.status_type.api_version.clone());
        status.kind = Some(self.status_type.kind.clone());
        Ok(serde_json::to_value(&status)?)
    }
}

fn type_meta(value: &Value) -> (Option<&str>, Option<&str>) {
    (
        value.get("apiVersion").and_then(Value::as_str),
        value.get("kind").and_then(Value::as_str),
    )
}
