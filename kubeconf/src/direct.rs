//! Wire form of a kubeconfig: the YAML layout kubectl reads and writes, with
//! named lists for clusters, users and contexts.

use std::{collections::BTreeMap, path::PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::*;
use serde_yaml::Value as YamlValue;
use tracing::warn;

/// Keys we don't model, carried through untouched.
pub type Passthrough = BTreeMap<String, YamlValue>;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn decode_base64(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = data.split_whitespace().collect();
    STANDARD.decode(compact)
}

/// Base64 fields must decode, as kubectl requires.
fn base64_data<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let data = Option::<String>::deserialize(deserializer)?;
    if let Some(data) = &data {
        decode_base64(data).map_err(|e| {
            <D::Error as de::Error>::custom(format!("certificate-authority-data is not base64: {e}"))
        })?;
    }
    Ok(data)
}

/// A `{name, <body>}` list entry.
pub trait Named {
    type Body;

    fn into_entry(self) -> (String, Self::Body);
    fn from_entry(name: String, body: Self::Body) -> Self;
}

macro_rules! named {
    ($entry:ident, $field:ident: $body:ty) => {
        impl Named for $entry {
            type Body = $body;

            fn into_entry(self) -> (String, $body) {
                (self.name, self.$field)
            }

            fn from_entry(name: String, $field: $body) -> Self {
                Self { name, $field }
            }
        }
    };
}

// region: Extensions
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NamedExtension {
    pub name: String,
    pub extension: YamlValue,
}

/// Metadata the caller attaches to every context it merges in.
pub type ContextExtension = NamedExtension;

impl NamedExtension {
    pub const ICON: &'static str = "aptakube";

    pub fn new(name: impl Into<String>, extension: YamlValue) -> Self {
        Self {
            name: name.into(),
            extension,
        }
    }

    /// Icon hint understood by desktop kubeconfig browsers.
    pub fn icon(url: impl Into<String>) -> Self {
        let mut body = serde_yaml::Mapping::new();
        body.insert("icon-url".into(), YamlValue::String(url.into()));
        Self::new(Self::ICON, YamlValue::Mapping(body))
    }
}
// endregion

// region: Context
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ContextSpec {
    #[serde(default, deserialize_with = "null_as_default")]
    pub cluster: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub extensions: Vec<NamedExtension>,
    #[serde(flatten)]
    pub other: Passthrough,
}

impl ContextSpec {
    pub fn extension(&self, name: &str) -> Option<&NamedExtension> {
        self.extensions.iter().find(|ext| ext.name == name)
    }

    /// Replaces the extension with the same name, or appends it.
    pub fn set_extension(&mut self, extension: NamedExtension) {
        match self.extensions.iter_mut().find(|ext| ext.name == extension.name) {
            Some(existing) => *existing = extension,
            None => self.extensions.push(extension),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Context {
    pub name: String,
    pub context: ContextSpec,
}

named!(Context, context: ContextSpec);
// endregion

// region: Cluster
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterSpec {
    #[serde(default, deserialize_with = "null_as_default")]
    pub server: String,
    #[serde(
        default,
        deserialize_with = "base64_data",
        skip_serializing_if = "Option::is_none"
    )]
    pub certificate_authority_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_authority: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_skip_tls_verify: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub extensions: Vec<NamedExtension>,
    #[serde(flatten)]
    pub other: Passthrough,
}

impl ClusterSpec {
    /// Decoded CA bytes. Loaded documents always hold valid base64; a value
    /// set in code that doesn't decode is used as raw text.
    pub fn ca_data(&self) -> Vec<u8> {
        let Some(data) = self.certificate_authority_data.as_deref() else {
            return Vec::new();
        };
        decode_base64(data).unwrap_or_else(|e| {
            warn!(
                "certificate-authority-data for {} is not base64 ({e}), comparing it as text",
                self.server
            );
            data.as_bytes().to_vec()
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Cluster {
    pub name: String,
    pub cluster: ClusterSpec,
}

named!(Cluster, cluster: ClusterSpec);
// endregion

// region: User
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct UserSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_certificate: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_certificate_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<YamlValue>,
    #[serde(flatten)]
    pub other: Passthrough,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user: UserSpec,
}

named!(User, user: UserSpec);
// endregion

// region: Common
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub enum ApiVersion {
    #[default]
    #[serde(rename = "v1")]
    V1,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub enum Kind {
    #[default]
    Config,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct KubeConfig {
    #[serde(rename = "apiVersion", default)]
    pub api_version: ApiVersion,
    #[serde(default)]
    pub kind: Kind,
    #[serde(default, deserialize_with = "null_as_default")]
    pub clusters: Vec<Cluster>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contexts: Vec<Context>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub current_context: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub preferences: Passthrough,
    #[serde(default, deserialize_with = "null_as_default")]
    pub users: Vec<User>,
    /// Top-level keys such as `extensions`.
    #[serde(flatten)]
    pub other: Passthrough,
}

impl KubeConfig {
    /// Parses a kubeconfig document. A blank document is an empty config.
    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
// endregion
