//! Cloud credentials found in the environment.

use std::{collections::BTreeMap, fmt};

use anyhow::bail;
use tracing::{info, warn};

use crate::provider::Provider;

pub const LINODE_TOKEN: &str = "AccessToken";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub provider: Provider,
    pub details: BTreeMap<String, String>,
}

impl Credential {
    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(String::as_str)
    }
}

/// Shows the provider and obfuscated details; never the secrets themselves.
impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.provider)?;
        for (i, (key, value)) in self.details.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{key}: {}", obfuscate(value))?;
        }
        write!(f, " }}")
    }
}

/// Keeps the first and last four characters. Short values are fully masked.
pub fn obfuscate(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 8))
}

struct Detail {
    key: &'static str,
    /// Tried in order; the first one set wins.
    vars: &'static [&'static str],
    required: bool,
}

const fn required(key: &'static str, vars: &'static [&'static str]) -> Detail {
    Detail {
        key,
        vars,
        required: true,
    }
}

const fn optional(key: &'static str, vars: &'static [&'static str]) -> Detail {
    Detail {
        key,
        vars,
        required: false,
    }
}

fn details_for(provider: Provider) -> &'static [Detail] {
    const LINODE: &[Detail] = &[required(LINODE_TOKEN, &["LINODE_ACCESS_TOKEN", "LINODE_TOKEN"])];
    const AWS: &[Detail] = &[
        required("AccessKey", &["AWS_ACCESS_KEY_ID"]),
        required("SecretKey", &["AWS_SECRET_ACCESS_KEY"]),
        optional("SessionToken", &["AWS_SESSION_TOKEN"]),
        optional("Region", &["AWS_DEFAULT_REGION", "AWS_REGION"]),
    ];
    const AZURE: &[Detail] = &[
        required("ClientID", &["AZURE_CLIENT_ID"]),
        required("ClientSecret", &["AZURE_CLIENT_SECRET"]),
        required("TenantID", &["AZURE_TENANT_ID"]),
        optional("SubscriptionID", &["AZURE_SUBSCRIPTION_ID"]),
    ];
    const GCP: &[Detail] = &[
        required("ApplicationCredentials", &["GOOGLE_APPLICATION_CREDENTIALS"]),
        optional("Project", &["GOOGLE_CLOUD_PROJECT", "CLOUDSDK_CORE_PROJECT"]),
    ];

    match provider {
        Provider::Linode => LINODE,
        Provider::Aws => AWS,
        Provider::Azure => AZURE,
        Provider::Gcp => GCP,
    }
}

/// Looks up `provider`'s credentials through `env`. `None` unless every
/// required detail is present.
pub fn discover(provider: Provider, env: impl Fn(&str) -> Option<String>) -> Option<Credential> {
    let mut details = BTreeMap::new();
    for detail in details_for(provider) {
        let value = detail
            .vars
            .iter()
            .filter_map(|var| env(var))
            .find(|value| !value.is_empty());
        match value {
            Some(value) => {
                details.insert(detail.key.to_owned(), value);
            }
            None if detail.required => return None,
            None => {}
        }
    }
    Some(Credential { provider, details })
}

fn from_env(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

/// Every provider with credentials in the environment.
pub fn retrieve_all() -> anyhow::Result<Vec<Credential>> {
    let found: Vec<_> = Provider::ALL
        .into_iter()
        .filter_map(|provider| discover(provider, from_env))
        .inspect(|cred| info!("{} credentials found: {cred}", cred.provider))
        .collect();
    if found.is_empty() {
        bail!("no credentials found");
    }
    Ok(found)
}

/// Credentials for the given providers. Providers without credentials are
/// skipped with a warning.
pub fn retrieve_selected(selected: &[Provider]) -> anyhow::Result<Vec<Credential>> {
    let mut found = Vec::with_capacity(selected.len());
    for &provider in selected {
        match discover(provider, from_env) {
            Some(cred) => {
                info!("{provider} credentials found: {cred}");
                found.push(cred);
            }
            None => warn!("{provider} was selected but no credentials were found"),
        }
    }
    if found.is_empty() {
        bail!("no credentials found for the selected providers");
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn obfuscation() {
        assert_eq!(obfuscate("abcdefghijkl"), "abcd****ijkl");
        assert_eq!(obfuscate("abcdefgh"), "********");
        assert_eq!(obfuscate(""), "");
    }

    #[test]
    fn linode_token_from_either_variable() {
        let cred = discover(Provider::Linode, env(&[("LINODE_TOKEN", "tok")])).unwrap();
        assert_eq!(cred.detail(LINODE_TOKEN), Some("tok"));

        let cred = discover(
            Provider::Linode,
            env(&[("LINODE_TOKEN", "second"), ("LINODE_ACCESS_TOKEN", "first")]),
        )
        .unwrap();
        assert_eq!(cred.detail(LINODE_TOKEN), Some("first"));
    }

    #[test]
    fn empty_values_do_not_count() {
        assert!(discover(Provider::Linode, env(&[("LINODE_ACCESS_TOKEN", "")])).is_none());
    }

    #[test]
    fn aws_needs_both_keys() {
        assert!(discover(Provider::Aws, env(&[("AWS_ACCESS_KEY_ID", "AKIA")])).is_none());

        let cred = discover(
            Provider::Aws,
            env(&[
                ("AWS_ACCESS_KEY_ID", "AKIA"),
                ("AWS_SECRET_ACCESS_KEY", "secret"),
                ("AWS_REGION", "eu-west-1"),
            ]),
        )
        .unwrap();
        assert_eq!(cred.detail("Region"), Some("eu-west-1"));
        assert_eq!(cred.detail("SessionToken"), None);
    }

    #[test]
    fn display_hides_secrets() {
        let cred = discover(
            Provider::Linode,
            env(&[("LINODE_ACCESS_TOKEN", "0123456789abcdef")]),
        )
        .unwrap();
        assert_eq!(cred.to_string(), "Linode { AccessToken: 0123********cdef }");
    }
}
