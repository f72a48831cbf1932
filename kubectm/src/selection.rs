//! Which providers to pull from, remembered between runs.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use dialoguer::{theme::ColorfulTheme, MultiSelect};
use tracing::info;

use crate::credentials::Credential;
use crate::provider::Provider;

pub struct SelectionStore {
    path: PathBuf,
}

impl SelectionStore {
    /// `~/.kubectm/selected_providers.json`
    pub fn default_location() -> anyhow::Result<Self> {
        let home = dirs::home_dir().context("Could not determine the home directory")?;
        Ok(Self::at(home.join(".kubectm").join("selected_providers.json")))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` if nothing has been stored yet.
    pub fn load(&self) -> anyhow::Result<Option<Vec<Provider>>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Reading {}", self.path.display()))
            }
        };
        let providers = serde_json::from_str(&contents)
            .with_context(|| format!("Parsing {}", self.path.display()))?;
        Ok(Some(providers))
    }

    pub fn save(&self, providers: &[Provider]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating {}", parent.display()))?;
        }
        let json = serde_json::to_string(providers)?;
        fs::write(&self.path, json).with_context(|| format!("Writing {}", self.path.display()))
    }

    pub fn reset(&self) -> anyhow::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                Err(e).with_context(|| format!("Removing {}", self.path.display()))
            }
            _ => Ok(()),
        }
    }
}

/// Lets the user pick among several credentials. A single one is used as is.
pub fn prompt(creds: Vec<Credential>) -> anyhow::Result<Vec<Credential>> {
    if creds.len() <= 1 {
        info!("Only one set of credentials found, using it by default.");
        return Ok(creds);
    }

    let options: Vec<String> = creds
        .iter()
        .map(|cred| format!("{} credentials", cred.provider))
        .collect();
    let picked = MultiSelect::with_theme(&ColorfulTheme::default())
        .with_prompt("Multiple credentials found. Please select which ones to use")
        .items(&options)
        .interact()
        .context("Reading selection")?;

    Ok(creds
        .into_iter()
        .enumerate()
        .filter(|(i, _)| picked.contains(i))
        .map(|(_, cred)| cred)
        .collect())
}
