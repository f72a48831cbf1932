use std::path::PathBuf;

use anyhow::Context as _;
use clap::{ArgAction, Parser};
use kubeconf::{ConfigDir, MergeOptions, NamedExtension};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod credentials;
mod linode;
mod provider;
mod report;
mod selection;

use credentials::Credential;
use provider::Provider;
use selection::SelectionStore;

/// Download and integrate Kubernetes configurations across multiple cloud providers.
#[derive(Parser, Debug)]
#[command(name = "kubectm", version, about, long_about = None)]
struct Args {
    /// Reset the stored credentials and prompt for new ones.
    #[arg(long)]
    reset_creds: bool,

    /// Directory holding the kubeconfig [default: ~/.kube]
    #[arg(long, env = "KUBECTM_KUBE_DIR")]
    kube_dir: Option<PathBuf>,

    /// Icon URL attached to every merged context.
    #[arg(long)]
    icon: Option<String>,

    /// Keep a timestamped copy of the previous kubeconfig.
    #[arg(long)]
    backup: bool,

    /// Only merge kubeconfigs already downloaded into the directory.
    #[arg(long)]
    skip_download: bool,

    /// More logging; repeat for more.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "kubectm=info,kubeconf=info",
        1 => "kubectm=debug,kubeconf=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Stored providers, or ask for them when there are none.
fn selected_providers(store: &SelectionStore) -> anyhow::Result<Vec<Provider>> {
    match store.load() {
        Ok(Some(providers)) if !providers.is_empty() => {
            info!("Using previously selected credential providers.");
            return Ok(providers);
        }
        Ok(_) => warn!("No previous credential selections found, prompting user to select credentials."),
        Err(e) => warn!("Could not read previous credential selections ({e:#}), prompting user to select credentials."),
    }

    let creds = credentials::retrieve_all()?;
    let providers: Vec<Provider> = selection::prompt(creds)?
        .into_iter()
        .map(|cred| cred.provider)
        .collect();

    if let Err(e) = store.save(&providers) {
        error!("Failed to save selected providers: {e:#}");
    }
    Ok(providers)
}

fn download(cred: &Credential, dir: &ConfigDir) -> anyhow::Result<()> {
    let Some(source) = cred.provider.source(cred)? else {
        warn!("Provider {} is not supported yet", cred.provider);
        return Ok(());
    };
    info!("Downloading kubeconfig from {}", cred.provider);
    provider::download_all(source.as_ref(), dir)
        .with_context(|| format!("Failed to download kubeconfig files from {}", cred.provider))?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    info!("Starting kubectm...");

    let kube_dir = match args.kube_dir {
        Some(dir) => dir,
        None => kubeconf::kube_dir()?,
    };
    let dir = ConfigDir::open(&kube_dir)
        .with_context(|| format!("Opening {}", kube_dir.display()))?;

    if !args.skip_download {
        let store = SelectionStore::default_location()?;
        if args.reset_creds {
            store.reset().context("Failed to reset stored credentials")?;
            warn!(
                "Stored credentials at {} have been reset. You'll be prompted to select credentials.",
                store.path().display()
            );
        }

        let providers = selected_providers(&store)?;
        let creds = credentials::retrieve_selected(&providers)
            .context("Failed to retrieve selected credentials")?;
        for cred in &creds {
            download(cred, &dir)?;
        }
    }

    let options = MergeOptions {
        extension: args.icon.map(NamedExtension::icon),
        backup: args.backup,
    };
    let summary = dir
        .merge_pending(&options)
        .context("Failed to merge kubeconfig files")?;

    report::print(&summary);
    info!("kubectm finished successfully.");

    Ok(())
}
