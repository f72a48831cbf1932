use console::style;
use kubeconf::{MergeOutcome, MergeSummary};
use tabular::{row, Table};

/// Prints what the merge did, one line per context that came in.
pub fn print(summary: &MergeSummary) {
    if summary.merged.is_empty() {
        println!("No new kubeconfigs to merge.");
        return;
    }

    println!("Contexts:");
    let mut table = Table::new("{:<} {:<} {:<} {:<} {:<}");
    for file in &summary.merged {
        for outcome in &file.outcomes {
            let name = outcome.name();
            let (cluster, user) = summary
                .config
                .contexts
                .get(name)
                .map(|ctx| (ctx.cluster.as_str(), ctx.user.as_str()))
                .unwrap_or_default();
            let sym = match outcome {
                MergeOutcome::Inserted { .. } | MergeOutcome::Renamed { .. } => '+',
                MergeOutcome::SkippedDuplicate { .. } => ' ',
            };
            table.add_row(row!(
                sym,
                name,
                format!("🖥  {cluster}"),
                format!("🧑 {user}"),
                outcome
            ));
        }
    }
    for line in table.to_string().lines() {
        if line.starts_with('+') {
            println!("{}", style(line).green())
        } else {
            println!("{}", style(line).dim())
        }
    }

    if let Some(backup) = &summary.backup {
        println!("\nPrevious config saved as {}", backup.display());
    }
    if !summary.not_removed.is_empty() {
        println!("\n{}", style("Could not remove:").yellow());
        for (path, err) in &summary.not_removed {
            println!("  {} ({err})", style(path.display()).yellow());
        }
    }
}
