//! Deploy command - publish a build directory to the pages branch

use std::path::{Path, PathBuf};

use clap::Args;
use jwalk::WalkDir;
use pagesmith_core::{
    channel, Artifact, CliOverrides, Config, DeployReport, DeployStatus, Deployer, GitRepo,
    RemoteUrl,
};

/// Capacity of the artifact channel between the directory walker and the collector
const CHANNEL_CAPACITY: usize = 64;

/// Arguments for the deploy command
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Directory holding the build output
    #[arg(required = true)]
    pub dir: PathBuf,

    /// Repository to publish to (URL, path or owner/repo)
    #[arg(short, long)]
    pub remote: Option<String>,

    /// Name to register the remote under
    #[arg(long)]
    pub origin: Option<String>,

    /// Branch to publish to
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Keep the working copy here between runs
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Commit but do not push
    #[arg(long)]
    pub no_push: bool,

    /// Commit message, `[timestamp]` is replaced by the commit time
    #[arg(short, long)]
    pub message: Option<String>,

    /// Also publish files matched by .gitignore rules
    #[arg(long)]
    pub force: bool,

    /// Print the deployment report as JSON
    #[arg(long)]
    pub json: bool,
}

impl DeployArgs {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            remote_url: self.remote.clone(),
            origin: self.origin.clone(),
            branch: self.branch.clone(),
            cache_dir: self.cache_dir.clone(),
            no_push: self.no_push,
            message: self.message.clone(),
            force: self.force,
        }
    }

    /// Execute the deploy command
    pub async fn execute(&self, verbose: bool, config_path: Option<&Path>) -> anyhow::Result<()> {
        if !self.dir.is_dir() {
            anyhow::bail!("{} is not a directory", self.dir.display());
        }

        let mut config = Config::load_with_overrides(config_path, self.overrides())?;

        // Fall back to the remote of the repository we are run from
        if config.deploy.remote_url.is_none() {
            let cwd = std::env::current_dir()?;
            match GitRepo::discover_remote_url(&cwd, &config.deploy.origin) {
                Ok(url) => {
                    tracing::info!(remote = %url, "Using remote of current repository");
                    config.deploy.remote_url = Some(url);
                }
                Err(e) => tracing::debug!(error = %e, "No remote found in current directory"),
            }
        }

        let mut options = config.to_options()?;
        let remote = RemoteUrl::parse(&options.remote_url)?;
        options.remote_url = remote.clone_url.clone();

        if verbose {
            tracing::info!(
                remote = %remote,
                origin = %options.origin,
                branch = %options.branch,
                cache_dir = ?options.cache_dir,
                push = options.push,
                "Deploy configuration"
            );
        }

        let artifacts = collect_artifacts(self.dir.clone()).await?;
        tracing::info!(files = artifacts.len(), dir = %self.dir.display(), "Collected artifacts");

        let report =
            tokio::task::spawn_blocking(move || Deployer::git(options).deploy(&artifacts))
                .await??;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report, &remote);
        }

        Ok(())
    }
}

/// Walk `dir` and stream every regular file through the artifact channel
///
/// The walk runs on its own task while the collector buffers artifacts until
/// the walker signals the end of input.
pub async fn collect_artifacts(dir: PathBuf) -> anyhow::Result<Vec<Artifact>> {
    let (sink, collector) = channel(CHANNEL_CAPACITY);

    let producer = tokio::spawn(async move {
        for path in walk_files(&dir)? {
            let relative = path.strip_prefix(&dir)?.to_path_buf();
            let bytes = tokio::fs::read(&path).await?;
            sink.send(Artifact::new(relative, bytes)).await?;
        }
        sink.finish().await?;
        Ok::<_, anyhow::Error>(())
    });

    let collected = collector.collect().await;
    producer.await??;
    Ok(collected?)
}

/// Regular files below `dir`, skipping any `.git` directory
///
/// Symlinks are followed. An unreadable entry, a dangling link or anything
/// that is neither a file nor a directory fails the walk, since a missing
/// file would be deleted from the published branch.
fn walk_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let walk = WalkDir::new(dir)
        .skip_hidden(false)
        .follow_links(true)
        .process_read_dir(|_, _, _, children| {
            children.retain(|entry| {
                entry
                    .as_ref()
                    .map(|e| e.file_name() != ".git")
                    .unwrap_or(true)
            });
        });

    let mut files = Vec::new();
    for entry in walk {
        let entry = entry.map_err(|e| anyhow::anyhow!("Failed to read build directory: {}", e))?;
        let path = entry.path();
        let file_type = entry.file_type();

        if file_type.is_dir() {
            continue;
        }
        if file_type.is_file() {
            files.push(path);
            continue;
        }

        let metadata = std::fs::metadata(&path)
            .map_err(|e| anyhow::anyhow!("Cannot publish {}: {}", path.display(), e))?;
        if metadata.is_file() {
            files.push(path);
        } else if !metadata.is_dir() {
            anyhow::bail!("Cannot publish {}: not a regular file", path.display());
        }
    }

    files.sort();
    Ok(files)
}

fn print_report(report: &DeployReport, remote: &RemoteUrl) {
    match report.status {
        DeployStatus::Empty => {
            println!("No files to deploy.");
        }
        DeployStatus::Unchanged => {
            println!("No changes to publish on {}.", report.branch);
        }
        DeployStatus::Committed => {
            println!("Published {} change(s) to {}", report.changes.len(), report.branch);
            if let Some(commit) = &report.commit {
                println!("  Commit: {}", commit);
            }
            if let Some(message) = &report.message {
                println!("  Message: {}", message);
            }
            for (path, status) in &report.changes {
                println!("    {:?} {}", status, path);
            }

            if report.pushed {
                println!("  Pushed to {}", remote);
                if let Some(url) = remote.pages_url() {
                    println!("  Site: {}", url);
                }
            } else {
                println!("  Not pushed (--no-push)");
            }
        }
    }
}
