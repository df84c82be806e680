use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use facemark_core::config::SessionConfig;
use facemark_core::models::domain::model_descriptor::{ModelDescriptor, ModelId};
use facemark_core::models::infrastructure::bzip2_extractor::Bzip2Extractor;
use facemark_core::models::infrastructure::http_downloader::HttpDownloader;
use facemark_core::models::integrity::{self, Verification, MISSING_DIGEST};
use facemark_core::models::model_store::ModelStore;
use facemark_core::models::registry::ModelRegistry;

/// Manage face landmark models: list, fetch, verify and check for updates.
#[derive(Parser)]
#[command(name = "facemark")]
struct Cli {
    /// Model directory (defaults to the platform cache directory).
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Remote catalogue URL.
    #[arg(long, global = true)]
    catalogue_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List catalogue models and whether they are present locally.
    Models {
        /// Re-download the catalogue before listing.
        #[arg(long)]
        refresh: bool,
    },
    /// Print the content digest of a file.
    Digest { file: PathBuf },
    /// Download, extract and verify a model.
    Fetch {
        id: u32,
        /// Replace an existing local copy.
        #[arg(long)]
        force: bool,
    },
    /// Check a local model against its catalogue digest.
    Verify { id: u32 },
    /// Compare the remote catalogue with the cached one.
    CheckUpdates {
        /// Store the remote catalogue as the new local one.
        #[arg(long)]
        save: bool,
    },
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = SessionConfig::load();
    if let Some(dir) = cli.model_dir {
        config.model_dir = Some(dir);
    }
    if let Some(url) = cli.catalogue_url {
        config.catalogue_url = url;
    }

    let downloader = Arc::new(HttpDownloader::new());
    let store = ModelStore::new(
        config.resolved_model_dir()?,
        downloader.clone(),
        Arc::new(Bzip2Extractor::new()),
    );

    match cli.command {
        Command::Models { refresh } => {
            let registry = if refresh {
                refresh_catalogue(&downloader, &store, &config.catalogue_url)?
            } else {
                local_catalogue(&downloader, &store, &config.catalogue_url)?
            };
            list_models(&store, &registry);
        }
        Command::Digest { file } => print_digest(&file)?,
        Command::Fetch { id, force } => {
            let registry = local_catalogue(&downloader, &store, &config.catalogue_url)?;
            fetch_model(&store, lookup(&registry, id)?, force)?;
        }
        Command::Verify { id } => {
            let registry = local_catalogue(&downloader, &store, &config.catalogue_url)?;
            verify_model(&store, lookup(&registry, id)?)?;
        }
        Command::CheckUpdates { save } => {
            check_updates(&downloader, &store, &config.catalogue_url, save)?;
        }
    }

    Ok(())
}

/// Cached catalogue, downloading it on first use.
fn local_catalogue(
    downloader: &HttpDownloader,
    store: &ModelStore,
    url: &str,
) -> Result<ModelRegistry, Box<dyn std::error::Error>> {
    let path = store.catalogue_path();
    if path.exists() {
        return Ok(ModelRegistry::load_from_file(&path)?);
    }
    refresh_catalogue(downloader, store, url)
}

fn refresh_catalogue(
    downloader: &HttpDownloader,
    store: &ModelStore,
    url: &str,
) -> Result<ModelRegistry, Box<dyn std::error::Error>> {
    log::info!("Fetching catalogue from {url}");
    let registry = downloader.fetch_catalogue(url)?;
    registry.save_to_file(&store.catalogue_path())?;
    Ok(registry)
}

fn lookup(registry: &ModelRegistry, id: u32) -> Result<&ModelDescriptor, Box<dyn std::error::Error>> {
    registry
        .get(ModelId(id))
        .ok_or_else(|| format!("Model {id} is not in the catalogue").into())
}

fn list_models(store: &ModelStore, registry: &ModelRegistry) {
    if registry.is_empty() {
        println!("Catalogue is empty");
        return;
    }
    for descriptor in registry.iter() {
        let status = if store.exists(descriptor) { "downloaded" } else { "-" };
        println!(
            "{:>4}  v{:<6} {:<12} {}",
            descriptor.id(),
            descriptor.version(),
            status,
            descriptor.name()
        );
    }
}

fn print_digest(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let digest = integrity::digest(file);
    if digest == MISSING_DIGEST {
        return Err(format!("Cannot read {}", file.display()).into());
    }
    println!("{digest}  {}", file.display());
    Ok(())
}

fn fetch_model(
    store: &ModelStore,
    descriptor: &ModelDescriptor,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if store.exists(descriptor) && !force {
        log::info!("{} already downloaded", descriptor.name());
        return verify_model(store, descriptor);
    }
    store.delete(descriptor)?;
    store.download_archive(descriptor, Some(Box::new(download_progress)))?;
    eprintln!();
    store.extract_archive(descriptor)?;
    verify_model(store, descriptor)
}

fn verify_model(
    store: &ModelStore,
    descriptor: &ModelDescriptor,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = store.path_of(descriptor);
    let outcome = store
        .verify(descriptor)
        .map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
    match outcome {
        Verification::Match => {
            println!("{}: OK", path.display());
            Ok(())
        }
        Verification::Mismatch { actual } => Err(format!(
            "{} is corrupted (expected {}, got {actual}); run `facemark fetch {} --force`",
            path.display(),
            descriptor.expected_digest(),
            descriptor.id()
        )
        .into()),
        Verification::Missing => Err(format!(
            "{} is not downloaded; run `facemark fetch {}`",
            path.display(),
            descriptor.id()
        )
        .into()),
    }
}

fn check_updates(
    downloader: &HttpDownloader,
    store: &ModelStore,
    url: &str,
    save: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let local = local_catalogue(downloader, store, url)?;
    let remote = downloader.fetch_catalogue(url)?;
    let diff = local.diff(&remote);

    if diff.is_empty() {
        println!("Catalogue is up to date");
        return Ok(());
    }
    for id in &diff.new_models {
        if let Some(d) = remote.get(*id) {
            println!("new:     {:>4}  v{}  {}", id, d.version(), d.name());
        }
    }
    for id in &diff.updates {
        if let (Some(old), Some(new)) = (local.get(*id), remote.get(*id)) {
            println!(
                "update:  {:>4}  v{} -> v{}  {}",
                id,
                old.version(),
                new.version(),
                new.name()
            );
        }
    }
    if save {
        remote.save_to_file(&store.catalogue_path())?;
        log::info!("Saved catalogue to {}", store.catalogue_path().display());
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading model... {pct}%");
    } else {
        eprint!("\rDownloading model... {downloaded} bytes");
    }
}
