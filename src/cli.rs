use crate::bookmark::MemoryBookmarkStore;
use crate::config::CustomVendorConfig;
use crate::contract::SyncPayload;
use crate::load_config::YamlConfigStore;
use crate::providers::{FsFileHost, LocalFileProvider, VendorRegistry};
use crate::synchronise::{SyncOutcome, Synchroniser};
use crate::transport::ReqwestTransport;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// CLI for cloudleaf: keep a bookmark tree in sync with Gist and WebDAV.
#[derive(Parser)]
#[clap(
    name = "cloudleaf",
    version,
    about = "Synchronise a browser bookmark tree with Gist, WebDAV and local-file backends"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check every configured provider without changing remote state
    Check {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Upload the local bookmark tree to every configured provider
    Upload {
        #[clap(long)]
        config: PathBuf,
        /// Path to the native bookmark tree (JSON)
        #[clap(long)]
        bookmarks: PathBuf,
        /// Overwrite remotes even when they are newer
        #[clap(long)]
        force: bool,
    },
    /// Download from the first provider that answers
    Download {
        #[clap(long)]
        config: PathBuf,
        #[clap(long)]
        bookmarks: PathBuf,
        /// Replace the local tree with the downloaded payload
        #[clap(long)]
        apply: bool,
    },
    /// Export the local bookmark tree to a dated JSON file
    Export {
        #[clap(long)]
        bookmarks: PathBuf,
        #[clap(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Import a previously exported JSON file
    Import {
        #[clap(long)]
        bookmarks: PathBuf,
        #[clap(long)]
        file: PathBuf,
        /// Replace the local tree with the imported payload
        #[clap(long)]
        apply: bool,
    },
    /// Manage WebDAV vendors
    Vendors {
        #[clap(long)]
        config: PathBuf,
        #[clap(subcommand)]
        action: VendorAction,
    },
}

#[derive(Subcommand)]
pub enum VendorAction {
    /// List preset and custom vendors
    List,
    /// Add a custom vendor
    Add {
        #[clap(long)]
        id: String,
        #[clap(long)]
        name: String,
        #[clap(long)]
        server_url: String,
    },
    /// Remove a custom vendor
    Remove {
        #[clap(long)]
        id: String,
    },
}

fn synchroniser(
    config: &Path,
    store: Arc<MemoryBookmarkStore>,
    host: FsFileHost,
) -> Result<Synchroniser> {
    let transport = ReqwestTransport::new().context("Failed to build HTTP client")?;
    Ok(Synchroniser::new(
        Arc::new(YamlConfigStore::new(config)),
        store,
        Arc::new(VendorRegistry::new()),
        Arc::new(transport),
        Box::new(LocalFileProvider::new(Box::new(host))),
    ))
}

fn open_store(bookmarks: &Path) -> Result<Arc<MemoryBookmarkStore>> {
    let store = MemoryBookmarkStore::load(bookmarks)
        .with_context(|| format!("Failed to load bookmarks from {:?}", bookmarks))?;
    Ok(Arc::new(store))
}

fn print_outcome(action: &str, outcome: &SyncOutcome) {
    println!("{action} status: {}", outcome.status);
    if let Some(payload) = &outcome.payload {
        println!(
            "Payload: {} bookmarks, updatedAt {}",
            payload.num_bookmarks, payload.updated_at
        );
    }
}

async fn apply_and_save(
    sync: &Synchroniser,
    store: &MemoryBookmarkStore,
    payload: &SyncPayload,
    bookmarks: &Path,
) -> Result<()> {
    let report = sync.apply(payload).await?;
    store.save(bookmarks)?;
    println!(
        "Applied: removed {}, created {}",
        report.removed, report.created
    );
    Ok(())
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Check { config } => {
            let sync = synchroniser(&config, Arc::new(MemoryBookmarkStore::chromium()), FsFileHost::new())?;
            let checks = sync.validate().await?;
            if checks.is_empty() {
                println!("No providers configured.");
            }
            for check in checks {
                match check.result {
                    Ok(v) if v.valid => println!("{}: valid", check.provider),
                    Ok(v) => println!(
                        "{}: invalid ({})",
                        check.provider,
                        v.reason.unwrap_or_default()
                    ),
                    Err(e) => println!("{}: error ({})", check.provider, e),
                }
            }
            Ok(())
        }
        Commands::Upload {
            config,
            bookmarks,
            force,
        } => {
            let store = open_store(&bookmarks)?;
            let sync = synchroniser(&config, store, FsFileHost::new())?;
            let outcome = sync.upload(force, None).await?;
            print_outcome("Upload", &outcome);
            Ok(())
        }
        Commands::Download {
            config,
            bookmarks,
            apply,
        } => {
            let store = open_store(&bookmarks)?;
            let sync = synchroniser(&config, store.clone(), FsFileHost::new())?;
            let outcome = sync.download().await?;
            print_outcome("Download", &outcome);
            if let (true, Some(payload)) = (apply, &outcome.payload) {
                apply_and_save(&sync, &store, payload, &bookmarks).await?;
            }
            Ok(())
        }
        Commands::Export { bookmarks, out_dir } => {
            let store = open_store(&bookmarks)?;
            let host = FsFileHost::new().with_save_dir(&out_dir);
            // Export never reads the configuration.
            let sync = synchroniser(Path::new(""), store, host)?;
            let outcome = sync.export().await?;
            println!(
                "Exported {} to {}",
                LocalFileProvider::export_file_name(),
                out_dir.display()
            );
            print_outcome("Export", &outcome);
            Ok(())
        }
        Commands::Import {
            bookmarks,
            file,
            apply,
        } => {
            let store = open_store(&bookmarks)?;
            let host = FsFileHost::new().with_selection(&file);
            let sync = synchroniser(Path::new(""), store.clone(), host)?;
            let outcome = sync.import().await?;
            print_outcome("Import", &outcome);
            if let (true, Some(payload)) = (apply, &outcome.payload) {
                apply_and_save(&sync, &store, payload, &bookmarks).await?;
            }
            Ok(())
        }
        Commands::Vendors { config, action } => {
            let sync = synchroniser(&config, Arc::new(MemoryBookmarkStore::chromium()), FsFileHost::new())?;
            match action {
                VendorAction::List => {
                    for vendor in sync.vendors().await? {
                        println!("{}\t{}\t{}", vendor.id, vendor.name, vendor.server_url);
                    }
                }
                VendorAction::Add {
                    id,
                    name,
                    server_url,
                } => {
                    sync.add_custom_vendor(CustomVendorConfig {
                        id: id.clone(),
                        name,
                        server_url,
                    })
                    .await?;
                    println!("Added vendor {id}");
                }
                VendorAction::Remove { id } => {
                    if sync.remove_custom_vendor(&id).await? {
                        println!("Removed vendor {id}");
                    } else {
                        println!("No custom vendor {id}");
                    }
                }
            }
            Ok(())
        }
    }
}
