//! Command line front end.

use crate::config::FerryConfig;
use crate::logging;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ferry_classloader::{ModuleClassLoaderFactory, Resource};
use ferry_file::{close_all, AcceptAll, AttributesPredicate, FileConnector, FileMatcher};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWrite, AsyncWriteExt};

#[derive(Parser, Debug)]
#[command(
    name = "ferry",
    about = "Plugin class isolation and local/FTP file access",
    version
)]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List a directory
    List {
        path: String,
        #[arg(long)]
        recursive: bool,
        /// Only report entries whose file name matches this glob
        #[arg(long)]
        glob: Option<String>,
        #[arg(long)]
        ftp: bool,
    },

    /// Stream a file to stdout
    Read {
        path: String,
        /// Hold the path lock while reading
        #[arg(long)]
        lock: bool,
        #[arg(long)]
        ftp: bool,
    },

    /// Print a plugin's class path
    Classpath { plugin_root: PathBuf },

    /// Locate a class (or, with --resource, a resource) through a plugin's loader
    Resolve {
        plugin_root: PathBuf,
        name: String,
        #[arg(long)]
        resource: bool,
    },
}

impl Command {
    fn uses_ftp(&self) -> bool {
        matches!(
            self,
            Command::List { ftp: true, .. } | Command::Read { ftp: true, .. }
        )
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = FerryConfig::load_or_default(cli.config.as_deref())?;
    logging::init(&config.logging)?;
    log::debug!("ferry {} starting", env!("CARGO_PKG_VERSION"));

    let mut stdout = tokio::io::stdout();
    execute(&cli.command, &config, &mut stdout).await?;
    stdout.flush().await?;
    Ok(())
}

/// Runs one command, writing its output to `out`.
pub async fn execute<W>(command: &Command, config: &FerryConfig, out: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    match command {
        Command::Classpath { plugin_root } => {
            let urls = ModuleClassLoaderFactory::new()
                .classpath_urls(plugin_root)
                .with_context(|| format!("cannot build class path for {}", plugin_root.display()))?;
            for url in urls {
                out.write_all(format!("{}\n", url).as_bytes()).await?;
            }
            Ok(())
        }
        Command::Resolve {
            plugin_root,
            name,
            resource,
        } => {
            let found = resolve(config, plugin_root, name, *resource)?;
            out.write_all(format!("{} {} ({})\n", found.name, found.url, found.source).as_bytes())
                .await?;
            Ok(())
        }
        _ if command.uses_ftp() => {
            let connector = config.ftp_connector()?;
            let result = file_command(&connector, command, out).await;
            connector.shutdown().await;
            result
        }
        _ => {
            let local = config.local_file_system();
            file_command(&local, command, out).await
        }
    }
}

fn resolve(config: &FerryConfig, plugin_root: &Path, name: &str, resource: bool) -> Result<Resource> {
    let loader = config.plugin(plugin_root).class_loader()?;
    let found = if resource {
        loader.get_resource(name)
    } else {
        loader.load_class(name)
    };
    Ok(found?)
}

async fn file_command<W>(connector: &dyn FileConnector, command: &Command, out: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    match command {
        Command::List {
            path,
            recursive,
            glob,
            ..
        } => {
            let matcher: Box<dyn AttributesPredicate> = match glob {
                Some(pattern) => Box::new(FileMatcher::new().filename(pattern.clone())),
                None => Box::new(AcceptAll),
            };
            let messages = connector.list(path, *recursive, matcher.as_ref()).await?;
            log::debug!("{}: {} entries under {}", connector.name(), messages.len(), path);

            let mut written = Ok(());
            for m in &messages {
                let line = format!(
                    "{:<9} {:>12} {}\n",
                    m.attributes.kind.to_string(),
                    m.attributes.size,
                    m.attributes.path
                );
                if let Err(e) = out.write_all(line.as_bytes()).await {
                    written = Err(e);
                    break;
                }
            }
            close_all(&messages).await?;
            Ok(written?)
        }
        Command::Read { path, lock, .. } => {
            let message = connector.read(path, *lock).await?;
            let copied = match message.content.as_ref() {
                Some(content) => content.copy_to(out).await.map(Some),
                None => Ok(None),
            };
            message.close().await?;
            match copied? {
                Some(bytes) => log::debug!("read {} bytes from {}", bytes, path),
                None => log::warn!("{} has no content", path),
            }
            Ok(())
        }
        other => anyhow::bail!("{:?} is not a file command", other),
    }
}
