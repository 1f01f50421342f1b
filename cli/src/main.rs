use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use relay_drive::config::{Config, DEFAULT_CONFIG_FILE};
use relay_drive::transfer::{ProgressFormatter, ProgressStats};
use relay_drive::{share_url, Category, DriveSession, FileRecord, Provider, View};
use tempfile::NamedTempFile;
use tokio::fs::File;
use tokio::io::BufWriter;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "drive-cli")]
#[command(about = "Encrypted drive on top of chat relays", long_about = None)]
pub struct Cli {
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Folder to operate in (defaults to the root)
    #[arg(long, global = true)]
    folder: Option<Uuid>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Encrypt and upload a file
    Upload {
        #[arg(short, long)]
        file: PathBuf,

        /// discord, telegram, ...
        #[arg(short, long)]
        provider: Option<String>,
    },

    /// Download and decrypt a file
    Download {
        #[arg(short = 'i', long = "file-id")]
        file_id: Uuid,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// List files and folders
    List {
        /// all, recent, dashboard, video, image, audio, other
        #[arg(long, default_value = "all")]
        view: String,
    },

    /// Create (or show) the public share link of a file
    Share {
        #[arg(short = 'i', long = "file-id")]
        file_id: Uuid,

        #[arg(long, default_value = "http://localhost:3000")]
        origin: String,
    },

    /// Download a file through its public share id
    FetchShared {
        #[arg(short = 's', long = "share-id")]
        share_id: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create a folder
    Mkdir {
        #[arg(short, long)]
        name: String,
    },

    /// Delete a folder with everything inside it
    Rmdir {
        #[arg(short = 'i', long = "folder-id")]
        folder_id: Uuid,
    },

    /// Delete a file
    Rm {
        #[arg(short = 'i', long = "file-id")]
        file_id: Uuid,
    },

    /// Move a file to another folder (omit --to for the root)
    Mv {
        #[arg(short = 'i', long = "file-id")]
        file_id: Uuid,

        #[arg(long)]
        to: Option<Uuid>,
    },

    /// Replace the local snapshot with the hosted store's contents
    Refresh,
}

fn parse_view(raw: &str) -> Result<View> {
    Ok(match raw {
        "all" => View::All,
        "recent" => View::Recent,
        "dashboard" => View::Dashboard,
        other => match Category::parse(other) {
            Some(category) => View::Category(category),
            None => bail!("unknown view: {}", other),
        },
    })
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

fn report(stats: &ProgressStats) {
    eprintln!(
        "  {} at {}, {}",
        stats.format_progress(),
        stats.format_speed(),
        stats.format_time_remaining()
    );
}

/// Write into a temporary file next to `output` and move it into place only
/// when `write` succeeds. On error the temporary file is removed, so no
/// partial plaintext is left behind.
async fn write_staged<T, F, Fut>(output: &Path, write: F) -> Result<T>
where
    F: FnOnce(BufWriter<File>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staged = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating a temporary file in {}", dir.display()))?;
    let writer = BufWriter::new(File::from_std(staged.as_file().try_clone()?));

    let value = write(writer).await?;
    staged
        .persist(output)
        .map_err(|e| e.error)
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(value)
}

/// Local name for a shared file: only the final path component of the
/// name stored in the record.
fn shared_output_path(name: &str) -> Result<PathBuf> {
    match Path::new(name).file_name() {
        Some(file_name) => Ok(PathBuf::from(file_name)),
        None => bail!("shared file name {:?} is not usable as a file name, pass --output", name),
    }
}

fn describe(record: &FileRecord) -> String {
    format!(
        "{}  {:<32} {:>10}  {:<6} {}",
        record.id,
        record.name,
        format_size(record.size),
        record.category.as_str(),
        record.encryption.provider
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let mut session = DriveSession::from_config(&config).await?;
    if let Some(folder) = cli.folder {
        session.open_folder(folder).await?;
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    match cli.command {
        Commands::Upload { file, provider } => {
            if let Some(provider) = provider {
                session.set_provider(Provider::from(provider.as_str()));
            }
            let record = session.upload_file(&file, report, &cancel).await?;
            println!("Uploaded {} ({} chunks)", record.id, record.encryption.chunk_locators.len());
        },
        Commands::Download { file_id, output } => {
            let (drive, cancel) = (&session, &cancel);
            let record = write_staged(&output, |mut writer| async move {
                drive.download_file(file_id, &mut writer, report, cancel).await.map_err(anyhow::Error::from)
            })
            .await?;
            println!("Downloaded {} to {}", record.name, output.display());
        },
        Commands::Share { file_id, origin } => {
            let share_id = session.share_file(file_id).await?;
            println!("{}", share_url(&origin, &share_id));
        },
        Commands::List { view } => {
            for folder in session.subfolders().await? {
                println!("{}  {}/", folder.id, folder.name);
            }
            for record in session.list(parse_view(&view)?).await? {
                println!("{}", describe(&record));
            }
            println!("Used space: {}", format_size(session.used_space().await?));
        },
        Commands::FetchShared { share_id, output } => {
            let record = session.catalog().resolve_share(&share_id).await?;
            let output = match output {
                Some(output) => output,
                None => shared_output_path(&record.name)?,
            };
            let (drive, cancel, shared) = (&session, &cancel, &record);
            write_staged(&output, |mut writer| async move {
                drive.download_record(shared, &mut writer, report, cancel).await.map_err(anyhow::Error::from)
            })
            .await?;
            println!("Downloaded {} to {}", record.name, output.display());
        },
        Commands::Mkdir { name } => {
            let folder = session.create_folder(&name).await?;
            println!("Created folder {} ({})", folder.name, folder.id);
        },
        Commands::Rmdir { folder_id } => {
            let removed = session.delete_folder(folder_id).await?;
            println!("Removed {} folders and {} files", removed.folders, removed.files);
        },
        Commands::Rm { file_id } => {
            session.delete_file(file_id).await?;
            println!("Deleted {}", file_id);
        },
        Commands::Mv { file_id, to } => {
            session.move_file(file_id, to).await?;
            println!("Moved {}", file_id);
        },
        Commands::Refresh => {
            let counts = session.refresh().await?;
            println!("Refreshed {} files and {} folders", counts.files, counts.folders);
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(10 * 1024 * 1024), "10.0 MB");
    }

    #[test]
    fn shared_names_stay_in_the_working_directory() {
        assert_eq!(shared_output_path("report.pdf").unwrap(), PathBuf::from("report.pdf"));
        assert_eq!(shared_output_path("../../.bashrc").unwrap(), PathBuf::from(".bashrc"));
        assert_eq!(shared_output_path("/etc/x").unwrap(), PathBuf::from("x"));
        assert!(shared_output_path("..").is_err());
        assert!(shared_output_path("").is_err());
    }

    #[tokio::test]
    async fn staged_output_appears_only_on_success() {
        use tokio::io::AsyncWriteExt;

        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("restored.bin");

        let failed: Result<()> = write_staged(&output, |mut writer| async move {
            writer.write_all(b"first chunk plaintext").await?;
            writer.flush().await?;
            Err::<(), _>(anyhow::anyhow!("chunk 1 failed authentication"))
        })
        .await;
        assert!(failed.is_err());
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        write_staged(&output, |mut writer| async move {
            writer.write_all(b"whole file").await?;
            writer.flush().await?;
            Ok::<(), anyhow::Error>(())
        })
        .await
        .unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"whole file");
    }

    #[test]
    fn views_parse() {
        assert_eq!(parse_view("recent").unwrap(), View::Recent);
        assert_eq!(parse_view("video").unwrap(), View::Category(Category::Video));
        assert!(parse_view("everything").is_err());
    }
}
