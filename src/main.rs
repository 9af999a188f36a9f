use clap::{Parser, Subcommand};
use famille_photo::config;
use famille_photo::gc::sweep_orphans;
use famille_photo::imaging::RustBackend;
use famille_photo::notify::NotificationBus;
use famille_photo::output;
use famille_photo::session::{Collaborators, CropRequest, PhotoUploader};
use famille_photo::store::{JsonDocumentStore, LocalIdentity, LocalObjectStore};
use famille_photo::types::{SelectedFile, TargetEntity};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "famille-photo")]
#[command(about = "Crop, optimize and upload family profile photos")]
#[command(long_about = "\
Crop, optimize and upload family profile photos

Runs the photo pipeline against a local data directory:

  file → crop → optimize → upload → record update

Data directory layout:

  data/
  ├── config.toml                  # Pipeline config (optional)
  ├── objects/                     # Uploaded photos (object store)
  │   ├── profile_pictures/<user>/
  │   └── family_members/<family>/<member>/
  ├── records/                     # One JSON file per record
  │   ├── users/<user>.json
  │   └── familyMembers/<member>.json
  └── identity/<user>.json         # Identity provider profile

The crop defaults to a centered square covering 90% of the shorter side.
Use --zoom and --crop to adjust it.

Run 'famille-photo gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Data directory holding objects, records and identity profiles
    #[arg(long, default_value = "famille-data", global = true)]
    data_dir: PathBuf,

    /// Config file (defaults to <data-dir>/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crop, optimize and upload a photo, then record it on the target
    Upload(UploadArgs),
    /// Delete stored photos that no record references
    Gc {
        /// Only list what would be deleted
        #[arg(long)]
        dry_run: bool,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct UploadArgs {
    /// Image file to upload
    file: PathBuf,

    /// Set the profile photo of this user
    #[arg(long, conflicts_with_all = ["family", "member"], required_unless_present = "member")]
    user: Option<String>,

    /// Family of the member whose photo to set
    #[arg(long, requires = "member")]
    family: Option<String>,

    /// Family member whose photo to set
    #[arg(long, requires = "family")]
    member: Option<String>,

    /// Signed-in user (defaults to --user)
    #[arg(long)]
    signed_in_as: Option<String>,

    /// Zoom scale applied to the initial selection
    #[arg(long)]
    zoom: Option<f64>,

    /// Crop selection as X,Y,SIZE in displayed pixels
    #[arg(long, value_parser = parse_crop)]
    crop: Option<(u32, u32, u32)>,

    /// Display size as WxH (defaults to the image's natural size)
    #[arg(long, value_parser = parse_display)]
    display: Option<(u32, u32)>,
}

impl UploadArgs {
    fn target(&self) -> Result<TargetEntity, String> {
        match (&self.user, &self.family, &self.member) {
            (Some(user), _, _) => Ok(TargetEntity::user(user)),
            (None, Some(family), Some(member)) => Ok(TargetEntity::member(family, member)),
            _ => Err("either --user or --family with --member is required".to_string()),
        }
    }
}

fn parse_numbers(s: &str, sep: char, count: usize) -> Result<Vec<u32>, String> {
    let parts: Vec<u32> = s
        .split(sep)
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid number in '{s}': {e}"))?;
    if parts.len() != count {
        return Err(format!("expected {count} values separated by '{sep}', got '{s}'"));
    }
    Ok(parts)
}

fn parse_crop(s: &str) -> Result<(u32, u32, u32), String> {
    let p = parse_numbers(s, ',', 3)?;
    Ok((p[0], p[1], p[2]))
}

fn parse_display(s: &str) -> Result<(u32, u32), String> {
    let p = parse_numbers(&s.to_ascii_lowercase(), 'x', 2)?;
    if p[0] == 0 || p[1] == 0 {
        return Err(format!("display size must be non-zero, got '{s}'"));
    }
    Ok((p[0], p[1]))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.data_dir.join("config.toml"));

    match cli.command {
        Command::Upload(args) => {
            let config = config::load_config(&config_path)?;
            upload(&cli.data_dir, config, args).await?;
        }
        Command::Gc { dry_run } => {
            let config = config::load_config(&config_path)?;
            let documents = JsonDocumentStore::new(cli.data_dir.join("records"));
            let objects = LocalObjectStore::new(
                cli.data_dir.join("objects"),
                config.storage.public_base_url.clone(),
            );
            let report = sweep_orphans(&documents, &objects, &config.storage, dry_run).await?;
            output::print_sweep_report(&report);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

async fn upload(
    data_dir: &Path,
    config: config::PhotoConfig,
    args: UploadArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let target = args.target()?;
    let signed_in = args.signed_in_as.clone().or_else(|| args.user.clone());

    let documents = Arc::new(JsonDocumentStore::new(data_dir.join("records")));
    documents
        .ensure_entity(target.collection(), target.record_id())
        .await?;
    let objects = Arc::new(LocalObjectStore::new(
        data_dir.join("objects"),
        config.storage.public_base_url.clone(),
    ));
    let identity = Arc::new(LocalIdentity::new(data_dir.join("identity"), signed_in));
    let bus = Arc::new(NotificationBus::new());
    let mut notifications = bus.subscribe_all();

    let uploader = PhotoUploader::new(
        config,
        Arc::new(RustBackend::new()),
        Collaborators {
            documents,
            objects,
            identity,
            notifier: bus.clone(),
        },
    );

    let file = SelectedFile::from_path(&args.file).await?;
    let request = CropRequest {
        display: args.display,
        zoom: args.zoom,
        selection: args.crop,
    };
    let result = uploader.run(target, file, &request).await;

    for notification in notifications.drain() {
        output::print_notification(&notification);
    }
    output::print_photo_result(&result?);
    Ok(())
}
