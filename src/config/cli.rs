use crate::config::toml_config::AppConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "csv-uploader")]
#[command(about = "Upload CSV files into a Firebase Realtime Database")]
pub struct Cli {
    /// Path to TOML configuration file (defaults to ./csv-uploader.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Realtime Database URL, e.g. https://<project>-default-rtdb.firebaseio.com/
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Service account key file
    #[arg(long, global = true)]
    pub credentials: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Serve the upload form over HTTP
    Serve(ServeArgs),
    /// Upload one CSV file and exit
    Upload(UploadArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    #[arg(long)]
    pub host: Option<String>,

    #[arg(short, long)]
    pub port: Option<u16>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct UploadArgs {
    /// CSV file to upload
    #[arg(short, long)]
    pub file: PathBuf,

    /// Destination path in the database, e.g. data/csv_uploads
    #[arg(short = 'n', long = "root-node")]
    pub root_node: String,

    /// Parse and preview only, without contacting the database
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// 命令列參數覆蓋檔案設定
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(url) = &self.database_url {
            config.store.database_url = Some(url.clone());
        }
        if let Some(path) = &self.credentials {
            config.store.credentials_path = Some(path.clone());
        }
        if let Command::Serve(args) = &self.command {
            if let Some(host) = &args.host {
                config.server.host = host.clone();
            }
            if let Some(port) = args.port {
                config.server.port = port;
            }
        }
    }
}
