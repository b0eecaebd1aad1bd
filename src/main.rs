use clap::Parser;
use csv_uploader::config::cli::{Command, UploadArgs};
use csv_uploader::core::parser::parse_csv;
use csv_uploader::domain::model::{Batch, DatasetInfo};
use csv_uploader::utils::validation::{validate_file_extension, Validate};
use csv_uploader::utils::logger;
use csv_uploader::web::{self, AppState};
use csv_uploader::{
    AppConfig, Cli, DestinationPath, FirebaseStore, Result, UploadOrchestrator, UploadResult,
    UploaderError,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 初始化日誌
    match &cli.command {
        Command::Serve(args) if args.log_json => logger::init_json_logger(cli.verbose),
        _ => logger::init_cli_logger(cli.verbose),
    }
    if cli.verbose {
        tracing::debug!("CLI args: {:?}", cli);
    }

    if let Err(e) = run(cli).await {
        tracing::error!("❌ {} (Category: {:?})", e, e.category());
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    match &cli.command {
        Command::Serve(_) => serve(config).await,
        Command::Upload(args) => upload(config, args).await,
    }
}

fn connect(config: &AppConfig) -> Result<FirebaseStore> {
    config.validate()?;
    let credentials = config.credentials();
    tracing::info!(
        "Using database {} with {}",
        config.database_url()?,
        credentials.describe()
    );
    FirebaseStore::connect_with_timeout(config.database_url()?, credentials, config.store_timeout())
}

async fn serve(config: AppConfig) -> Result<()> {
    let store = connect(&config)?;

    let target = format!("{}:{}", config.server.host, config.server.port);
    let addr = tokio::net::lookup_host(&target)
        .await?
        .next()
        .ok_or_else(|| UploaderError::InvalidConfigValue {
            field: "server.host".to_string(),
            value: target.clone(),
            reason: "address did not resolve".to_string(),
        })?;

    let state = AppState::new(
        store,
        config.database_url()?,
        config.upload.preview_rows,
        config.upload.max_upload_bytes,
        config.pending_ttl(),
    );
    web::serve(addr, state).await
}

async fn upload(config: AppConfig, args: &UploadArgs) -> Result<()> {
    let file = args.file.to_string_lossy();
    validate_file_extension("--file", &file, &["csv"])?;
    // 路徑在任何網路請求之前驗證
    let destination = DestinationPath::parse(&args.root_node)?;

    let data = tokio::fs::read(&args.file).await?;
    let batch = parse_csv(&data)?;
    let info = DatasetInfo::new(&batch, data.len());

    println!("Data Preview ({})", file);
    print_preview(&batch, config.upload.preview_rows);
    println!(
        "Rows: {}  Columns: {}  Size (KB): {}",
        info.rows,
        info.columns,
        info.size_kb()
    );

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing uploaded to '{}'", destination);
        return Ok(());
    }

    let orchestrator = UploadOrchestrator::new(connect(&config)?);
    match orchestrator.upload(&batch, &destination).await {
        result @ UploadResult::Success { .. } => {
            println!("✅ {}", result.display_message());
            println!(
                "Uploaded at: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            );
            Ok(())
        }
        UploadResult::Failure { message } => Err(UploaderError::store(message)),
    }
}

fn print_preview(batch: &Batch, rows: usize) {
    let head: Vec<Vec<String>> = batch
        .head(rows)
        .map(|record| record.cells().iter().map(|c| c.to_string()).collect())
        .collect();

    let widths: Vec<usize> = batch
        .columns()
        .iter()
        .enumerate()
        .map(|(i, column)| {
            head.iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(column.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    println!("{}", format_row(batch.columns().iter().map(String::as_str), &widths));
    for row in &head {
        println!("{}", format_row(row.iter().map(String::as_str), &widths));
    }
    if batch.len() > head.len() {
        println!("... {} more rows", batch.len() - head.len());
    }
}

fn format_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join("  ")
}
