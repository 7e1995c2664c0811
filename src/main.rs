use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use papershelf::config;
use papershelf::initialization::build_library;
use papershelf::{ArchiveMode, ImageIndexReport, IngestReport, ItemStatus, SearchOutcome};

/// Personal library of papers and images with semantic search.
#[derive(Parser, Debug)]
#[command(name = "papershelf", version, about)]
struct Cli {
    /// Configuration file (defaults to $PAPERSHELF_CONFIG_PATH, then ./papershelf.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct IngestArgs {
    /// A PDF file or a directory scanned recursively for PDFs
    path: PathBuf,

    /// Candidate topics, comma separated; without any the paper is filed under the default topic
    #[arg(long, value_delimiter = ',')]
    topics: Vec<String>,

    /// Copy files into the archive instead of moving them
    #[arg(long)]
    copy: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify, archive and index one PDF or a folder of PDFs
    AddPaper(IngestArgs),
    /// Run an existing folder of PDFs through the ingestion pipeline
    OrganizePapers(IngestArgs),
    /// Search papers by meaning
    SearchPaper {
        query: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
        /// Only return papers filed under this topic
        #[arg(long)]
        topic: Option<String>,
    },
    /// Index one image or a folder of images
    IndexImage {
        /// Defaults to the configured image directory
        path: Option<PathBuf>,
    },
    /// Search images with a text description
    SearchImage {
        query: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },
    /// Delete the image collection so it is rebuilt on the next index
    ResetImages,
}

/// Trimmed, non-blank topics named on the command line.
fn candidate_topics(requested: &[String]) -> Vec<String> {
    requested
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn archive_mode(copy: bool) -> ArchiveMode {
    if copy {
        ArchiveMode::Copy
    } else {
        ArchiveMode::Move
    }
}

fn print_ingest_report(report: &IngestReport) {
    for outcome in &report.outcomes {
        match &outcome.status {
            ItemStatus::Indexed {
                archived_path,
                topic,
                similarity,
                ..
            } => println!(
                "[indexed] {} -> {} (topic: {}, similarity: {:.3})",
                outcome.source.display(),
                archived_path.display(),
                topic,
                similarity
            ),
            ItemStatus::Skipped { reason } => println!("[skipped] {}: {}", outcome.source.display(), reason),
            ItemStatus::Failed { error } => println!("[failed]  {}: {}", outcome.source.display(), error),
        }
    }
    println!(
        "Indexed {}, skipped {}, failed {}. Papers in library: {}",
        report.indexed().count(),
        report.skipped().count(),
        report.failed().count(),
        report.total_records
    );
}

fn print_image_report(report: &ImageIndexReport) {
    if report.discovered == 0 {
        println!("No images found. Images in library: {}", report.total_records);
        return;
    }
    println!(
        "Indexed {} of {} images (dimension {}). Images in library: {}",
        report.indexed,
        report.discovered,
        report.dimension.map_or_else(|| "-".to_string(), |d| d.to_string()),
        report.total_records
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;
    log::debug!("Configuration loaded: {:?}", config);

    let library = build_library(&config).await?;

    match cli.command {
        Command::AddPaper(args) => {
            let topics = candidate_topics(&args.topics);
            let report = library.papers.ingest(&args.path, &topics, archive_mode(args.copy)).await?;
            print_ingest_report(&report);
        }
        Command::OrganizePapers(args) => {
            let topics = candidate_topics(&args.topics);
            let report = library.papers.organize(&args.path, &topics, archive_mode(args.copy)).await?;
            print_ingest_report(&report);
        }
        Command::SearchPaper { query, top_k, topic } => {
            match library.papers.search(&query, top_k, topic.as_deref()).await? {
                SearchOutcome::EmptyLibrary => println!("The paper library is empty. Add papers with `add-paper` first."),
                SearchOutcome::Hits(hits) if hits.is_empty() => println!("No matching papers."),
                SearchOutcome::Hits(hits) => {
                    for (rank, hit) in hits.iter().enumerate() {
                        println!(
                            "{}. {} [topic: {}, topic_sim: {:.3}] distance: {:.4}",
                            rank + 1,
                            hit.path,
                            hit.topic,
                            hit.topic_sim,
                            hit.distance
                        );
                    }
                }
            }
        }
        Command::IndexImage { path } => {
            let path = path.unwrap_or_else(|| config.storage.image_dir.clone());
            let report = library.images.index(&path).await?;
            print_image_report(&report);
        }
        Command::SearchImage { query, top_k } => match library.images.search(&query, top_k).await? {
            SearchOutcome::EmptyLibrary => println!("The image library is empty. Index images with `index-image` first."),
            SearchOutcome::Hits(hits) if hits.is_empty() => println!("No matching images."),
            SearchOutcome::Hits(hits) => {
                for (rank, hit) in hits.iter().enumerate() {
                    println!("{}. {} distance: {:.4}", rank + 1, hit.path, hit.distance);
                }
            }
        },
        Command::ResetImages => {
            if library.images.reset().await? {
                println!("Image collection deleted; it will be recreated on the next run.");
            } else {
                println!("Image collection did not exist.");
            }
        }
    }
    Ok(())
}
