//! Papyrus CLI - Command-line interface
//!
//! Usage:
//!   papyrus convert <source> <dest>
//!   papyrus ingest [--partition <name>]
//!   papyrus search <query> [--partition <name>] [--limit N] [--filter field=value]
//!   papyrus delete-candidates <document-id>
//!   papyrus collect
//!   papyrus seed <csv> <json>
//!   papyrus flatten <api-data> <trending> <categories> <channels-out> <videos-out>
//!   papyrus enrich <channels> <videos> <channels-out> <videos-out>
//!   papyrus merge <first> <second> <output>
//!   papyrus top-videos <videos> <output> [--count N]

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use papyrus_core::{read_json_file, ApiData, AppConfig};
use papyrus_ingest::Ingestor;
use papyrus_tei::convert_tree;
use papyrus_vector::{
    create_embedding_client, group_by_document, search_documents, QdrantStore, VectorStore,
};
use papyrus_youtube::{
    enrich_tables, flatten_tables, merge_tables, seed_channels_from_csv, top_videos, write_csv,
    Collector, YoutubeClient,
};

#[derive(Parser)]
#[command(name = "papyrus")]
#[command(about = "Paper extraction, vector indexing, and YouTube collection pipelines")]
#[command(version)]
struct Cli {
    /// TOML config file; falls back to environment variables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a tree of TEI-XML files into paper records
    Convert {
        /// Source directory root
        source: PathBuf,
        /// Destination directory root
        dest: PathBuf,
    },
    /// Embed and index unprocessed paper records
    Ingest {
        /// Target partition (defaults to the configured one)
        #[arg(long)]
        partition: Option<String>,
    },
    /// Semantic search over indexed papers
    Search {
        /// Free-text query
        query: String,
        /// Partition(s) to search; all partitions when omitted
        #[arg(long)]
        partition: Vec<String>,
        /// Maximum number of chunk hits
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Extra filter as field=value
        #[arg(long)]
        filter: Option<String>,
    },
    /// Compute the vector-store primary keys belonging to a document
    DeleteCandidates {
        /// Document id (content hash)
        document_id: String,
    },
    /// Fetch channel statistics and video metadata for seeded channels
    Collect,
    /// Convert a channel-id CSV into a collector seed list
    Seed {
        /// Single-column CSV of channel ids
        csv: PathBuf,
        /// Seed JSON to write
        json: PathBuf,
    },
    /// Flatten collected data into channel and video tables
    Flatten {
        /// Aggregate API data JSON
        api_data: PathBuf,
        /// Trending-video lookup JSON
        trending: PathBuf,
        /// Category-name lookup JSON
        categories: PathBuf,
        /// Channel table to write
        channels_out: PathBuf,
        /// Video table to write
        videos_out: PathBuf,
    },
    /// Append per-channel statistics and per-video ratios to the tables
    Enrich {
        channels: PathBuf,
        videos: PathBuf,
        channels_out: PathBuf,
        videos_out: PathBuf,
    },
    /// Concatenate two tables with the same columns
    Merge {
        first: PathBuf,
        second: PathBuf,
        output: PathBuf,
    },
    /// Top videos per channel by view count
    TopVideos {
        videos: PathBuf,
        output: PathBuf,
        /// Videos to keep per channel
        #[arg(long, default_value_t = 10)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AppConfig::from_env().context("loading config from environment")?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    match cli.command {
        Commands::Convert { source, dest } => {
            let report = convert_tree(&source, &dest, &config.convert)?;
            println!(
                "converted {} records ({} skipped, {} collisions)",
                report.converted, report.skipped, report.collisions
            );
        }

        Commands::Ingest { partition } => {
            let partition = partition.unwrap_or_else(|| config.vector.partition.clone());
            let store = open_store(&config).await?;
            store.ensure_partition(&partition).await?;

            let embedder = create_embedding_client(&config.embedding)?;
            anyhow::ensure!(
                embedder.dimension() == config.vector.dimension,
                "embedding model dimension {} does not match collection schema {}",
                embedder.dimension(),
                config.vector.dimension
            );

            let ingestor = Ingestor::new(&store, embedder.as_ref(), &config.ingest, &partition);
            let report = ingestor.run().await?;
            println!(
                "ingested {} files / {} chunks ({} quarantined)",
                report.ingested_files, report.inserted_chunks, report.quarantined
            );
        }

        Commands::Search {
            query,
            partition,
            limit,
            filter,
        } => {
            let store = open_store(&config).await?;
            let embedder = create_embedding_client(&config.embedding)?;

            let filter = filter.map(parse_filter).transpose()?;
            let hits =
                search_documents(&store, embedder.as_ref(), &query, &partition, limit, filter)
                    .await?;
            let grouped = group_by_document(hits);

            println!("{}", serde_json::to_string_pretty(&grouped)?);
        }

        Commands::DeleteCandidates { document_id } => {
            let store = open_store(&config).await?;
            let ids = store.candidate_point_ids(&document_id).await?;
            println!("{} candidate rows for document {document_id}", ids.len());
            for id in ids {
                println!("{id}");
            }
        }

        Commands::Collect => {
            let client = YoutubeClient::new(config.youtube.api_key()?);
            let collector = Collector::new(&client, &config.youtube);
            let report = collector.run().await?;
            println!(
                "processed {} channels ({} statistics, {} video lists)",
                report.channels_processed, report.statistics_fetched, report.videos_fetched
            );
        }

        Commands::Seed { csv, json } => {
            let count = seed_channels_from_csv(&csv, &json)?;
            println!("seeded {count} channels into {}", json.display());
        }

        Commands::Flatten {
            api_data,
            trending,
            categories,
            channels_out,
            videos_out,
        } => {
            let api_data: ApiData = read_json_file(&api_data)?;
            let trending = if trending.exists() {
                read_json_file(&trending)?
            } else {
                serde_json::Value::Null
            };
            let categories = read_json_file(&categories)?;

            let (channels, videos) = flatten_tables(&api_data, &trending, &categories);
            write_csv(&channels_out, &channels)?;
            write_csv(&videos_out, &videos)?;
            println!(
                "wrote {} channel rows and {} video rows",
                channels.len(),
                videos.len()
            );
        }

        Commands::Enrich {
            channels,
            videos,
            channels_out,
            videos_out,
        } => {
            enrich_tables(&channels, &videos, &channels_out, &videos_out)?;
            println!(
                "wrote {} and {}",
                channels_out.display(),
                videos_out.display()
            );
        }

        Commands::Merge {
            first,
            second,
            output,
        } => {
            let rows = merge_tables(&first, &second, &output)?;
            println!("merged {rows} rows into {}", output.display());
        }

        Commands::TopVideos {
            videos,
            output,
            count,
        } => {
            let rows = top_videos(&videos, &output, count)?;
            println!("wrote {rows} rows to {}", output.display());
        }
    }

    Ok(())
}

/// Open the vector-store handle and make sure the collection exists.
async fn open_store(config: &AppConfig) -> anyhow::Result<QdrantStore> {
    let store = QdrantStore::connect(&config.vector)?;
    store.ensure_collection().await?;
    Ok(store)
}

/// Parse a `field=value` filter expression.
fn parse_filter(raw: String) -> anyhow::Result<(String, String)> {
    match raw.split_once('=') {
        Some((field, value)) if !field.trim().is_empty() => {
            Ok((field.trim().to_string(), value.trim().to_string()))
        }
        _ => anyhow::bail!("filter must have the form field=value, got {raw:?}"),
    }
}
