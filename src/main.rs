//! # Tour Scout CLI (`tscout`)
//!
//! The `tscout` binary runs the recommendation pipeline from the terminal.
//!
//! ## Usage
//!
//! ```bash
//! tscout --config ./config/tour.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tscout recommend "<query>"` | Run the full pipeline and print cards |
//! | `tscout extract "<query>"` | Run only the field extractor |
//! | `tscout regions` | Print the live area-code table |
//! | `tscout cache stats` | Inspect the embedding cache file |
//!
//! `OPENAI_API_KEY` and `TOUR_API_KEY` must be set in the environment.
//! A missing config file falls back to built-in defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tour_scout::cache::VectorCache;
use tour_scout::config;
use tour_scout::error::PipelineError;
use tour_scout::extract::extract_fields;
use tour_scout::llm::OpenAiChat;
use tour_scout::pipeline::Recommender;
use tour_scout::present;
use tour_scout::tour_api::{KorService, TourApi};

/// Tour Scout — tourist-site recommendations from a free-text query.
#[derive(Parser)]
#[command(
    name = "tscout",
    about = "Tour Scout — tourist-site recommendation cards from a free-text travel query",
    version,
    long_about = "Tour Scout chains a language-model extraction call and the Korea Tourism API \
    to turn a free-text query into a short list of recommended tourist-site cards, with a \
    flat-file embedding cache to avoid redundant model calls on repeated queries."
)]
struct Cli {
    /// Path to configuration file (TOML). Missing file = defaults.
    #[arg(long, global = true, default_value = "./config/tour.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline for a query and print recommendation cards.
    ///
    /// Extraction and region-resolution failures abort the run; an
    /// unmatched region or an empty listing prints a friendly empty
    /// result instead.
    Recommend {
        /// The free-text travel query (e.g. "제주 자연").
        query: String,

        /// Number of cards to produce (defaults to config).
        #[arg(long)]
        limit: Option<usize>,

        /// Skip the embedding cache for this run.
        #[arg(long)]
        no_cache: bool,

        /// Print the cards as a JSON array instead of text blocks.
        #[arg(long)]
        json: bool,
    },

    /// Run only the field extractor and print (region, cat1).
    Extract {
        /// The free-text travel query.
        query: String,
    },

    /// Fetch and print the area-code table from the tourism API.
    Regions,

    /// Inspect the embedding cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

/// Cache inspection subcommands.
#[derive(Subcommand)]
enum CacheAction {
    /// Print entry count, file size, and path of the cache file.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Recommend {
            query,
            limit,
            no_cache,
            json,
        } => {
            if no_cache {
                cfg.cache.enabled = false;
            }
            let want = limit.unwrap_or(cfg.recommend.num_recommend).max(1);

            let recommender = Recommender::new(cfg)?;
            match recommender.recommend(&query, want).await {
                Ok(cards) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&cards)?);
                    } else {
                        present::print_cards(&cards);
                    }
                }
                Err(PipelineError::RegionNotFound(region)) => {
                    // not a crash: an unknown region is a visible empty result
                    eprintln!("'{}' 지역을 찾지 못했습니다.", region);
                    println!("추천 결과가 없습니다.");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Extract { query } => {
            let chat = OpenAiChat::new(&cfg.openai)?;
            let fields = extract_fields(&chat, &query).await?;
            println!("region: {}", fields.region);
            println!("cat1:   {}", fields.cat1.as_deref().unwrap_or("(없음)"));
        }
        Commands::Regions => {
            let api = KorService::new(&cfg.tour_api)?;
            let table = api.area_codes().await?;
            for area in &table {
                println!("{:>4}  {}", area.code, area.name);
            }
            println!("({} regions)", table.len());
        }
        Commands::Cache { action } => match action {
            CacheAction::Stats => {
                let cache = VectorCache::open(&cfg.cache.path)?;
                let size = std::fs::metadata(&cfg.cache.path)
                    .map(|m| m.len())
                    .unwrap_or(0);
                println!("path:    {}", cache.path().display());
                println!("entries: {}", cache.len());
                println!("bytes:   {}", size);
            }
        },
    }

    Ok(())
}
