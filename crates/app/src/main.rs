use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use exam_core::model::{ExamConfig, Subject, TagName};
use services::{
    Analytics, Clock, ExamFlow, ExamService, ResultHistoryService, TracingAnalytics,
};
use storage::repository::Storage;
use storage::sqlite::SqliteRepository;

mod db;
mod seed;
mod take;

#[derive(Parser, Debug)]
#[command(name = "exam", version, about = "Timed multiple-choice exams in the terminal")]
struct Cli {
    /// SQLite database holding questions and exam history
    #[arg(long, env = "EXAM_DB_URL", default_value = "sqlite://exam.sqlite3", global = true)]
    db: String,

    /// Remote REST question store; when set, questions come from there
    #[arg(long, env = "EXAM_REST_URL", global = true)]
    rest_url: Option<String>,

    /// API key for the REST question store
    #[arg(long, env = "EXAM_REST_KEY", default_value = "", hide_env_values = true, global = true)]
    rest_key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Take a timed exam
    Take {
        /// Subject to include (repeatable)
        #[arg(long = "subject", required = true)]
        subjects: Vec<Subject>,

        /// Tag to include (repeatable)
        #[arg(long = "tag", required = true)]
        tags: Vec<TagName>,

        /// Number of questions
        #[arg(long, default_value_t = 10)]
        count: u32,
    },

    /// List tags available for the given subjects
    Tags {
        /// Subject to inspect (repeatable)
        #[arg(long = "subject", required = true)]
        subjects: Vec<Subject>,
    },

    /// Show recent exam results
    History {
        /// Maximum number of results
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },

    /// Fill the SQLite database with generated sample questions
    Seed {
        /// Questions generated per subject
        #[arg(long, default_value_t = 12)]
        per_subject: u32,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,app=info,services=info,storage=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn open_storage(cli: &Cli) -> anyhow::Result<Storage> {
    if let Some(rest_url) = &cli.rest_url {
        tracing::info!(rest_url, "using remote question store");
        return Storage::rest(rest_url, &cli.rest_key).context("configuring REST store");
    }

    let db_url = db::normalize_sqlite_url(&cli.db);
    db::prepare_sqlite_file(&db_url)?;
    Storage::sqlite(&db_url)
        .await
        .with_context(|| format!("opening {db_url}"))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let clock = Clock::default_clock();
    let analytics: Arc<dyn Analytics> = Arc::new(TracingAnalytics);

    match &cli.command {
        Commands::Take {
            subjects,
            tags,
            count,
        } => {
            let config = ExamConfig::new(subjects.iter().copied(), tags.iter().cloned(), *count)?;

            let storage = open_storage(&cli).await?;
            let exams = ExamService::new(clock, Arc::clone(&storage.questions))
                .with_analytics(Arc::clone(&analytics));
            let mut flow = ExamFlow::new(exams);
            if let Some(results) = storage.results {
                flow = flow.with_history(results);
            }
            take::run(flow, config, analytics.as_ref()).await
        }
        Commands::Tags { subjects } => {
            let storage = open_storage(&cli).await?;
            let exams = ExamService::new(clock, storage.questions);
            let subjects: BTreeSet<Subject> = subjects.iter().copied().collect();
            let tags = exams
                .available_tags(&subjects)
                .await
                .map_err(|err| anyhow::anyhow!("Failed to load tags. Please try again. ({err})"))?;
            if tags.is_empty() {
                println!("No tags available for the selected subjects.");
            }
            for tag in tags {
                println!("{tag}");
            }
            Ok(())
        }
        Commands::History { limit } => {
            let storage = open_storage(&cli).await?;
            let Some(results) = storage.results else {
                bail!("history is only kept in the SQLite store");
            };
            let history = ResultHistoryService::new(results);
            let items = history.recent(*limit).await?;
            if items.is_empty() {
                println!("No exams taken yet.");
            }
            for item in items {
                println!(
                    "{}  {}  {:>5.1}%  {}/{}",
                    item.ended_at.format("%Y-%m-%d %H:%M"),
                    item.id,
                    item.percentage,
                    item.correct_answers,
                    item.total_questions
                );
            }
            Ok(())
        }
        Commands::Seed { per_subject } => {
            if cli.rest_url.is_some() {
                bail!("seed writes to SQLite; drop --rest-url");
            }
            let db_url = db::normalize_sqlite_url(&cli.db);
            db::prepare_sqlite_file(&db_url)?;
            let repo = SqliteRepository::connect(&db_url).await?;
            repo.migrate().await?;
            let written = seed::seed(&repo, *per_subject).await?;
            println!("seeded {written} questions into {db_url}");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err:#}");
        std::process::exit(2);
    }
}
