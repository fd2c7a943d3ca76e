//! Timetable Sync CLI
//!
//! Command-line tool for syncing a published timetable into SQLite and
//! querying the stored schedule.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use timetable_core::{
    fetch, parse_schedule, Lesson, SourceLocator, Store, SyncEngine, SyncHistory, SyncSummary,
    TimetableConfig, WeekType,
};
use tracing::{error, info, warn};

const DAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

#[derive(Parser)]
#[command(name = "timetable-cli")]
#[command(about = "Sync a published timetable into SQLite", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to timetable.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Source URL or CSV path, overriding the configured source
    #[arg(short, long, global = true)]
    source: Option<String>,

    /// Database file, overriding the configured path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync pass
    Sync,

    /// Run a sync pass now and then on every interval until Ctrl-C
    Watch {
        /// Seconds between passes (defaults to sync.interval_secs)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Fetch and parse the source without touching the database
    Parse {
        /// Only show this group
        #[arg(short, long)]
        group: Option<String>,

        /// Print parsed lessons as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored groups
    Groups,

    /// Show stored lessons of a group
    Lessons {
        /// Group name
        #[arg(short, long)]
        group: String,

        /// Weekday, Monday = 1
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=7))]
        day: Option<u8>,

        /// numerator or denominator
        #[arg(short, long, default_value = "numerator")]
        week: WeekType,
    },

    /// Show recent sync passes
    History {
        /// Number of passes to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timetable_core=info,timetable_cli=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> timetable_core::Result<()> {
    let cli = Cli::parse();

    let mut config = TimetableConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database.path = db;
    }
    if let Some(source) = cli.source {
        override_source(&mut config, SourceLocator::parse(&source));
    }

    match cli.command {
        Commands::Sync => cmd_sync(&config).await,
        Commands::Watch { interval } => cmd_watch(&config, interval).await,
        Commands::Parse { group, json } => cmd_parse(&config, group.as_deref(), json).await,
        Commands::Groups => cmd_groups(&config),
        Commands::Lessons { group, day, week } => cmd_lessons(&config, &group, day, week),
        Commands::History { limit } => cmd_history(&config, limit),
    }
}

/// `--source` wins over every configured locator
fn override_source(config: &mut TimetableConfig, source: SourceLocator) {
    config.source.url = None;
    config.source.sheet_id = None;
    config.source.path = None;
    match source {
        SourceLocator::Url(url) => config.source.url = Some(url),
        SourceLocator::Path(path) => config.source.path = Some(path),
    }
}

async fn cmd_sync(config: &TimetableConfig) -> timetable_core::Result<()> {
    let engine = SyncEngine::from_config(config)?;
    let summary = engine.run_sync_pass().await?;

    print_summary(&summary);
    record_history(config, &summary);

    Ok(())
}

async fn cmd_watch(
    config: &TimetableConfig,
    interval: Option<u64>,
) -> timetable_core::Result<()> {
    let engine = SyncEngine::from_config(config)?;
    let secs = interval.unwrap_or(config.sync.interval_secs).max(1);
    info!(source = %engine.source(), interval_secs = secs, "watching timetable source");

    let mut ticker = tokio::time::interval(Duration::from_secs(secs));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match engine.run_sync_pass().await {
                    Ok(summary) => record_history(config, &summary),
                    // Retried on the next tick
                    Err(e) => error!(kind = ?e.kind(), "sync pass failed: {e}"),
                }
                info!(next_in_secs = secs, "waiting for next pass");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}

async fn cmd_parse(
    config: &TimetableConfig,
    group: Option<&str>,
    json: bool,
) -> timetable_core::Result<()> {
    let source = config.source.locator()?;
    let grid = fetch(&source, &config.source.grid_options()).await?;
    let mut parsed = parse_schedule(&grid, &config.layout, &source.to_string())?;

    if let Some(name) = group {
        parsed.groups.retain(|g| g.group == name);
        if parsed.groups.is_empty() {
            return Err(timetable_core::Error::GroupNotFound(name.to_string()));
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&parsed)?);
        return Ok(());
    }

    println!("Source: {}", source);
    println!("Rows: {}  Columns: {}", grid.row_count(), grid.width());
    println!(
        "Groups: {}  Lessons: {}  Skipped pairs: {}",
        parsed.groups.len(),
        parsed.lesson_count(),
        parsed.skipped.total()
    );

    for extraction in &parsed.groups {
        println!();
        println!("{} ({} lessons)", extraction.group, extraction.lessons.len());

        let mut lessons: Vec<_> = extraction.lessons.iter().collect();
        lessons.sort_by_key(|l| l.key);
        for lesson in lessons {
            println!(
                "  {} {:<11} {}",
                day_name(lesson.key.week_day),
                lesson.key.week_type.as_str(),
                format_details(lesson.key.lesson_number, &lesson.details)
            );
        }
    }

    Ok(())
}

fn cmd_groups(config: &TimetableConfig) -> timetable_core::Result<()> {
    let store = Store::open(&config.database.path)?;
    let groups = store.list_groups()?;

    println!("Groups ({}):", groups.len());
    for group in &groups {
        println!("  {}", group.name);
    }

    Ok(())
}

fn cmd_lessons(
    config: &TimetableConfig,
    group: &str,
    day: Option<u8>,
    week: WeekType,
) -> timetable_core::Result<()> {
    let store = Store::open(&config.database.path)?;
    let lessons = store.lessons_for_group(group, day, week)?;

    println!("{} ({} week)", group, week);
    if lessons.is_empty() {
        println!("  no lessons");
        return Ok(());
    }

    let mut current_day = None;
    for lesson in &lessons {
        if current_day != Some(lesson.key.week_day) {
            current_day = Some(lesson.key.week_day);
            println!();
            println!("{}:", day_name(lesson.key.week_day));
        }
        print_lesson(lesson);
    }

    Ok(())
}

fn cmd_history(config: &TimetableConfig, limit: usize) -> timetable_core::Result<()> {
    let history = SyncHistory::load(&config.sync.history_path)?;

    if history.entries.is_empty() {
        println!("No sync passes recorded in {}", config.sync.history_path.display());
        return Ok(());
    }

    println!("Recent passes (newest first):");
    for summary in history.recent(limit) {
        let c = &summary.changes;
        println!(
            "  {}  {:>5}ms  groups +{} -{}  lessons +{} ~{} -{}  skipped {}",
            summary.finished_at.format("%Y-%m-%d %H:%M:%S"),
            summary.elapsed_ms(),
            c.groups_created,
            c.groups_deleted,
            c.lessons_inserted,
            c.lessons_updated,
            c.lessons_deleted,
            summary.skipped.total()
        );
    }

    Ok(())
}

fn record_history(config: &TimetableConfig, summary: &SyncSummary) {
    let path = &config.sync.history_path;
    let result = SyncHistory::load(path).and_then(|mut history| {
        history.record(summary.clone(), config.sync.history_limit);
        history.save(path)
    });
    if let Err(e) = result {
        warn!(path = %path.display(), "could not record sync history: {e}");
    }
}

fn print_summary(summary: &SyncSummary) {
    let c = &summary.changes;
    println!("Synced {} in {}ms", summary.source, summary.elapsed_ms());
    println!(
        "  groups:  {} seen, {} created, {} deleted",
        summary.groups_seen, c.groups_created, c.groups_deleted
    );
    println!(
        "  lessons: {} parsed, {} inserted, {} updated, {} deleted, {} unchanged",
        summary.lessons_parsed,
        c.lessons_inserted,
        c.lessons_updated,
        c.lessons_deleted,
        c.lessons_unchanged
    );

    let s = &summary.skipped;
    if s.total() > 0 {
        println!(
            "  skipped: {} unknown weekday, {} unknown lesson number, {} unknown week type, {} duplicate",
            s.unknown_weekday, s.unknown_lesson_number, s.unknown_week_type, s.duplicate_key
        );
    }
    if summary.is_noop() {
        println!("  no changes");
    }
}

fn print_lesson(lesson: &Lesson) {
    println!(
        "  {}",
        format_details(lesson.key.lesson_number, &lesson.details)
    );
}

fn format_details(number: u8, details: &timetable_core::LessonDetails) -> String {
    format!(
        "{}. {} | {} - {} | {} | {}",
        number,
        details.subject,
        details.start_time.as_deref().unwrap_or("--:--"),
        details.end_time.as_deref().unwrap_or("--:--"),
        details.teacher.as_deref().unwrap_or("-"),
        details.room.as_deref().unwrap_or("-")
    )
}

fn day_name(week_day: u8) -> &'static str {
    DAY_NAMES
        .get(usize::from(week_day).wrapping_sub(1))
        .copied()
        .unwrap_or("?")
}
