use anyhow::Result;
use chrono::Duration;
use clap::Parser;
use deadwood_cache::ActivityCache;
use deadwood_core::config::AppConfig;
use deadwood_mastodon::MastodonClient;
use deadwood_sweep::{Console, Mode, SweepOptions, SweepReport, Sweeper, Tone};
use std::path::PathBuf;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;

const LONG_ABOUT: &str = "\
Goes through your followings and unfollows dead accounts.

It notices empty accounts, accounts that were deleted locally and remotely,
and also cleans up dead instances if allowed to. It keeps a cache, so you can
run it once without --unfollow to preview its actions, and a second time that
skips all verified active profiles.

Required API scopes:
    read:accounts read:follows read:statuses write:blocks write:follows";

#[derive(Parser, Debug)]
#[command(author, version, about = "deadwood - prune dead fediverse accounts", long_about = LONG_ABOUT)]
struct Args {
    /// Remove followings inactive for a given period (d for days, m for months, y for years)
    #[arg(long, value_parser = parse_time_ago, default_value = "1y")]
    min_activity: Duration,

    /// Stop once this many followings are left
    #[arg(long)]
    target_count: Option<u64>,

    /// Actually unfollow
    #[arg(long)]
    unfollow: bool,

    /// Instead of removing people you follow, remove people who follow YOU
    #[arg(long)]
    followers: bool,

    /// Remove people who follow you but that you don't follow
    #[arg(long)]
    unmutuals: bool,

    /// Display more things
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (default: ./deadwood.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write diagnostic logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// Ten thousand years, well inside the calendar range.
const MAX_DAYS: i64 = 10_000 * 365;

/// Parses `<N><unit>` where unit is d (day), m (30 days) or y (365 days).
fn parse_time_ago(value: &str) -> Result<Duration, String> {
    let value = value.trim().to_lowercase();
    let Some(unit) = value.chars().last() else {
        return Err("empty duration".to_string());
    };

    let days_per_unit = match unit {
        'y' => 365,
        'm' => 30,
        'd' => 1,
        _ => return Err(format!("unknown unit '{}' (expected d, m or y)", unit)),
    };
    let count: i64 = value[..value.len() - unit.len_utf8()]
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number of {}", value, unit))?;
    if count < 0 {
        return Err("duration cannot be negative".to_string());
    }

    count
        .checked_mul(days_per_unit)
        .filter(|days| *days <= MAX_DAYS)
        .and_then(Duration::try_days)
        .ok_or_else(|| "duration too large".to_string())
}

fn init_logging(args: &Args) -> Option<WorkerGuard> {
    let level = if args.verbose { Level::DEBUG } else { Level::WARN };

    if let Some(path) = &args.log_file {
        match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                let (non_blocking, guard) = tracing_appender::non_blocking(file);
                tracing_subscriber::fmt()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_max_level(level)
                    .init();
                return Some(guard);
            }
            Err(e) => eprintln!("⚠️ Cannot open log file {}: {}", path.display(), e),
        }
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_max_level(level)
        .init();
    None
}

fn print_summary(report: &SweepReport, apply: bool) {
    let mut console = Console::terminal();
    let verb = if apply { "removed" } else { "would remove" };
    console.say(
        Tone::Good,
        &format!(
            "Done: {}/{} checked, {} dead, {} {}, {} left",
            report.examined,
            report.total,
            report.dead.len(),
            verb,
            if apply { report.removed } else { report.dead.len() },
            report.remaining
        ),
    );
    if !report.failures.is_empty() {
        console.say(
            Tone::Failure,
            &format!("{} accounts could not be checked", report.failures.len()),
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = init_logging(&args);

    let config = match AppConfig::load_from(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("❌ Error: Configuration missing or invalid: {}", e);
            eprintln!("   Set DEADWOOD_ACCESS_TOKEN and DEADWOOD_API_BASE_URL (or use deadwood.toml / ~/.deadwood/.env).");
            std::process::exit(1);
        }
    };

    let options = SweepOptions {
        mode: Mode::from_flags(args.followers, args.unmutuals),
        min_activity: Some(args.min_activity),
        target_count: args.target_count,
        apply: args.unfollow,
        verbose: args.verbose,
    };

    let client = MastodonClient::new(&config.api_base_url, &config.access_token);
    let mut cache = ActivityCache::load(config.cache_path()).await;
    let policy = config.instance_policy();

    let report = Sweeper::new(&client, &mut cache, &policy, options, Console::terminal())
        .run()
        .await?;
    print_summary(&report, args.unfollow);

    Ok(())
}
