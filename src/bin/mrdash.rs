use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use mrdash::drilldown::Distribution;
use mrdash::metrics::TeamMetric;
use mrdash::{
    Config, ConfigLayer, ContributorMetric, Dashboard, Granularity, Period, RecordFilter, RecordMetric,
};

#[derive(Parser)]
#[command(name = "mrdash", about = "Merge request contributor and team dashboard")]
struct Cli {
    /// Snapshot path (default: data/data.json)
    #[arg(long)]
    data: Option<PathBuf>,

    /// Baseline configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override a setting, e.g. --set merged=12 or --set priority.critical=10
    #[arg(long = "set", value_name = "KEY=VALUE")]
    settings: Vec<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FilterArgs {
    /// Repository full path or short name
    #[arg(long)]
    repo: Option<String>,
    /// Team tag
    #[arg(long)]
    team: Option<String>,
    /// Author handle
    #[arg(long)]
    author: Option<String>,
}

impl FilterArgs {
    fn to_filter(&self) -> RecordFilter {
        let mut filter = RecordFilter::new();
        if let Some(repo) = &self.repo {
            filter = filter.repository(repo);
        }
        if let Some(team) = &self.team {
            filter = filter.team(team);
        }
        if let Some(author) = &self.author {
            filter = filter.author(author);
        }
        filter
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Rank contributors by score or another metric
    Leaderboard {
        /// Period: today, this-week, 2025-W05, 2025-01, 2025, 2025-01-01..2025-02-15
        #[arg(long)]
        period: Option<String>,
        /// Ranking metric (score, merged, comments, approvals, lines_changed, ...)
        #[arg(long, default_value = "score")]
        metric: String,
        /// Maximum rows
        #[arg(long, default_value = "20")]
        limit: usize,
        #[command(flatten)]
        filter: FilterArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Per-contributor breakdown, ordered by handle
    Contributors {
        #[arg(long)]
        period: Option<String>,
        #[command(flatten)]
        filter: FilterArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Team indicators with the trend against the previous period
    Team {
        #[arg(long, default_value = "this-month")]
        period: String,
        #[command(flatten)]
        filter: FilterArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record counts per calendar bucket
    Timeline {
        /// Limit the series to this period
        #[arg(long)]
        period: Option<String>,
        /// day, week, month or year (default: chosen from the span)
        #[arg(long)]
        granularity: Option<Granularity>,
        #[command(flatten)]
        filter: FilterArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Distribution, repository groups and top records for one measurement
    Drilldown {
        /// lines, lead-time, turnaround, comments or approvals
        metric: RecordMetric,
        #[arg(long)]
        period: Option<String>,
        #[command(flatten)]
        filter: FilterArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn overrides_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".mrdash").join("overrides.json"))
}

/// Built-in defaults, then the baseline file, then user overrides, then
/// `--set` assignments.
async fn load_config(baseline: Option<&Path>, settings: &[String]) -> anyhow::Result<Config> {
    let mut layers = Vec::new();
    if let Some(path) = baseline {
        layers.push(ConfigLayer::load(path).await?);
    }
    if let Some(path) = overrides_path().filter(|p| p.exists()) {
        log::info!("Applying user overrides from {}", path.display());
        layers.push(ConfigLayer::load(&path).await?);
    }
    if !settings.is_empty() {
        let mut cli_layer = ConfigLayer::default();
        for assignment in settings {
            cli_layer.set_assignment(assignment)?;
        }
        layers.push(cli_layer);
    }
    let refs: Vec<&ConfigLayer> = layers.iter().collect();
    Ok(Config::resolve(&refs))
}

fn parse_period(period: Option<&str>) -> anyhow::Result<Option<Period>> {
    Ok(period.map(Period::parse).transpose()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = load_config(cli.config.as_deref(), &cli.settings).await?;
    let data = cli.data.unwrap_or_else(|| PathBuf::from("data/data.json"));
    let dash = Dashboard::open_at(&data, config).await?;

    match cli.command {
        Commands::Leaderboard {
            period,
            metric,
            limit,
            filter,
            json,
        } => {
            let period = parse_period(period.as_deref())?;
            let metric: ContributorMetric = metric.parse()?;
            handle_leaderboard(&dash, &filter.to_filter(), period.as_ref(), metric, limit, json)?;
        }
        Commands::Contributors { period, filter, json } => {
            let period = parse_period(period.as_deref())?;
            handle_contributors(&dash, &filter.to_filter(), period.as_ref(), json)?;
        }
        Commands::Team { period, filter, json } => {
            let period = Period::parse(&period)?;
            handle_team(&dash, &filter.to_filter(), &period, json)?;
        }
        Commands::Timeline {
            period,
            granularity,
            filter,
            json,
        } => {
            let period = parse_period(period.as_deref())?;
            handle_timeline(&dash, &filter.to_filter(), period.as_ref(), granularity, json)?;
        }
        Commands::Drilldown {
            metric,
            period,
            filter,
            json,
        } => {
            let period = parse_period(period.as_deref())?;
            handle_drilldown(&dash, &filter.to_filter(), period.as_ref(), metric, json)?;
        }
    }

    Ok(())
}

fn handle_leaderboard(
    dash: &Dashboard,
    filter: &RecordFilter,
    period: Option<&Period>,
    metric: ContributorMetric,
    limit: usize,
    json: bool,
) -> anyhow::Result<()> {
    let mut board = dash.leaderboard(filter, period, metric);
    board.truncate(limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&board)?);
        return Ok(());
    }

    let scope = period.map_or_else(|| "all time".to_string(), |p| p.label());
    println!("Leaderboard by {metric} ({scope})");
    if board.is_empty() {
        println!("  No contributors");
    }
    for entry in &board {
        let s = &entry.summary;
        println!(
            "  {:>3}. {:<24} {:>8}   merged {:>3}  open {:>3}  comments {:>4}  approvals {:>3}",
            entry.rank,
            s.identity.name,
            format_value(entry.value),
            s.merged,
            s.open,
            s.comments,
            s.approvals
        );
    }
    Ok(())
}

fn handle_contributors(
    dash: &Dashboard,
    filter: &RecordFilter,
    period: Option<&Period>,
    json: bool,
) -> anyhow::Result<()> {
    let weights = &dash.config().weights;
    let summaries: Vec<_> = dash
        .contributors(filter, period)
        .iter()
        .map(|agg| mrdash::scoring::summarize(agg, weights))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    for s in &summaries {
        println!("{} (@{})", s.identity.name, s.identity.handle);
        println!("  Score:     {}", s.score);
        println!(
            "  Authored:  {} (merged {}, open {}, closed {})",
            s.authored, s.merged, s.open, s.closed
        );
        if let Some(rate) = s.merge_rate_pct {
            println!("  Merge rate: {rate:.0}%");
        }
        println!("  Lines:     +{} / -{}", s.additions, s.deletions);
        println!("  Comments:  {} ({} on own)", s.comments, s.comments_on_own);
        println!("  Approvals: {}", s.approvals);
    }
    Ok(())
}

fn handle_team(dash: &Dashboard, filter: &RecordFilter, period: &Period, json: bool) -> anyhow::Result<()> {
    let report = dash.team_report(filter, period);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Team: {}", report.current.label);
    if let Some(prev) = &report.previous {
        println!("  (compared with {})", prev.label);
    }
    let agg = &report.current.aggregate;
    for metric in TeamMetric::ALL {
        let trend = report
            .trends
            .iter()
            .find(|t| t.metric == metric)
            .map(|t| format!("  {}", t.trend.display()))
            .unwrap_or_default();
        println!("  {:<28} {:>10}{trend}", metric.label(), format_team_value(metric, metric.value(agg)));
    }
    Ok(())
}

fn handle_timeline(
    dash: &Dashboard,
    filter: &RecordFilter,
    period: Option<&Period>,
    granularity: Option<Granularity>,
    json: bool,
) -> anyhow::Result<()> {
    let timeline = dash.timeline(filter, granularity, period.map(|p| p.date_range()));

    if json {
        println!("{}", serde_json::to_string_pretty(&timeline)?);
        return Ok(());
    }

    println!("Timeline by {}", timeline.granularity);
    for b in &timeline.buckets {
        println!(
            "  {:<28} total {:>4}  merged {:>4}  open {:>4}  closed {:>4}",
            b.label(),
            b.counts.total(),
            b.counts.merged,
            b.counts.open,
            b.counts.closed
        );
    }
    Ok(())
}

fn handle_drilldown(
    dash: &Dashboard,
    filter: &RecordFilter,
    period: Option<&Period>,
    metric: RecordMetric,
    json: bool,
) -> anyhow::Result<()> {
    let dd = dash.drill_down(filter, period, metric);

    if json {
        println!("{}", serde_json::to_string_pretty(&dd)?);
        return Ok(());
    }

    println!("Drill-down: {metric}");
    match dd.distribution {
        Distribution::NoData => println!("  No data"),
        Distribution::Stats {
            min,
            p25,
            p50,
            p75,
            max,
            count,
        } => {
            println!("  Count:  {count}");
            println!("  Min:    {}", format_value(min));
            println!("  P25:    {}", format_value(p25));
            println!("  Median: {}", format_value(p50));
            println!("  P75:    {}", format_value(p75));
            println!("  Max:    {}", format_value(max));
        }
    }

    println!("  Repositories:");
    for g in &dd.groups {
        println!(
            "    {:<32} {:>4} records  {:>4} merged",
            g.name,
            g.records.len(),
            g.aggregate.throughput
        );
    }

    println!("  Top records:");
    for r in &dd.top {
        println!(
            "    {:>10}  {}  {}",
            format_value(r.value),
            r.record.id(),
            r.record.title
        );
    }
    Ok(())
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.1}")
    }
}

fn format_team_value(metric: TeamMetric, v: f64) -> String {
    match metric {
        TeamMetric::AiRate | TeamMetric::AiBreadth | TeamMetric::ReviewCoverage => {
            format!("{:.0}%", v * 100.0)
        }
        _ => format_value(v),
    }
}
