//! Derby CLI - run simulated races and wager on them from the terminal

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tokio::runtime::Runtime;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use derby::config::ArenaConfig;
use derby::core::{MovementPolicy, StakeOutcome};
use derby::models::{LedgerSnapshot, RaceSnapshot};
use derby::simulation::{RaceReport, Season};

/// Columns used to draw one lane
const TRACK_WIDTH: usize = 50;

#[derive(Parser)]
#[command(name = "derby")]
#[command(author, version, about = "Race simulation and wagering CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Run in interactive mode
    #[arg(short, long)]
    interactive: bool,

    /// Arena configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Season seed
    #[arg(long)]
    seed: Option<u64>,

    /// Race distance
    #[arg(long)]
    distance: Option<u32>,

    /// Movement policy: stepwise or gallop
    #[arg(long)]
    policy: Option<MovementPolicy>,

    /// Milliseconds between ticks when watching a race
    #[arg(long)]
    tick_delay: Option<u64>,

    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one or more races
    Run {
        /// Number of races
        #[arg(short = 'n', long, default_value_t = 1)]
        races: u32,

        /// Stake placed before every race, as actor:contestant:amount
        #[arg(short, long = "stake", value_parser = parse_stake)]
        stakes: Vec<StakeArg>,

        /// Draw the lanes live while each race runs
        #[arg(short, long)]
        watch: bool,
    },

    /// Show odds and lifetime statistics of the roster
    Standings,
}

#[derive(Debug, Clone, PartialEq)]
struct StakeArg {
    actor: String,
    contestant: String,
    amount: f64,
}

fn parse_stake(s: &str) -> Result<StakeArg, String> {
    let parts: Vec<&str> = s.splitn(3, ':').collect();
    let [actor, contestant, amount] = parts.as_slice() else {
        return Err(format!("expected actor:contestant:amount, got '{}'", s));
    };
    let amount: f64 = amount
        .trim()
        .parse()
        .map_err(|_| format!("invalid stake amount '{}'", amount))?;
    Ok(StakeArg {
        actor: actor.trim().to_string(),
        contestant: contestant.trim().to_string(),
        amount,
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    println!("{}", "Derby CLI v0.1.0".cyan().bold());
    println!();

    let config = load_config(&cli)?;
    let mut season = Season::new(config).context("Failed to set up the season")?;
    let runtime = Runtime::new().context("Failed to start async runtime")?;

    if cli.interactive {
        run_interactive(&mut season, &runtime)?;
    } else if let Some(command) = cli.command {
        match command {
            Commands::Run {
                races,
                stakes,
                watch,
            } => {
                run_races(&mut season, &runtime, races, &stakes, watch)?;
            }
            Commands::Standings => {
                print_standings(&season);
            }
        }
    } else {
        println!("Use --help for usage information or --interactive for interactive mode.");
    }

    Ok(())
}

fn init_logging(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")
}

/// Config file (or defaults) with command-line overrides applied
fn load_config(cli: &Cli) -> Result<ArenaConfig> {
    let mut config = match &cli.config {
        Some(path) => ArenaConfig::load(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => ArenaConfig::default(),
    };

    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(distance) = cli.distance {
        config.distance = distance;
    }
    if let Some(policy) = cli.policy {
        config.movement = policy;
    }
    if let Some(delay) = cli.tick_delay {
        config.tick_delay_ms = delay;
    }

    config.validate().context("Invalid arena configuration")?;
    Ok(config)
}

fn run_races(season: &mut Season, runtime: &Runtime, races: u32, stakes: &[StakeArg], watch: bool) -> Result<()> {
    println!(
        "{} {} race(s) over distance {} ({:?}, seed {})",
        "Running".green(),
        races,
        season.config().distance,
        season.config().movement,
        season.config().seed
    );
    println!();

    let pb = if watch {
        None
    } else {
        let pb = ProgressBar::new(races as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .context("Invalid progress template")?,
        );
        Some(pb)
    };

    for _ in 0..races {
        for stake in stakes {
            let placed = season.place_stake(&stake.actor, &stake.contestant, stake.amount);
            let line = match placed {
                Ok(_) => format!(
                    "{} staked {:.2} on {}",
                    stake.actor, stake.amount, stake.contestant
                )
                .normal(),
                Err(e) => format!("Stake by {} rejected: {}", stake.actor, e).red(),
            };
            match &pb {
                Some(pb) => pb.println(line.to_string()),
                None => println!("{}", line),
            }
        }

        let report = if watch {
            match runtime.block_on(watch_race(season))? {
                Some(report) => report,
                None => break,
            }
        } else {
            season.run_race().context("Race failed")?
        };

        match &pb {
            Some(pb) => {
                pb.set_message(format!(
                    "winner: {}",
                    report.outcome.winner_name.as_deref().unwrap_or("none")
                ));
                pb.suspend(|| print_report(season, &report));
                pb.inc(1);
            }
            None => print_report(season, &report),
        }
    }

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    print_standings(season);
    Ok(())
}

/// Drive one race in the background, drawing every tick. Ctrl-C cancels it.
async fn watch_race(season: &mut Season) -> Result<Option<RaceReport>> {
    let mut snapshots = season.start_race().await?;

    loop {
        tokio::select! {
            snapshot = snapshots.recv() => match snapshot {
                Some(snapshot) => render_lanes(&snapshot),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                season.cancel_race().await?;
                println!("{}", "Race cancelled.".yellow());
                return Ok(None);
            }
        }
    }

    let report = season.finish_race().await.context("Race failed")?;
    Ok(Some(report))
}

fn render_lanes(snapshot: &RaceSnapshot) {
    // Clear screen, cursor home
    print!("\x1B[2J\x1B[1;1H");
    println!(
        "{} {}   {} {}",
        "Tick".bold(),
        snapshot.tick,
        "State".bold(),
        snapshot.state
    );
    println!();

    let scale = TRACK_WIDTH as f64 / snapshot.distance as f64;
    let column = |position: f64| ((position * scale) as usize).min(TRACK_WIDTH);

    for (lane, c) in snapshot.contestants.iter().enumerate() {
        let mut cells = vec!['.'; TRACK_WIDTH + 1];
        for item in snapshot.bonus_items.iter().filter(|i| i.lane == lane) {
            cells[column(item.position)] = '*';
        }

        let at = column(c.progress);
        let before: String = cells[..at].iter().collect();
        let after: String = cells[at + 1..].iter().collect();
        let symbol = c.symbol.to_string();
        let (symbol, status) = if c.fallen {
            (symbol.red().bold(), "fallen".red())
        } else if c.finished {
            (symbol.green().bold(), "finished".green())
        } else {
            (symbol.cyan().bold(), "".normal())
        };

        println!(
            "{:<10} |{}{}{}| {:>6.1} {}",
            truncate_name(&c.name, 10),
            before.yellow(),
            symbol,
            after.yellow(),
            c.progress,
            status
        );
    }
}

fn print_report(season: &Season, report: &RaceReport) {
    println!(
        "{} {} ({} ticks, seed {}): {}",
        "Race".yellow().bold(),
        report.record.race_number,
        report.record.ticks,
        report.record.seed,
        match &report.outcome.winner_name {
            Some(name) => format!("{} wins", name).green().bold(),
            None => "no winner".red(),
        }
    );
    print_ledger(season, &report.ledger);
    println!();
}

fn print_ledger(season: &Season, ledger: &LedgerSnapshot) {
    println!(
        "{:<12} {:>10} {:>6} {:>8} {:>10} {:<12}",
        "Actor", "Funds", "Wins", "Win %", "Earnings", "Pending"
    );
    println!("{}", "-".repeat(64));
    for a in &ledger.actors {
        let pending = a
            .pending_on
            .and_then(|id| season.roster().get(id.0))
            .map(|c| c.name())
            .unwrap_or("-");
        println!(
            "{:<12} {:>10.2} {:>6} {:>7.1}% {:>10.2} {:<12}",
            truncate_name(&a.name, 12),
            a.funds,
            a.triumphs,
            a.win_percentage,
            a.total_earnings,
            pending
        );
    }
}

fn print_standings(season: &Season) {
    println!("{}", "Standings:".yellow().bold());
    println!(
        "{:<12} {:>3} {:>6} {:>5} {:>6} {:>9} {:>9} {:>6}",
        "Name", "Sym", "Skill", "Wins", "Races", "Aptitude", "Best", "Odds"
    );
    println!("{}", "-".repeat(64));
    for row in season.standings() {
        let best = row
            .best_time
            .map(|t| format!("{:.2}", t))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<12} {:>3} {:>6.2} {:>5} {:>6} {:>9.2} {:>9} {:>6.2}",
            truncate_name(&row.name, 12),
            row.symbol,
            row.skill,
            row.triumphs,
            row.races_run,
            row.aptitude,
            best,
            row.odds
        );
    }
    println!();
}

fn print_history(season: &Season, actor: &str) -> Result<()> {
    let entry = season
        .ledger()
        .actor_by_name(actor)
        .with_context(|| format!("Unknown actor {}", actor))?;
    let contestant_name = |id: derby::ContestantId| {
        season
            .roster()
            .get(id.0)
            .map(|c| c.name().to_string())
            .unwrap_or_else(|| id.to_string())
    };

    println!("{} {}", "Stake history for".yellow().bold(), entry.name());
    println!(
        "{:>4} {:<9} {:<12} {:>8} {:<9} {:>9}",
        "#", "Time", "Contestant", "Amount", "Result", "Earnings"
    );
    println!("{}", "-".repeat(56));
    let pending = entry.pending_stake().map(|s| s.sequence);
    for stake in entry.stakes() {
        let result = match stake.outcome {
            Some(StakeOutcome::Win) => "won".green(),
            Some(StakeOutcome::Loss) => "lost".red(),
            None if Some(stake.sequence) == pending => "pending".cyan(),
            None => "replaced".dimmed(),
        };
        println!(
            "{:>4} {:<9} {:<12} {:>8.2} {:<9} {:>9.2}",
            stake.sequence,
            stake.placed_at.format("%H:%M:%S"),
            truncate_name(&contestant_name(stake.contestant), 12),
            stake.amount,
            result,
            stake.earnings
        );
    }

    let metrics = season.actor_metrics(actor)?;
    println!();
    println!(
        "Hit rate: {:.1}%  Staked: {:.2}  Returned: {:.2}  Net: {:.2}  ROI: {:.1}%  Replaced: {}",
        metrics.hit_rate * 100.0,
        metrics.total_staked,
        metrics.total_returned,
        metrics.net_profit,
        metrics.roi * 100.0,
        metrics.forfeited_stakes
    );

    let breakdown = season.actor_breakdown(actor)?;
    if !breakdown.is_empty() {
        println!("\n{}", "By contestant:".yellow().bold());
        println!(
            "{:<12} {:>7} {:>6} {:>9} {:>10} {:>8}",
            "Contestant", "Stakes", "Wins", "Hit Rate", "Profit", "ROI"
        );
        println!("{}", "-".repeat(56));
        for b in &breakdown {
            println!(
                "{:<12} {:>7} {:>6} {:>8.1}% {:>10.2} {:>7.1}%",
                truncate_name(&contestant_name(b.contestant), 12),
                b.stakes,
                b.wins,
                b.hit_rate * 100.0,
                b.profit,
                b.roi * 100.0
            );
        }
    }
    println!();
    Ok(())
}

fn run_interactive(season: &mut Season, runtime: &Runtime) -> Result<()> {
    println!("{}", "Interactive mode".green().bold());
    println!();

    let theme = ColorfulTheme::default();
    let actor_names: Vec<String> = season
        .ledger()
        .actors()
        .iter()
        .map(|a| a.name().to_string())
        .collect();

    loop {
        let options = vec![
            "Place a stake",
            "Run a race",
            "Watch a race",
            "Standings",
            "Ledger",
            "Stake history",
            "Quit",
        ];

        let selection = Select::with_theme(&theme)
            .with_prompt("What would you like to do?")
            .items(&options)
            .default(0)
            .interact()?;

        match selection {
            0 => {
                if actor_names.is_empty() {
                    println!("{}", "No actors configured.".yellow());
                    continue;
                }
                let actor = Select::with_theme(&theme)
                    .with_prompt("Actor")
                    .items(&actor_names)
                    .default(0)
                    .interact()?;

                let board = season.odds_board();
                let contestants: Vec<String> = season
                    .roster()
                    .iter()
                    .map(|c| format!("{} (odds {:.2})", c.name(), board.get(c.id()).unwrap_or(1.0)))
                    .collect();
                let contestant = Select::with_theme(&theme)
                    .with_prompt("Contestant")
                    .items(&contestants)
                    .default(0)
                    .interact()?;

                let amount: f64 = Input::with_theme(&theme)
                    .with_prompt("Amount")
                    .interact_text()?;

                let name = season.roster()[contestant].name().to_string();
                match season.place_stake(&actor_names[actor], &name, amount) {
                    Ok(stake) => println!(
                        "{} {:.2} on {}",
                        "Stake placed:".green(),
                        stake.amount,
                        name
                    ),
                    Err(e) => println!("{}", format!("Stake rejected: {}", e).red()),
                }
                println!();
            }
            1 => {
                let report = season.run_race().context("Race failed")?;
                println!();
                print_report(season, &report);
            }
            2 => {
                if let Some(report) = runtime.block_on(watch_race(season))? {
                    println!();
                    print_report(season, &report);
                }
            }
            3 => {
                println!();
                print_standings(season);
            }
            4 => {
                println!();
                print_ledger(season, &season.ledger().snapshot());
                println!();
            }
            5 => {
                if actor_names.is_empty() {
                    println!("{}", "No actors configured.".yellow());
                    continue;
                }
                let actor = Select::with_theme(&theme)
                    .with_prompt("Actor")
                    .items(&actor_names)
                    .default(0)
                    .interact()?;
                println!();
                print_history(season, &actor_names[actor])?;
            }
            6 => {
                println!("Goodbye!");
                break;
            }
            _ => {}
        }
    }

    Ok(())
}

/// Truncate name to fit display width
fn truncate_name(name: &str, max_len: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= max_len {
        name.to_string()
    } else {
        chars[..max_len - 1].iter().collect::<String>() + "…"
    }
}
