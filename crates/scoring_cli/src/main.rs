//! Scoring table CLI
//!
//! Schedules matches, runs the live match from the referee console and
//! reviews results. Notifications are written to stdout as JSON lines;
//! logs go to stderr.

mod console;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use scoring_core::config::RULES_PATH_ENV;
use scoring_core::models::{EventInput, MatchId, MatchSetup, MatchStatus, MatchType, TeamId};
use scoring_core::{
    BroadcastPublisher, MatchController, MemoryStore, Notification, RulesConfig, Store,
    TeamRegistration,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use console::ConsoleCommand;

#[derive(Parser)]
#[command(name = "scoring")]
#[command(about = "Robotics match scoring table", long_about = None)]
struct Cli {
    /// Store snapshot file
    #[arg(long, global = true, default_value = "scoring.store")]
    store: PathBuf,

    /// Rules file (YAML or JSON); falls back to $SCORING_RULES_PATH
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Print JSON instead of tables
    #[arg(long, global = true, default_value = "false")]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective rules
    Rules,
    /// Team registry
    #[command(subcommand)]
    Team(TeamCommand),
    /// Match schedule and live play
    #[command(subcommand)]
    Match(MatchCommand),
    /// Scoring event log
    #[command(subcommand)]
    Event(EventCommand),
    /// Ranking table
    #[command(subcommand)]
    Rankings(RankingsCommand),
}

#[derive(Subcommand)]
enum TeamCommand {
    /// Register a team
    Add {
        #[arg(long)]
        number: u32,
        #[arg(long)]
        name: String,
    },
    /// List teams
    List,
    /// Remove a team by number
    Remove {
        #[arg(long)]
        number: u32,
    },
}

#[derive(Args)]
struct SetupArgs {
    /// Match number
    #[arg(long)]
    number: u32,

    /// qualification, playoff or final
    #[arg(long, default_value = "qualification")]
    r#type: MatchType,

    /// Red team numbers, comma separated
    #[arg(long, value_delimiter = ',', num_args = 0..=2)]
    red: Vec<u32>,

    /// Blue team numbers, comma separated
    #[arg(long, value_delimiter = ',', num_args = 0..=2)]
    blue: Vec<u32>,
}

#[derive(Subcommand)]
enum MatchCommand {
    /// Schedule a match
    Create(SetupArgs),
    /// Change a scheduled match
    Edit {
        #[arg(long)]
        id: MatchId,
        #[command(flatten)]
        setup: SetupArgs,
    },
    /// List matches
    List {
        #[arg(long)]
        status: Option<MatchStatus>,
    },
    /// Start a match and read referee commands from stdin until it ends
    Run {
        #[arg(long)]
        id: MatchId,
    },
    /// Close review of a completed match
    Finalize {
        #[arg(long)]
        id: MatchId,
    },
    /// Emergency stop
    Stop {
        #[arg(long)]
        id: MatchId,
    },
    /// Delete a match and its events
    Delete {
        #[arg(long)]
        id: MatchId,
    },
    /// Delete every match and event
    Clear,
}

#[derive(Subcommand)]
enum EventCommand {
    /// List logged events
    List {
        #[arg(long = "match")]
        match_id: Option<MatchId>,
    },
    /// Delete an event, reversing its points
    Delete {
        #[arg(long)]
        id: u32,
    },
}

#[derive(Subcommand)]
enum RankingsCommand {
    /// Show the ranking table
    Show,
    /// Re-rank from stored points
    Recompute,
    /// Set a team's ranking points
    Set {
        #[arg(long)]
        team: u32,
        #[arg(long)]
        points: u32,
    },
    /// Zero every team's points
    Reset,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "scoring_core=debug,info" } else { "info" })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}

fn load_rules(path: Option<&PathBuf>) -> Result<RulesConfig> {
    let rules = match path {
        Some(path) => RulesConfig::load(path),
        None => RulesConfig::from_env(),
    };
    rules.with_context(|| format!("loading rules (--rules or ${RULES_PATH_ENV})"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let rules = load_rules(cli.rules.as_ref())?;
    if let Commands::Rules = cli.command {
        println!("{}", serde_json::to_string_pretty(&rules)?);
        return Ok(());
    }

    let store = Arc::new(
        MemoryStore::open(&cli.store)
            .with_context(|| format!("opening store {}", cli.store.display()))?,
    );
    let publisher = Arc::new(BroadcastPublisher::default());
    let controller = MatchController::new(store, publisher.clone(), rules);
    let out = Output { json: cli.json };

    match cli.command {
        Commands::Rules => Ok(()),
        Commands::Team(command) => team_command(&controller, &out, command),
        Commands::Match(command) => match_command(&controller, &publisher, &out, command).await,
        Commands::Event(command) => event_command(&controller, &out, command),
        Commands::Rankings(command) => rankings_command(&controller, &out, command),
    }
}

struct Output {
    json: bool,
}

impl Output {
    fn json<T: serde::Serialize + ?Sized>(&self, value: &T) -> Result<bool> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        Ok(self.json)
    }
}

fn team_id_by_number(controller: &MatchController, number: u32) -> Result<TeamId> {
    controller
        .teams()?
        .into_iter()
        .find(|team| team.number == number)
        .map(|team| team.id)
        .ok_or_else(|| anyhow!("no team with number {number}"))
}

fn team_number_by_id(controller: &MatchController, team_id: Option<TeamId>) -> String {
    let Some(team_id) = team_id else {
        return "-".to_string();
    };
    match controller.store().team(team_id) {
        Ok(Some(team)) => team.number.to_string(),
        _ => format!("?{team_id}"),
    }
}

fn resolve_setup(controller: &MatchController, args: SetupArgs) -> Result<MatchSetup> {
    let slots = |numbers: &[u32]| -> Result<[Option<TeamId>; 2]> {
        if numbers.len() > 2 {
            return Err(anyhow!("an alliance has at most two teams"));
        }
        let mut teams = [None, None];
        for (slot, number) in teams.iter_mut().zip(numbers) {
            *slot = Some(team_id_by_number(controller, *number)?);
        }
        Ok(teams)
    };
    Ok(MatchSetup {
        match_number: args.number,
        match_type: args.r#type,
        red_teams: slots(&args.red)?,
        blue_teams: slots(&args.blue)?,
    })
}

fn team_command(controller: &MatchController, out: &Output, command: TeamCommand) -> Result<()> {
    match command {
        TeamCommand::Add { number, name } => {
            let team = controller.register_team(TeamRegistration::new(number, name))?;
            if !out.json(&team)? {
                println!("registered team {} ({})", team.number, team.name);
            }
        }
        TeamCommand::List => {
            let teams = controller.teams()?;
            if !out.json(&teams)? {
                for team in teams {
                    println!("{:>6}  {}", team.number, team.name);
                }
            }
        }
        TeamCommand::Remove { number } => {
            controller.remove_team(team_id_by_number(controller, number)?)?;
            println!("removed team {number}");
        }
    }
    Ok(())
}

async fn match_command(
    controller: &MatchController,
    publisher: &BroadcastPublisher,
    out: &Output,
    command: MatchCommand,
) -> Result<()> {
    match command {
        MatchCommand::Create(args) => {
            let record = controller.create_match(resolve_setup(controller, args)?)?;
            if !out.json(&record)? {
                println!("scheduled {} match {} (id {})", record.match_type, record.match_number, record.id);
            }
        }
        MatchCommand::Edit { id, setup } => {
            let record = controller.update_match_setup(id, resolve_setup(controller, setup)?)?;
            println!("updated match {} (id {})", record.match_number, record.id);
        }
        MatchCommand::List { status } => {
            let matches = controller.matches(status)?;
            if !out.json(&matches)? {
                for record in matches {
                    let team = |slot| team_number_by_id(controller, slot);
                    println!(
                        "{:>4}  {:<13} #{:<3} {:<11} red {}/{} {:>4}  blue {}/{} {:>4}",
                        record.id,
                        record.match_type,
                        record.match_number,
                        record.status,
                        team(record.red_teams[0]),
                        team(record.red_teams[1]),
                        record.red.score,
                        team(record.blue_teams[0]),
                        team(record.blue_teams[1]),
                        record.blue.score,
                    );
                }
            }
        }
        MatchCommand::Finalize { id } => {
            controller.finalize_match(id)?;
            println!("match {id} finalized");
        }
        MatchCommand::Stop { id } => {
            controller.stop_match(id)?;
            println!("match {id} stopped");
        }
        MatchCommand::Delete { id } => {
            controller.delete_match(id)?;
            println!("match {id} deleted");
        }
        MatchCommand::Clear => {
            let count = controller.delete_all_matches()?;
            println!("deleted {count} matches");
        }
        MatchCommand::Run { id } => run_match(controller, publisher, id).await?,
    }
    Ok(())
}

fn event_command(controller: &MatchController, out: &Output, command: EventCommand) -> Result<()> {
    match command {
        EventCommand::List { match_id } => {
            let events = controller.events(match_id)?;
            if !out.json(&events)? {
                for event in events {
                    println!(
                        "{:>5}  match {:<4} {:<5} {:<14} {:>3}  {}",
                        event.id,
                        event.match_id,
                        event.alliance,
                        event.kind,
                        event.points,
                        event.timestamp.format("%H:%M:%S"),
                    );
                }
            }
        }
        EventCommand::Delete { id } => {
            let reversal = controller.delete_event(id)?;
            if reversal.clamped {
                warn!(event_id = id, "reversal was clamped at zero");
            }
            println!("event {id} deleted");
        }
    }
    Ok(())
}

fn rankings_command(controller: &MatchController, out: &Output, command: RankingsCommand) -> Result<()> {
    let table = match command {
        RankingsCommand::Show => controller.ranking_table()?,
        RankingsCommand::Recompute => controller.recompute_rankings()?,
        RankingsCommand::Set { team, points } => {
            controller.set_ranking_points(team_id_by_number(controller, team)?, points)?
        }
        RankingsCommand::Reset => controller.reset_rankings()?,
    };
    if !out.json(&table)? {
        for row in table {
            println!(
                "{:>3} {}  {:>6}  {:<24} {:>3} RP",
                row.rank,
                row.rank_change.symbol(),
                row.team_number,
                row.team_name,
                row.ranking_points
            );
        }
    }
    Ok(())
}

/// Start the match, then interleave notifications (stdout) with referee
/// commands (stdin) until the match completes or is stopped. Ctrl-C is an
/// emergency stop.
async fn run_match(
    controller: &MatchController,
    publisher: &BroadcastPublisher,
    match_id: MatchId,
) -> Result<()> {
    let mut notifications = publisher.subscribe();
    controller.start_match(match_id)?;
    info!(match_id, "match running; type referee commands, Ctrl-C to stop");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            received = notifications.recv() => match received {
                Ok(notification) => {
                    println!("{}", serde_json::to_string(&notification)?);
                    if matches!(notification, Notification::MatchEnded(_) | Notification::MatchStopped(_)) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "console fell behind notifications"),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    if let Err(e) = apply_console(controller, match_id, &line) {
                        warn!(error = %e, "command rejected: {}", line.trim());
                    }
                }
                None => stdin_open = false,
            },
            _ = tokio::signal::ctrl_c() => {
                warn!(match_id, "interrupted, stopping match");
                controller.stop_match(match_id)?;
            }
        }
    }
    Ok(())
}

fn apply_console(controller: &MatchController, match_id: MatchId, line: &str) -> Result<()> {
    match line.parse::<ConsoleCommand>()? {
        ConsoleCommand::Score { alliance, kind, points, team_number, details } => {
            let team_id = team_number.map(|n| team_id_by_number(controller, n)).transpose()?;
            let event =
                controller.record_event(match_id, alliance, kind, EventInput { points, team_id, details })?;
            info!(event_id = event.id, "logged {} {} for {} points", alliance, kind, event.points);
        }
        ConsoleCommand::Bonus(alliance) => {
            if !controller.activate_bonus(match_id, alliance)? {
                info!(%alliance, "bonus already active");
            }
        }
        ConsoleCommand::Override { alliance, score } => controller.override_score(match_id, alliance, score)?,
        ConsoleCommand::Delete(event_id) => {
            controller.delete_event(event_id)?;
        }
        ConsoleCommand::Pause => {
            controller.pause_for_fault()?;
        }
        ConsoleCommand::Resume => {
            controller.resume_from_fault()?;
        }
        ConsoleCommand::End => controller.end_match(match_id)?,
        ConsoleCommand::Stop => controller.stop_match(match_id)?,
    }
    Ok(())
}
