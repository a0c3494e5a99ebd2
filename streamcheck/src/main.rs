mod cli;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use serde::Serialize;
use tracing::{info, warn};

use streamcheck_core::{
    bootstrap::load_config, logging, FullReport, PullReport, PushReport, StreamChecker,
};

use cli::{Cli, Plan};

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Report {
    Pull(PullReport),
    Push(PushReport),
    Full(FullReport),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration, command-line flags win
    let mut config = load_config(cli.config.as_deref())?;
    cli.command.apply_overrides(&mut config);
    if let Some(level) = &cli.log_level {
        config.logging.level.clone_from(level);
    }

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;

    // 3. Validate targets; bad input prints usage and runs nothing
    let plan = match cli.command.plan(&config) {
        Ok(plan) => plan,
        Err(e) => {
            println!("Error: {e}");
            let mut command = Cli::command();
            if let Some(sub) = command.find_subcommand_mut(cli.command.name()) {
                sub.print_help()?;
            }
            return Ok(());
        }
    };

    if !cli.json {
        print_plan(&plan, &config.player.path);
    }

    let checker = StreamChecker::from_config(&config)?;
    info!(player = %config.player.path, "Starting {} check", cli.command.name());

    // Dropping the check on Ctrl-C kills any running player
    let report = tokio::select! {
        report = run(&checker, plan) => report,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping checks");
            return Ok(());
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

async fn run(checker: &StreamChecker, plan: Plan) -> Report {
    match plan {
        Plan::Pull { target, duration } => Report::Pull(checker.check_pull(&target, duration).await),
        Plan::Push { target } => Report::Push(checker.check_push(&target).await),
        Plan::LongPush { target } => Report::Push(checker.check_push_long(&target).await),
        Plan::Full {
            push,
            pull,
            duration,
        } => Report::Full(checker.full_test(push, pull, duration).await),
    }
}

fn print_plan(plan: &Plan, player: &str) {
    match plan {
        Plan::Pull { target, duration } => {
            println!("URL: {}", target.url());
            println!("Duration: {}", humantime::format_duration(*duration));
        }
        Plan::Push { target } | Plan::LongPush { target } => {
            println!("URL: {}", target.url());
        }
        Plan::Full {
            push,
            pull,
            duration,
        } => {
            println!("RTMP URL: {}", push.url());
            println!("HLS URL: {}", pull.url());
            println!("Duration: {}", humantime::format_duration(*duration));
        }
    }
    println!("Player: {player}");
}

fn print_push(report: &PushReport) {
    println!("RTMP server reachable: {}", report.reachable);
    println!("RTMP stream playable: {}", report.playable);
}

fn print_pull(report: &PullReport) {
    println!("HLS playlist available: {}", report.playlist_available);
    println!("HLS stream playable: {}", report.playable);
}

fn print_report(report: &Report) {
    match report {
        Report::Pull(report) => print_pull(report),
        Report::Push(report) => print_push(report),
        Report::Full(report) => {
            print_push(&report.push);
            print_pull(&report.pull);
            println!("All tests completed");
        }
    }
}
