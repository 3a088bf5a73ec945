use anyhow::{bail, Context, Result};
use colored::Colorize;
use deadhang::prelude::*;
use deadhang::time::{format_clock, format_duration};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Runs one workout headlessly and prints its notices.
///
/// Usage: `deadhang-dev [TEMPLATE | REPS HANG REST PREP]`
#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    // 2. Load the configuration.
    let config_path = env::var_os("DEADHANG_CONFIG").map(PathBuf::from);
    let config = DeadhangConfig::load(config_path.as_deref())?;

    // 3. Pick the workout.
    let args: Vec<String> = env::args().skip(1).collect();
    let profile = profile_from_args(&args, &config)?;
    info!(
        "{} v{}: running '{}' ({} planned)",
        deadhang::ENGINE_NAME,
        deadhang::VERSION,
        profile.name,
        format_duration(Seconds::try_from(profile.estimated_total_seconds()).unwrap_or(Seconds::MAX))
    );

    // 4. Wire the coordinator to the shared clock.
    let service = ClockService::init_global(config.resolution);
    let coordinator = Coordinator::new(service.clone(), Arc::new(SilentAudio), config.audio.clone());
    coordinator.bind();

    let mut system_rx = service.subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            info!("[SYSTEM] => {:?}", event);
        }
    });

    // 5. Run until the workout finishes, faults or Ctrl+C.
    let mut notices = coordinator.subscribe_notices();
    coordinator.start_timer(profile)?;

    loop {
        tokio::select! {
            notice = notices.recv() => {
                let Ok(notice) = notice else { break };
                print_notice(&notice, &coordinator.state());
                if matches!(notice, WorkoutNotice::Finished { .. } | WorkoutNotice::Fault { .. }) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("{}", "Interrupted, stopping the workout.".yellow());
                coordinator.stop()?;
                break;
            }
        }
    }

    coordinator.unbind();
    service.terminate();
    Ok(())
}

fn profile_from_args(args: &[String], config: &DeadhangConfig) -> Result<WorkoutProfile> {
    match args {
        [] => {
            let template = find_template("beginner").context("missing beginner template")?;
            Ok(profile_from_template(template))
        }
        [name] => {
            if let Some(template) = find_template(name) {
                return Ok(profile_from_template(template));
            }
            config
                .profiles
                .iter()
                .find(|p| p.id == *name || p.name.eq_ignore_ascii_case(name))
                .cloned()
                .with_context(|| format!("no template or profile named '{}'", name))
        }
        [reps, hang, rest, prep] => Ok(WorkoutProfile::new(
            "Custom",
            reps.parse().context("REPS must be a whole number")?,
            parse_seconds(hang)?,
            parse_seconds(rest)?,
            parse_seconds(prep)?,
        )),
        _ => bail!("usage: deadhang-dev [TEMPLATE | REPS HANG REST PREP]"),
    }
}

fn parse_seconds(input: &str) -> Result<Seconds> {
    deadhang::time::parse_clock(input).with_context(|| format!("'{}' is not a time (SS or MM:SS)", input))
}

fn print_notice(notice: &WorkoutNotice, state: &TimerState) {
    let progress = format!("{:>5.1}%", state.elapsed_progress()).dimmed();
    match notice {
        WorkoutNotice::Started { profile, total_reps } => {
            println!("{} {} ({} reps)", "START".green().bold(), profile, total_reps)
        }
        WorkoutNotice::PhaseChanged { phase, rep, time_left } => println!(
            "{} {:<5} rep {}/{} {} {}",
            "PHASE".cyan().bold(),
            phase.label(),
            rep,
            state.total_reps,
            format_clock(*time_left),
            progress
        ),
        WorkoutNotice::RepAdvanced { rep } => println!("{} {}", "REP".blue(), rep),
        WorkoutNotice::Finished { total_elapsed } => println!(
            "{} after {}",
            "DONE".green().bold(),
            format_duration(*total_elapsed)
        ),
        WorkoutNotice::Fault { message } => println!("{} {}", "FAULT".red().bold(), message),
        other => println!("{:?}", other),
    }
}
