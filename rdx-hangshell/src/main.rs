use anyhow::Result;
use colored::Colorize;
use deadhang::prelude::*;
use deadhang::components::sequencer::phase_duration;
use deadhang::time::{format_clock, format_duration, parse_clock, time_progress};
use deadhang::{ENGINE_NAME, VERSION as LIB_VERSION};
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_CONFIG: &str = "hangshell.toml";

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct CommandHighlighter;

impl Highlighter for CommandHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            Cow::Owned(format!("{} {}", command.yellow().bold(), rest.yellow()))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }
    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

/// Rings the terminal bell: once for most cues, twice for start and end.
struct TerminalBell;

impl AudioSink for TerminalBell {
    fn play(&self, cue: AudioCue) -> anyhow::Result<()> {
        let rings = match cue {
            AudioCue::Start | AudioCue::End => "\x07\x07",
            _ => "\x07",
        };
        let mut out = std::io::stdout();
        out.write_all(rings.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    const LOGO_TEXT: &str = include_str!("../logo.log");
    println!("{}", LOGO_TEXT.cyan());

    let rule = "-".repeat(72);
    println!("{}", rule.dimmed());
    println!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    let license_blurb = "
    This software is provided 'as is', without warranty of any kind.
    Distributed under the MIT OR Apache-2.0 license. Use at your own risk.
    ";
    println!("{}", license_blurb.dimmed());
    println!("{}", rule.dimmed());
}

/// Prints workout notices, and the live countdown while `watching` is set.
fn spawn_renderers(coordinator: &Coordinator, watching: Arc<AtomicBool>) {
    let mut notices = coordinator.subscribe_notices();
    let notice_coordinator = coordinator.clone();
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            let state = notice_coordinator.state();
            println!("\n<-- {}", describe_notice(&notice, &state));
        }
    });

    let mut state_rx = coordinator.subscribe_state();
    tokio::spawn(async move {
        let mut last_shown = None;
        while state_rx.changed().await.is_ok() {
            let state = state_rx.borrow_and_update().clone();
            if !watching.load(Ordering::Relaxed) || !state.is_running() {
                continue;
            }
            let shown = (state.current_phase, state.current_rep, state.time_left);
            if last_shown != Some(shown) {
                println!(
                    "<-- [{}] {} {:>3.0}%",
                    state.current_phase.label(),
                    format_clock(state.time_left),
                    phase_progress(&state)
                );
                last_shown = Some(shown);
            }
        }
    });
}

fn describe_notice(notice: &WorkoutNotice, state: &TimerState) -> String {
    match notice {
        WorkoutNotice::Started { profile, total_reps } => {
            format!("{} '{}' with {} reps", "Started".green().bold(), profile, total_reps)
        }
        WorkoutNotice::PhaseChanged { phase, rep, time_left } => format!(
            "{} {} of rep {}/{} for {}",
            "Phase".cyan().bold(),
            phase,
            rep,
            state.total_reps,
            format_duration(*time_left)
        ),
        WorkoutNotice::RepAdvanced { rep } => format!("{} {}", "Rep".blue().bold(), rep),
        WorkoutNotice::Paused => "Paused".yellow().to_string(),
        WorkoutNotice::Resumed => "Resumed".green().to_string(),
        WorkoutNotice::Stopped => "Stopped".yellow().to_string(),
        WorkoutNotice::Reset => "Reset".yellow().to_string(),
        WorkoutNotice::Finished { total_elapsed } => format!(
            "{} in {}",
            "Workout complete".green().bold(),
            format_duration(*total_elapsed)
        ),
        WorkoutNotice::Fault { message } => format!("{} {}", "Error:".red().bold(), message),
    }
}

fn print_status(state: &TimerState) {
    let Some(profile) = &state.workout_profile else {
        println!("Status: {:?}, no workout loaded.", state.status);
        return;
    };
    println!("Workout:  {}", profile.name.bold());
    println!("Status:   {:?}", state.status);
    println!(
        "Phase:    {} ({} left, {:.0}% done)",
        state.current_phase,
        format_clock(state.time_left),
        phase_progress(state)
    );
    println!("Rep:      {}/{}", state.current_rep, state.total_reps);
    println!(
        "Progress: {:.0}% by phase, {:.0}% by time ({} elapsed)",
        state.progress(),
        state.elapsed_progress(),
        format_duration(state.total_elapsed_time)
    );
}

/// How far into the current phase the workout is. A hang is timed by the rep
/// it was entered from.
fn phase_progress(state: &TimerState) -> f64 {
    let Some(profile) = &state.workout_profile else {
        return 0.0;
    };
    let rep = match state.current_phase {
        Phase::Hang => state.current_rep.saturating_sub(1).max(1),
        _ => state.current_rep,
    };
    time_progress(state.time_left, phase_duration(state.current_phase, rep, profile))
}

fn print_templates() {
    println!("Templates:");
    for template in TEMPLATES.iter() {
        let profile = profile_from_template(template);
        println!(
            "  {:<13} {} x {}s hang / {}s rest, ~{}  {}",
            template.id,
            template.repetitions,
            template.hang,
            template.rest,
            format_duration(Seconds::try_from(profile.estimated_total_seconds()).unwrap_or(Seconds::MAX)),
            template.description.dimmed()
        );
    }
}

fn print_profiles(config: &DeadhangConfig) {
    if config.profiles.is_empty() {
        println!("No profiles configured. Add [[profiles]] to {}.", DEFAULT_CONFIG);
        return;
    }
    println!("Profiles:");
    for profile in &config.profiles {
        println!(
            "  {:<13} {} reps, start pause {}s  {}",
            profile.name,
            profile.repetitions,
            profile.start_pause,
            profile.description.as_deref().unwrap_or("").dimmed()
        );
    }
}

/// Resolves `start` arguments into a profile.
fn parse_start(args: &[&str], config: &DeadhangConfig) -> Result<WorkoutProfile, String> {
    match args {
        [name] => find_template(name)
            .map(profile_from_template)
            .or_else(|| {
                config
                    .profiles
                    .iter()
                    .find(|p| p.id == *name || p.name.eq_ignore_ascii_case(name))
                    .cloned()
            })
            .ok_or_else(|| format!("No template or profile named '{}'.", name)),
        [reps, hang, rest, prep] => {
            let reps: u32 = reps
                .parse()
                .map_err(|_| format!("'{}' is not a number of reps.", reps))?;
            let seconds = |s: &str| parse_clock(s).ok_or_else(|| format!("'{}' is not a time (SS or MM:SS).", s));
            Ok(WorkoutProfile::new(
                "Custom",
                reps,
                seconds(*hang)?,
                seconds(*rest)?,
                seconds(*prep)?,
            ))
        }
        _ => Err("Usage: start <template> | start <reps> <hang> <rest> <prep>".to_string()),
    }
}

fn report(result: Result<(), CoordinatorError>) {
    if let Err(e) = result {
        println!("{} {}", "Error:".red().bold(), e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let config_path = env::var_os("DEADHANG_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = DeadhangConfig::load(Some(config_path.as_path()))?;

    let service = ClockService::init_global(config.resolution);
    let coordinator = Coordinator::new(service.clone(), Arc::new(TerminalBell), config.audio.clone());
    coordinator.bind();
    info!("{} bound to the clock", ENGINE_NAME);

    let watching = Arc::new(AtomicBool::new(false));
    spawn_renderers(&coordinator, watching.clone());

    let mut rl = Editor::new()?;
    rl.set_helper(Some(CommandHighlighter));

    println!("{} is ready. Type 'help' for commands or 'exit' to quit.", ENGINE_NAME.cyan());

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        match rl.readline(&prompt) {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let args = line.split_whitespace().collect::<Vec<_>>();
                let Some((command, rest)) = args.split_first() else {
                    continue;
                };
                match *command {
                    "templates" => print_templates(),
                    "profiles" => print_profiles(&config),
                    "start" => match parse_start(rest, &config) {
                        Ok(profile) => report(coordinator.start_timer(profile)),
                        Err(message) => println!("{}", message),
                    },
                    "pause" => report(coordinator.pause()),
                    "resume" => report(coordinator.resume()),
                    "stop" => report(coordinator.stop()),
                    "reset" => report(coordinator.reset()),
                    "status" => print_status(&coordinator.state()),
                    "watch" => match rest.first() {
                        Some(&"on") => {
                            watching.store(true, Ordering::Relaxed);
                            println!("--> Showing the live countdown.");
                        }
                        Some(&"off") => {
                            watching.store(false, Ordering::Relaxed);
                            println!("--> Live countdown hidden.");
                        }
                        _ => println!("Usage: watch on|off"),
                    },
                    "help" => {
                        println!("Available commands:");
                        println!("  templates                       - Lists the built-in workouts.");
                        println!("  profiles                        - Lists profiles from the config file.");
                        println!("  start <name>                    - Starts a template or profile.");
                        println!("  start <reps> <hang> <rest> <prep> - Starts a custom workout (SS or MM:SS).");
                        println!("  pause | resume                  - Pauses or resumes the workout.");
                        println!("  stop | reset                    - Stops the workout, or clears it.");
                        println!("  status                          - Shows the current workout state.");
                        println!("  watch on|off                    - Toggles the live countdown.");
                        println!("  exit                            - Quits the shell.");
                    }
                    "exit" => break,
                    _ => println!("Unknown command: '{}'. Type 'help'.", line.trim()),
                }
            }
            Err(_) => break,
        }
    }

    println!("Exiting hangshell...");
    coordinator.unbind();
    service.terminate();
    Ok(())
}
