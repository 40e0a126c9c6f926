//! # Replay Command
//!
//! Run a spoken phrase through the full voice command path against a
//! captured window. Input and speech are printed instead of delivered.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use tracing::info;
use voicify_core::announce::AnnounceResult;
use voicify_core::injection::InjectResult;
use voicify_core::{
    clock, Announcer, CaptureEvent, EventKind, InputInjector, NavigationKey, ReplayReport,
    ServiceError, ServiceEvent, SnapshotTree, TapGesture, VoicifyConfig, VoicifyService,
};

use crate::render::{self, Style};

/// Prints each input instead of delivering it.
#[derive(Debug, Default)]
struct PrintingInjector {
    delivered: AtomicUsize,
}

impl InputInjector for PrintingInjector {
    fn inject_tap(&self, tap: &TapGesture) -> InjectResult<()> {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        info!("Dry-run tap {:?}", tap);
        println!("  {} ({:.1}, {:.1})", "tap".bright_magenta(), tap.x, tap.y);
        Ok(())
    }

    fn inject_key(&self, key: NavigationKey) -> InjectResult<()> {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        info!("Dry-run key {}", key);
        println!("  {} {}", "key".bright_magenta(), key);
        Ok(())
    }
}

/// Prints announcements instead of speaking them.
#[derive(Debug, Default)]
struct PrintingAnnouncer;

impl Announcer for PrintingAnnouncer {
    fn is_ready(&self) -> bool {
        true
    }

    fn announce(&self, text: &str) -> AnnounceResult<()> {
        println!("  {} {}", "say".bright_blue(), text);
        Ok(())
    }
}

fn print_event(event: &ServiceEvent) {
    match event {
        ServiceEvent::PlaybackStarted { command, distance } => {
            println!(
                "{} {} (distance {})",
                "Replaying".bright_cyan().bold(),
                command.bright_yellow(),
                distance
            );
        }
        ServiceEvent::PlaybackComplete { command, success: true } => {
            render::print_styled(&format!("{} finished", command), Style::Success);
        }
        ServiceEvent::PlaybackComplete { command, success: false } => {
            render::print_styled(&format!("{} finished with issues", command), Style::Warning);
        }
        ServiceEvent::NoMatch { transcript } => {
            render::print_styled(&format!("No good match for {:?}", transcript), Style::Warning);
        }
        other => info!("Service event: {:?}", other),
    }
}

fn print_report(report: &ReplayReport) {
    println!();
    for outcome in &report.actions {
        let attempted: Vec<String> = outcome.attempted.iter().map(ToString::to_string).collect();
        let result = match outcome.succeeded {
            Some(strategy) => strategy.to_string().green(),
            None => "not located".red(),
        };
        println!(
            "Action {}: {} (tried {})",
            outcome.index,
            result,
            attempted.join(", ")
        );
    }
    if let Some(failure) = &report.action_failure {
        render::print_styled(&failure.to_string(), Style::Error);
    }
    if let Some(failure) = &report.output_failure {
        render::print_styled(&failure.to_string(), Style::Error);
    }
}

/// Run the replay command
pub async fn run(
    mut config: VoicifyConfig,
    phrase: &str,
    snapshot: &Path,
    no_wait: bool,
    json: bool,
) -> anyhow::Result<()> {
    let tree = SnapshotTree::load(snapshot)
        .with_context(|| format!("Failed to load snapshot {}", snapshot.display()))?;

    if no_wait {
        config.replay = config.replay.without_waits();
    }

    let injector = Arc::new(PrintingInjector::default());
    let (service, mut events) =
        VoicifyService::new(config, injector.clone(), Arc::new(PrintingAnnouncer));

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
        }
    });

    // The snapshot becomes the foreground window.
    service.on_event(&CaptureEvent::from_node(
        EventKind::WindowStateChanged,
        clock::uptime_millis(),
        tree.root(),
    ));

    let outcome = match service.handle_voice_command(phrase) {
        Ok(handle) => tokio::task::spawn_blocking(move || handle.join()).await?,
        Err(e) => Err(e),
    };

    // Dropping the service closes the event channel and stops the printer.
    drop(service);
    printer.await?;

    let report = match outcome {
        Ok(report) => report,
        Err(ServiceError::NoMatch { .. }) => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
        println!(
            "{} input(s) injected, {} announcement(s)",
            injector.delivered.load(Ordering::Relaxed),
            report.announced.len()
        );
    }
    Ok(())
}
