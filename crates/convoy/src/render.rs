//! Terminal rendering for release progress.

use convoy_core::release::{ExecuteMode, ReleaseEvent};
use owo_colors::OwoColorize;

/// Print the run header.
pub fn print_header(mode: ExecuteMode) {
    if !mode.is_execute() {
        println!("{}", "DRY RUN — no changes will be made".yellow().bold());
    }
}

/// Handle a release event for terminal progress display.
pub fn handle_event(event: &ReleaseEvent, mode: ExecuteMode) {
    let dry_suffix = if mode.is_execute() { "" } else { " (dry-run)" };
    match event {
        ReleaseEvent::NothingToRelease => {
            println!(" [*] Nothing to release");
        }
        ReleaseEvent::Planned {
            name,
            prev_version,
            next_version,
            prev_tag,
            next_tag,
            feature,
            breaking,
            cascaded,
            commits,
        } => {
            println!("{}: {}", "Unit".bold(), name.bold());
            println!(
                " [*] Version: {} -> {}",
                prev_version.to_string().dimmed(),
                next_version.to_string().green().bold(),
            );
            println!(" [*] Tag: {} -> {}", prev_tag.dimmed(), next_tag.green());
            println!(" [*] Feature: {feature}");
            println!(" [*] Breaking: {breaking}");
            if *cascaded {
                println!(" [*] Releasing because a dependency released");
            }
            println!(" [*] Commits ({}):", commits.len());
            for commit in commits {
                println!(
                    "    - {} ({})",
                    commit.raw_subject,
                    commit.short_sha().dimmed(),
                );
            }
        }
        ReleaseEvent::Step { message } => {
            println!(" [-] {message}...{}", dry_suffix.yellow());
        }
        ReleaseEvent::VersionBumped {
            name,
            prev_version,
            next_version,
        } => {
            println!(
                "     - {}: {} -> {}",
                name,
                prev_version.to_string().dimmed(),
                next_version.to_string().green(),
            );
        }
        ReleaseEvent::Command { line, executed } => {
            let marker = if *executed { "" } else { "(dry-run) " };
            println!("     {}{} {}", marker.yellow(), ">".dimmed(), line.cyan());
        }
    }
}
