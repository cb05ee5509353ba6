//! Confirmation prompts for destructive commands.
//!
//! Renders what is about to happen and asks before proceeding.
//! Uses dialoguer for terminal UI prompts.

use std::io::{self, Write};

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, theme::ColorfulTheme};

use gearbox_core::uninstall::{RemovalReason, UninstallPlan};

pub struct Confirmation<W: Write = io::Stdout> {
    /// Skip the prompt and answer yes
    yes: bool,
    /// Output writer (for testing)
    writer: W,
    theme: ColorfulTheme,
}

impl Confirmation<io::Stdout> {
    pub fn new(yes: bool) -> Self {
        Self::with_writer(yes, io::stdout())
    }
}

impl<W: Write> Confirmation<W> {
    /// Create a confirmation with a custom writer (for testing).
    pub fn with_writer(yes: bool, writer: W) -> Self {
        Self {
            yes,
            writer,
            theme: ColorfulTheme::default(),
        }
    }

    /// Show the uninstall plan and ask whether to apply it.
    pub fn uninstall(&mut self, plan: &UninstallPlan) -> Result<bool> {
        writeln!(self.writer)?;
        writeln!(self.writer, "{}", style("  Uninstall plan").bold())?;
        writeln!(self.writer, "  {}", style("─".repeat(40)).dim())?;
        for removal in &plan.removals {
            let note = match &removal.reason {
                RemovalReason::Requested => String::new(),
                RemovalReason::Orphaned { required_by } => {
                    format!(" (orphaned, was needed by {})", required_by)
                }
            };
            writeln!(self.writer, "  - {}{}", style(&removal.name).red(), note)?;
            for path in &removal.paths {
                writeln!(self.writer, "      {}", style(path.display()).dim())?;
            }
        }
        writeln!(
            self.writer,
            "  Safety:   {}",
            style(plan.safety_level.to_string()).green()
        )?;
        writeln!(
            self.writer,
            "  Backup:   {}",
            style(if plan.backup { "yes" } else { "no" }).green()
        )?;
        for warning in &plan.warnings {
            writeln!(self.writer, "  {} {}", style("⚠").yellow(), warning)?;
        }
        writeln!(self.writer)?;

        self.ask("Proceed with uninstall?", false)
    }

    /// Ask before replacing the live manifest.
    pub fn restore(&mut self, backup: &str) -> Result<bool> {
        writeln!(
            self.writer,
            "The current manifest will be replaced by {} (a pre-restore backup is taken first).",
            style(backup).cyan()
        )?;
        self.ask("Restore this backup?", false)
    }

    fn ask(&mut self, prompt: &str, default: bool) -> Result<bool> {
        if self.yes {
            return Ok(true);
        }
        Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact()
            .context("Confirmation needs an interactive terminal; pass --yes to skip it")
    }
}
