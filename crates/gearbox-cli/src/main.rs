//! Gearbox - developer tool installer
//!
//! Usage:
//!   gearbox install ripgrep fd      # Build tools and their dependencies
//!   gearbox status                  # Compare the manifest with the host
//!   gearbox uninstall bat --cascade # Remove tools and orphaned deps
//!   gearbox doctor                  # Health checks

mod interactive;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gearbox_core::build::{BuildEvent, BuildOrchestrator, BuildReport, ToolState};
use gearbox_core::catalog::{Catalog, Category};
use gearbox_core::config::GearboxPaths;
use gearbox_core::context::AppContext;
use gearbox_core::doctor::{self, CheckLevel};
use gearbox_core::planner::{DependencyPlanner, InstallPlan, expand_bundle};
use gearbox_core::status::{StatusSummary, ToolStatus};
use gearbox_core::types::SafetyLevel;
use gearbox_core::uninstall::{UninstallPlan, UninstallPlanner};

use crate::interactive::Confirmation;

const EXIT_FAILURE: i32 = 1;
const EXIT_BLOCKED: i32 = 2;
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "gearbox")]
#[command(about = "Build and track developer tools from source", long_about = None)]
struct Cli {
    /// Data directory (default: ~/.gearbox)
    #[arg(long, global = true, value_name = "DIR")]
    home: Option<PathBuf>,

    /// Tool catalog file (default: ~/.config/gearbox/tools.json)
    #[arg(long, global = true, value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// Directory holding install-<tool>.sh scripts
    #[arg(long, global = true, value_name = "DIR")]
    scripts_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and install tools or bundles, dependencies first
    Install(InstallArgs),

    /// Remove installed tools
    #[command(alias = "rm")]
    Uninstall(UninstallArgs),

    /// Show what an uninstall would do without changing anything
    UninstallPlan(UninstallPlanArgs),

    /// Show installation status
    Status {
        /// Limit to these tools
        tools: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// List catalog tools or bundles
    List {
        /// Only tools in this category
        #[arg(long)]
        category: Option<String>,

        /// List bundles instead of tools
        #[arg(long)]
        bundles: bool,
    },

    /// Show details of a tool or bundle
    Show {
        name: String,
    },

    /// Run health checks
    Doctor {
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Record tools already on the host as pre-existing installations
    Sync {
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Snapshot the manifest
    Backup {
        /// Suffix appended to the backup name
        #[arg(long)]
        suffix: Option<String>,
    },

    /// List manifest backups
    Backups,

    /// Replace the manifest with a backup
    Restore {
        /// Backup file name (see `gearbox backups`)
        name: String,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
    /// Only show issues (non-zero exit if problems)
    Quiet,
}

#[derive(Args)]
struct InstallArgs {
    /// Tool or bundle names
    #[arg(required = true)]
    tools: Vec<String>,

    /// Build variant (e.g. minimal, standard, maximum)
    #[arg(short = 'b', long)]
    build_type: Option<String>,

    /// Parallel builds (0 = one per core)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Assume shared system packages are already installed
    #[arg(long)]
    skip_common_deps: bool,

    /// Run each tool's test suite
    #[arg(long)]
    run_tests: bool,

    /// Do not install shell integration
    #[arg(long = "no-shell")]
    skip_shell_integration: bool,

    /// Rebuild tools that are already installed
    #[arg(short, long)]
    force: bool,

    /// Disable build caches
    #[arg(long = "no-cache")]
    disable_cache: bool,

    /// Print the build invocations without running them
    #[arg(long)]
    dry_run: bool,

    /// Output format
    #[arg(short = 'o', long, default_value = "table")]
    format: OutputFormat,
}

#[derive(Args)]
struct UninstallPlanArgs {
    /// Tool or bundle names
    #[arg(required = true)]
    targets: Vec<String>,

    /// Also remove dependencies nothing else needs
    #[arg(long)]
    cascade: bool,

    /// Remove even if installed tools depend on a target
    #[arg(short, long)]
    force: bool,

    /// conservative, standard or aggressive
    #[arg(long, value_parser = parse_safety_level)]
    safety_level: Option<SafetyLevel>,

    /// Do not back up the manifest first
    #[arg(long)]
    no_backup: bool,

    /// Output format
    #[arg(short = 'o', long, default_value = "table")]
    format: OutputFormat,
}

#[derive(Args)]
struct UninstallArgs {
    #[command(flatten)]
    plan: UninstallPlanArgs,

    /// Suffix for the pre-uninstall manifest backup
    #[arg(long, value_name = "SUFFIX")]
    backup_suffix: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    yes: bool,
}

fn parse_safety_level(s: &str) -> std::result::Result<SafetyLevel, String> {
    s.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "gearbox_core=debug,gearbox_cli=debug,info"
    } else {
        "gearbox_core=info,gearbox_cli=info,warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let code = run_cli(cli).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn build_context(cli: &Cli) -> Result<AppContext> {
    let paths = match &cli.home {
        Some(home) => {
            let defaults = GearboxPaths::from_home().ok();
            let config_dir = defaults
                .map(|p| p.config_dir().to_path_buf())
                .unwrap_or_else(|| home.join("config"));
            GearboxPaths::with_dirs(home.clone(), config_dir)
        }
        None => GearboxPaths::from_home()?,
    };
    let mut ctx = AppContext::load(paths).context("Failed to load settings")?;
    if let Some(catalog) = &cli.catalog {
        ctx = ctx.with_catalog_path(catalog.clone());
    }
    if let Some(dir) = &cli.scripts_dir {
        ctx = ctx.with_scripts_dir(dir.clone());
    }
    tracing::debug!(
        data_dir = %ctx.paths().data_dir().display(),
        catalog = %ctx.catalog_path().display(),
        scripts = %ctx.scripts_dir().display(),
        "Resolved paths"
    );
    Ok(ctx)
}

fn load_catalog(ctx: &AppContext) -> Result<Catalog> {
    ctx.load_catalog()
        .with_context(|| format!("Failed to load catalog from {}", ctx.catalog_path().display()))
}

async fn run_cli(cli: Cli) -> Result<i32> {
    let ctx = build_context(&cli)?;
    match cli.command {
        Commands::Install(args) => run_install(&ctx, args).await,
        Commands::Uninstall(args) => run_uninstall(&ctx, args),
        Commands::UninstallPlan(args) => run_uninstall_plan(&ctx, args),
        Commands::Status { tools, format } => run_status(&ctx, &tools, format),
        Commands::List { category, bundles } => run_list(&ctx, category.as_deref(), bundles),
        Commands::Show { name } => run_show(&ctx, &name),
        Commands::Doctor { format } => run_doctor(&ctx, format),
        Commands::Sync { format } => run_sync(&ctx, format),
        Commands::Backup { suffix } => run_backup(&ctx, suffix.as_deref()),
        Commands::Backups => run_backups(&ctx),
        Commands::Restore { name, yes } => run_restore(&ctx, &name, yes),
    }
}

// =============================================================================
// Install
// =============================================================================

async fn run_install(ctx: &AppContext, args: InstallArgs) -> Result<i32> {
    let catalog = load_catalog(ctx)?;
    let plan = DependencyPlanner::new(&catalog).plan(&args.tools)?;

    let mut options = ctx.installation_options();
    if let Some(build_type) = args.build_type {
        options.build_type = Some(build_type);
    }
    if let Some(jobs) = args.jobs {
        options.jobs = jobs;
    }
    options.skip_common_deps = args.skip_common_deps;
    options.run_tests = args.run_tests;
    options.skip_shell_integration = args.skip_shell_integration;
    options.force = args.force;
    options.disable_cache = args.disable_cache;
    options.dry_run = args.dry_run;

    if matches!(args.format, OutputFormat::Table) {
        print_plan(&plan);
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", style("Interrupted, stopping builds...").yellow());
            interrupt.cancel();
        }
    });

    let (tx, rx) = mpsc::unbounded_channel();
    let progress = tokio::spawn(print_progress(rx, args.format));

    let orchestrator = BuildOrchestrator::new(&catalog, ctx.script_backend(), ctx.manifest_store(), options)
        .with_events(tx);
    let report = orchestrator.run(&plan, cancel).await?;
    drop(orchestrator);
    if let Err(e) = progress.await {
        tracing::debug!(error = %e, "Progress printer stopped");
    }

    print_build_report(&report, args.format)?;

    let code = if report.interrupted {
        EXIT_INTERRUPTED
    } else if report.success() {
        0
    } else {
        EXIT_FAILURE
    };
    Ok(code)
}

fn print_plan(plan: &InstallPlan) {
    println!("{} ({} tools)", style("Installation order").bold(), plan.len());
    for (idx, step) in plan.steps.iter().enumerate() {
        let marker = if step.explicit { "" } else { " (dependency)" };
        println!("  {:>2}. {}{}", idx + 1, step.name(), style(marker).dim());
    }
    if !plan.system_packages.is_empty() {
        println!(
            "  System packages: {}",
            style(plan.system_packages.join(", ")).dim()
        );
    }
    println!();
}

async fn print_progress(mut rx: mpsc::UnboundedReceiver<BuildEvent>, format: OutputFormat) {
    while let Some(event) = rx.recv().await {
        if !matches!(format, OutputFormat::Table) {
            continue;
        }
        match event {
            BuildEvent::Started {
                index, total, name, ..
            } => println!("{} {}", style(format!("[{}/{}]", index, total)).dim(), style(&name).cyan()),
            BuildEvent::Finished {
                index,
                total,
                name,
                state,
            } => {
                let mark = match &state {
                    ToolState::Succeeded | ToolState::AlreadyInstalled => style("✓").green(),
                    ToolState::Failed(_) => style("✗").red(),
                    ToolState::Skipped(_) => style("•").yellow(),
                };
                println!("{} {} {} {}", style(format!("[{}/{}]", index, total)).dim(), mark, name, style(state).dim());
            }
            BuildEvent::Planned {
                index,
                total,
                invocation,
                ..
            } => println!("{} {}", style(format!("[{}/{}]", index, total)).dim(), invocation),
            BuildEvent::Interrupted => println!("{}", style("Interrupted").yellow()),
        }
    }
}

fn print_build_report(report: &BuildReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!();
            if report.dry_run {
                println!("Dry run: {} invocations, nothing was built", report.invocations.len());
                return Ok(());
            }
            println!(
                "{} built, {} failed, {} skipped",
                style(report.succeeded().len()).green(),
                style(report.failed().len()).red(),
                style(report.skipped().len()).yellow()
            );
            for result in &report.results {
                if let ToolState::Failed(reason) = &result.status {
                    println!("  {} {}: {}", style("✗").red(), result.name, reason);
                }
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Quiet => {
            for name in report.failed() {
                println!("failed: {}", name);
            }
        }
    }
    Ok(())
}

// =============================================================================
// Uninstall
// =============================================================================

fn plan_uninstall(ctx: &AppContext, args: &UninstallPlanArgs) -> Result<UninstallPlan> {
    let catalog = load_catalog(ctx)?;
    let manifest = ctx.manifest_store().load()?;

    let mut request = ctx
        .uninstall_request(args.targets.clone())
        .with_cascade(args.cascade)
        .with_force(args.force);
    if let Some(level) = args.safety_level {
        request = request.with_safety_level(level);
    }
    if args.no_backup {
        request = request.with_backup(false);
    }
    Ok(UninstallPlanner::new(&catalog, &manifest).plan(&request)?)
}

fn print_blocked(plan: &UninstallPlan) {
    eprintln!(
        "{} installed tools depend on {}: {}",
        style("Blocked:").red().bold(),
        plan.requested().join(", "),
        plan.dependents.join(", ")
    );
    eprintln!("  Use --cascade to also consider their dependencies, or --force to remove anyway.");
}

fn run_uninstall_plan(ctx: &AppContext, args: UninstallPlanArgs) -> Result<i32> {
    let plan = plan_uninstall(ctx, &args)?;
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        OutputFormat::Table | OutputFormat::Quiet => {
            if plan.blocked {
                print_blocked(&plan);
            } else if plan.is_empty() {
                println!("Nothing to uninstall.");
            } else {
                Confirmation::new(true).uninstall(&plan)?;
            }
        }
    }
    Ok(if plan.blocked { EXIT_BLOCKED } else { 0 })
}

fn run_uninstall(ctx: &AppContext, args: UninstallArgs) -> Result<i32> {
    let plan = plan_uninstall(ctx, &args.plan)?;
    if plan.blocked {
        print_blocked(&plan);
        return Ok(EXIT_BLOCKED);
    }
    if plan.is_empty() {
        for warning in &plan.warnings {
            println!("  ⚠ {}", warning);
        }
        println!("Nothing to uninstall.");
        return Ok(0);
    }

    let interactive = matches!(args.plan.format, OutputFormat::Table);
    if interactive && !Confirmation::new(args.yes).uninstall(&plan)? {
        println!("Uninstall cancelled.");
        return Ok(0);
    }
    if !interactive && !args.yes {
        anyhow::bail!("Non-table output cannot prompt; pass --yes to uninstall");
    }

    let mut options = ctx.uninstall_options();
    if args.backup_suffix.is_some() {
        options.backup_suffix = args.backup_suffix;
    }
    let report = ctx.uninstall_executor().execute(&plan, &options)?;

    match args.plan.format {
        OutputFormat::Table => {
            for name in &report.removed {
                println!("✓ Uninstalled '{}'", name);
            }
            if let Some(backup) = &report.backup {
                println!("  Backup: {}", backup);
            }
            for warning in &report.warnings {
                println!("  ⚠ {}", warning);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Quiet => {}
    }
    Ok(0)
}

// =============================================================================
// Status, catalog browsing, doctor
// =============================================================================

fn run_status(ctx: &AppContext, tools: &[String], format: OutputFormat) -> Result<i32> {
    let catalog = load_catalog(ctx)?;
    let service = ctx.status_service(&catalog);
    let statuses: Vec<ToolStatus> = if tools.is_empty() {
        service.get_all_tools_status()?
    } else {
        tools
            .iter()
            .map(|name| service.get_tool_status(name))
            .collect::<gearbox_core::error::Result<_>>()?
    };
    let summary = StatusSummary::from_statuses(&statuses);

    match format {
        OutputFormat::Table => print_status_table(&statuses, &summary),
        OutputFormat::Json => {
            let output = serde_json::json!({
                "tools": statuses,
                "summary": summary,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Quiet => {
            for status in statuses.iter().filter(|s| s.needs_sync) {
                println!("{}: {}", status.name, drift_label(status));
            }
            if summary.needs_sync > 0 {
                return Ok(EXIT_FAILURE);
            }
        }
    }
    Ok(0)
}

fn drift_label(status: &ToolStatus) -> &'static str {
    if status.is_missing() {
        "tracked but missing"
    } else if status.is_untracked() {
        "installed but untracked"
    } else {
        "in sync"
    }
}

fn print_status_table(statuses: &[ToolStatus], summary: &StatusSummary) {
    println!(
        "{:<20} {:<10} {:<16} {:<16} Sync",
        "Tool", "Installed", "Version", "Source"
    );
    println!("{}", "-".repeat(76));
    for status in statuses {
        let installed = if status.installed {
            style("yes").green()
        } else {
            style("no").dim()
        };
        let sync = if status.needs_sync {
            style(drift_label(status)).yellow()
        } else {
            style("ok").green()
        };
        let mut name = status.name.clone();
        if !status.in_catalog {
            name.push_str(" (stale)");
        }
        if status.meets_min_version == Some(false) {
            name.push_str(" (outdated)");
        }
        println!(
            "{:<20} {:<10} {:<16} {:<16} {}",
            name,
            installed,
            status.version.as_deref().unwrap_or("-"),
            status.source.to_string(),
            sync
        );
    }
    println!();
    println!(
        "{} tools, {} installed, {} need sync",
        summary.total, summary.installed, summary.needs_sync
    );
}

fn run_list(ctx: &AppContext, category: Option<&str>, bundles: bool) -> Result<i32> {
    let catalog = load_catalog(ctx)?;

    if bundles {
        println!("{:<20} {:<6} Description", "Bundle", "Tools");
        println!("{}", "-".repeat(70));
        for bundle in catalog.bundles() {
            let count = expand_bundle(&catalog, &bundle.name)?.len();
            println!("{:<20} {:<6} {}", bundle.name, count, bundle.description);
        }
        return Ok(0);
    }

    let filter: Option<Category> = category
        .map(|c| serde_json::from_value(serde_json::Value::String(c.to_lowercase())))
        .transpose()
        .with_context(|| format!("Unknown category: {}", category.unwrap_or_default()))?;

    println!("{:<20} {:<12} {:<8} Description", "Tool", "Category", "Language");
    println!("{}", "-".repeat(76));
    for tool in catalog.tools() {
        if filter.is_some_and(|c| c != tool.category) {
            continue;
        }
        println!(
            "{:<20} {:<12} {:<8} {}",
            tool.name,
            tool.category.to_string(),
            tool.language.to_string(),
            tool.description
        );
    }
    Ok(0)
}

fn run_show(ctx: &AppContext, name: &str) -> Result<i32> {
    let catalog = load_catalog(ctx)?;

    if let Some(tool) = catalog.tool(name) {
        println!("{}", style(&tool.name).bold());
        println!("  {}", tool.description);
        println!("  Binary:       {}", tool.binary_name);
        println!("  Category:     {}", tool.category);
        println!("  Language:     {}", tool.language);
        println!("  Repository:   {}", tool.repository);
        let variants: Vec<String> = tool
            .build_types
            .iter()
            .map(|(variant, flag)| format!("{} ({})", variant, flag))
            .collect();
        println!("  Build types:  {}", variants.join(", "));
        if !tool.dependencies.is_empty() {
            println!("  Depends on:   {}", tool.dependencies.join(", "));
        }
        if let Some(min) = &tool.min_version {
            println!("  Min version:  {}", min);
        }

        let status = ctx.status_service(&catalog).get_tool_status(name)?;
        println!(
            "  Status:       {} ({})",
            if status.installed { "installed" } else { "not installed" },
            status.source
        );
        return Ok(0);
    }

    if let Some(bundle) = catalog.bundle(name) {
        println!("{}", style(&bundle.name).bold());
        println!("  {}", bundle.description);
        println!("  Tools: {}", expand_bundle(&catalog, name)?.join(", "));
        return Ok(0);
    }

    anyhow::bail!("Unknown tool or bundle: '{}'", name)
}

fn run_doctor(ctx: &AppContext, format: OutputFormat) -> Result<i32> {
    let catalog = load_catalog(ctx)?;
    let report = doctor::run(ctx, &catalog);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table | OutputFormat::Quiet => {
            for check in &report.checks {
                if matches!(format, OutputFormat::Quiet) && check.level == CheckLevel::Ok {
                    continue;
                }
                let mark = match check.level {
                    CheckLevel::Ok => style("✓").green(),
                    CheckLevel::Warn => style("⚠").yellow(),
                    CheckLevel::Error => style("✗").red(),
                };
                println!("{} {:<14} {}", mark, check.name, check.message);
            }
        }
    }
    Ok(if report.has_errors() { EXIT_FAILURE } else { 0 })
}

// =============================================================================
// Manifest maintenance
// =============================================================================

fn run_sync(ctx: &AppContext, format: OutputFormat) -> Result<i32> {
    let catalog = load_catalog(ctx)?;
    let report = ctx.status_service(&catalog).sync_manifest_with_system()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table | OutputFormat::Quiet => {
            if report.added.is_empty() {
                println!("Manifest already covers every detected tool.");
            }
            for name in &report.added {
                println!("✓ Recorded '{}' as pre-existing", name);
            }
            for name in &report.untracked_missing {
                println!("  ⚠ '{}' is tracked but not found on the host", name);
            }
            if let Some(backup) = &report.backup {
                println!("  Backup: {}", backup);
            }
        }
    }
    Ok(0)
}

fn run_backup(ctx: &AppContext, suffix: Option<&str>) -> Result<i32> {
    match ctx.manifest_store().backup(suffix)? {
        Some(name) => println!("✓ Backed up manifest to {}", name),
        None => println!("No manifest to back up yet."),
    }
    Ok(0)
}

fn run_backups(ctx: &AppContext) -> Result<i32> {
    let store = ctx.manifest_store();
    let backups = store.list_backups()?;
    if backups.is_empty() {
        println!("No backups in {}", store.backups_dir().display());
    }
    for name in backups {
        println!("{}", name);
    }
    Ok(0)
}

fn run_restore(ctx: &AppContext, name: &str, yes: bool) -> Result<i32> {
    if !Confirmation::new(yes).restore(name)? {
        println!("Restore cancelled.");
        return Ok(0);
    }
    ctx.manifest_store().restore_backup(name)?;
    println!("✓ Restored manifest from {}", name);
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_install_flags() {
        let cli = Cli::parse_from([
            "gearbox", "install", "ripgrep", "fd", "-j", "2", "--no-shell", "--dry-run",
        ]);
        let Commands::Install(args) = cli.command else {
            panic!("expected install");
        };
        assert_eq!(args.tools, vec!["ripgrep", "fd"]);
        assert_eq!(args.jobs, Some(2));
        assert!(args.skip_shell_integration);
        assert!(args.dry_run);
    }

    #[test]
    fn parses_uninstall_safety_level() {
        let cli = Cli::parse_from([
            "gearbox", "uninstall", "bat", "--cascade", "--safety-level", "Aggressive", "-y",
        ]);
        let Commands::Uninstall(args) = cli.command else {
            panic!("expected uninstall");
        };
        assert!(args.yes);
        assert!(args.plan.cascade);
        assert_eq!(args.backup_suffix, None);
        assert_eq!(args.plan.safety_level, Some(SafetyLevel::Aggressive));
    }
}
