//! Executes an [`InstallPlan`] against a [`BuildBackend`].
//!
//! Scheduling rules:
//! - a tool is admitted once every in-plan dependency is satisfied
//!   (built or already installed), so a tool never builds alongside
//!   anything it depends on;
//! - at most `jobs` builds run at once;
//! - until one build succeeds without `--skip-deps`, builds run one at a
//!   time so the shared system packages are installed exactly once;
//! - a failure skips every transitive dependent and leaves independent
//!   branches running.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::catalog::Catalog;
use crate::error::{GearboxError, Result};
use crate::manifest::{InstallationRecord, Manifest, ManifestStore};
use crate::planner::{InstallPlan, PlannedTool};

use super::backend::{BuildBackend, BuildOutput, BuildRequest};
use super::options::InstallationOptions;
use super::report::{BuildEvent, BuildReport, Invocation, ToolResult, ToolState};

pub struct BuildOrchestrator<'a, B: BuildBackend + 'static> {
    catalog: &'a Catalog,
    backend: Arc<B>,
    store: ManifestStore,
    options: InstallationOptions,
    events: Option<UnboundedSender<BuildEvent>>,
}

impl<'a, B: BuildBackend + 'static> BuildOrchestrator<'a, B> {
    pub fn new(
        catalog: &'a Catalog,
        backend: B,
        store: ManifestStore,
        options: InstallationOptions,
    ) -> Self {
        Self {
            catalog,
            backend: Arc::new(backend),
            store,
            options,
            events: None,
        }
    }

    /// Publish progress on `sender` in addition to the log.
    pub fn with_events(mut self, sender: UnboundedSender<BuildEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn options(&self) -> &InstallationOptions {
        &self.options
    }

    /// Run the plan to completion, or until `cancel` fires.
    ///
    /// Only a manifest that cannot be loaded aborts the run; build problems
    /// are reported per tool.
    pub async fn run(&self, plan: &InstallPlan, cancel: CancellationToken) -> Result<BuildReport> {
        let manifest = self.store.load()?;
        if self.options.dry_run {
            return Ok(self.dry_run(plan, &manifest));
        }

        let jobs = self.options.effective_jobs();
        tracing::info!(tools = plan.len(), jobs, "Starting build run");

        let mut run = RunState::new(plan, manifest, self.events.clone());
        let mut tasks: JoinSet<(usize, BuildAttempt)> = JoinSet::new();
        let mut shared_deps_ready = self.options.skip_common_deps;
        let mut gate: Option<usize> = None;

        loop {
            while !cancel.is_cancelled() {
                let Some(idx) = run.ready.first().copied() else {
                    break;
                };
                let step = &plan.steps[idx];

                if !self.options.force && run.manifest.contains(step.name()) {
                    run.ready.remove(&idx);
                    tracing::info!(tool = %step.name(), "Already installed, skipping build");
                    run.finish(idx, ToolState::AlreadyInstalled, None);
                    continue;
                }
                if gate.is_some() || tasks.len() >= jobs {
                    break;
                }
                if !shared_deps_ready && !tasks.is_empty() {
                    break;
                }

                run.ready.remove(&idx);
                let request = match self.request_for(step, shared_deps_ready) {
                    Ok(request) => request,
                    Err(e) => {
                        run.finish(idx, ToolState::Failed(e.to_string()), None);
                        continue;
                    }
                };
                if !shared_deps_ready {
                    gate = Some(idx);
                }

                run.emit(BuildEvent::Started {
                    index: idx + 1,
                    total: run.total,
                    name: step.name().to_string(),
                    skip_deps: request.skip_deps,
                });
                tracing::info!(
                    "[{}/{}] Building {} ({})",
                    idx + 1,
                    run.total,
                    step.name(),
                    request.build_type
                );

                let backend = Arc::clone(&self.backend);
                let token = cancel.child_token();
                tasks.spawn(async move {
                    // Inner task so a panicking backend is still attributed to its tool
                    let handle = tokio::spawn(async move {
                        let output = backend.build(&request, token).await;
                        (request, output)
                    });
                    let attempt = match handle.await {
                        Ok((request, output)) => BuildAttempt::Done {
                            build_type: request.build_type,
                            output,
                        },
                        Err(e) => BuildAttempt::Panicked(e.to_string()),
                    };
                    (idx, attempt)
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            let (idx, attempt) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::error!(error = %e, "Build task failed to join");
                    continue;
                }
            };

            let succeeded = self.settle(&mut run, plan, idx, attempt);
            if gate == Some(idx) {
                gate = None;
                if succeeded {
                    shared_deps_ready = true;
                    tracing::info!("Shared dependencies installed");
                }
            }
        }

        let interrupted = cancel.is_cancelled();
        if interrupted {
            tracing::warn!("Build run interrupted");
            run.emit(BuildEvent::Interrupted);
        }
        for idx in 0..run.total {
            if run.states[idx].is_none() {
                let reason = if interrupted { "interrupted" } else { "not started" };
                run.finish(idx, ToolState::Skipped(reason.to_string()), None);
            }
        }

        let report = run.into_report(interrupted);
        tracing::info!(
            succeeded = report.succeeded().len(),
            failed = report.failed().len(),
            skipped = report.skipped().len(),
            "Build run finished"
        );
        Ok(report)
    }

    /// Record the outcome of one build; returns whether it succeeded.
    fn settle(&self, run: &mut RunState, plan: &InstallPlan, idx: usize, attempt: BuildAttempt) -> bool {
        let step = &plan.steps[idx];
        match attempt {
            BuildAttempt::Done {
                build_type,
                output: Ok(output),
            } => match self.record_success(&mut run.manifest, step, &build_type, &output) {
                Ok(()) => {
                    run.finish(idx, ToolState::Succeeded, Some(output.version));
                    true
                }
                Err(e) => {
                    tracing::error!(tool = %step.name(), error = %e, "Built but could not record in manifest");
                    run.finish(idx, ToolState::Failed(e.to_string()), None);
                    false
                }
            },
            BuildAttempt::Done {
                output: Err(GearboxError::Interrupted),
                ..
            } => {
                run.finish(idx, ToolState::Failed("interrupted".to_string()), None);
                false
            }
            BuildAttempt::Done { output: Err(e), .. } => {
                let reason = match e {
                    GearboxError::BuildFailure { reason, .. } => reason,
                    other => other.to_string(),
                };
                tracing::warn!(tool = %step.name(), %reason, "Build failed");
                run.finish(idx, ToolState::Failed(reason), None);
                false
            }
            BuildAttempt::Panicked(reason) => {
                run.finish(idx, ToolState::Failed(format!("build task panicked: {}", reason)), None);
                false
            }
        }
    }

    /// Persist immediately so an interrupted run keeps completed tools.
    fn record_success(
        &self,
        manifest: &mut Manifest,
        step: &PlannedTool,
        build_type: &str,
        output: &BuildOutput,
    ) -> Result<()> {
        let explicit = step.explicit || manifest.get(step.name()).is_some_and(|r| r.explicit);
        let record = InstallationRecord::new(output.method, output.version.clone())
            .with_binary_paths(output.binary_paths.clone())
            .with_build_type(build_type)
            .with_explicit(explicit)
            .with_dependencies(step.dependencies.clone());
        manifest.add(step.name(), record);
        self.store.save(manifest)
    }

    fn request_for(&self, step: &PlannedTool, skip_deps: bool) -> Result<BuildRequest> {
        let (build_type, build_flag) = self
            .catalog
            .resolve_build_flag(&step.tool, self.options.build_type.as_deref())?;
        Ok(BuildRequest {
            tool: step.tool.clone(),
            build_type: build_type.to_string(),
            build_flag: build_flag.to_string(),
            skip_deps,
            run_tests: self.options.run_tests,
            force: self.options.force,
            skip_shell_integration: self.options.skip_shell_integration,
            disable_cache: self.options.disable_cache,
        })
    }

    /// Resolve every invocation in plan order without spawning anything.
    fn dry_run(&self, plan: &InstallPlan, manifest: &Manifest) -> BuildReport {
        let total = plan.len();
        let mut report = BuildReport {
            dry_run: true,
            ..Default::default()
        };
        let mut shared_deps_ready = self.options.skip_common_deps;

        for (idx, step) in plan.steps.iter().enumerate() {
            let status = if !self.options.force && manifest.contains(step.name()) {
                ToolState::AlreadyInstalled
            } else {
                match self.request_for(step, shared_deps_ready) {
                    Ok(request) => {
                        let command = self.backend.describe(&request);
                        tracing::info!("[{}/{}] Would run: {}", idx + 1, total, command);
                        self.emit(BuildEvent::Planned {
                            index: idx + 1,
                            total,
                            name: step.name().to_string(),
                            invocation: command.clone(),
                        });
                        report.invocations.push(Invocation {
                            tool: step.name().to_string(),
                            command,
                        });
                        shared_deps_ready = true;
                        ToolState::Skipped("dry run".to_string())
                    }
                    Err(e) => ToolState::Failed(e.to_string()),
                }
            };
            report.results.push(ToolResult {
                name: step.name().to_string(),
                status,
                version: None,
            });
        }
        report
    }

    fn emit(&self, event: BuildEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.send(event);
        }
    }
}

enum BuildAttempt {
    Done {
        build_type: String,
        output: Result<BuildOutput>,
    },
    Panicked(String),
}

/// Bookkeeping for one run, indexed by plan position.
struct RunState {
    total: usize,
    names: Vec<String>,
    states: Vec<Option<ToolState>>,
    versions: Vec<Option<String>>,
    remaining: Vec<usize>,
    dependents: Vec<Vec<usize>>,
    ready: BTreeSet<usize>,
    manifest: Manifest,
    events: Option<UnboundedSender<BuildEvent>>,
}

impl RunState {
    fn new(plan: &InstallPlan, manifest: Manifest, events: Option<UnboundedSender<BuildEvent>>) -> Self {
        let total = plan.len();
        let position: HashMap<&str, usize> = plan
            .steps
            .iter()
            .enumerate()
            .map(|(idx, step)| (step.name(), idx))
            .collect();

        let mut remaining = vec![0; total];
        let mut dependents = vec![Vec::new(); total];
        for (idx, step) in plan.steps.iter().enumerate() {
            for dep in &step.dependencies {
                if let Some(&dep_idx) = position.get(dep.as_str()) {
                    remaining[idx] += 1;
                    dependents[dep_idx].push(idx);
                }
            }
        }
        let ready = (0..total).filter(|&idx| remaining[idx] == 0).collect();

        Self {
            total,
            names: plan.steps.iter().map(|s| s.name().to_string()).collect(),
            states: vec![None; total],
            versions: vec![None; total],
            remaining,
            dependents,
            ready,
            manifest,
            events,
        }
    }

    fn emit(&self, event: BuildEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.send(event);
        }
    }

    /// Settle a tool and release or skip its dependents.
    fn finish(&mut self, idx: usize, state: ToolState, version: Option<String>) {
        if self.states[idx].is_some() {
            return;
        }
        let satisfied = state.is_satisfied();
        self.emit(BuildEvent::Finished {
            index: idx + 1,
            total: self.total,
            name: self.names[idx].clone(),
            state: state.clone(),
        });
        self.states[idx] = Some(state);
        self.versions[idx] = version;

        let dependents = self.dependents[idx].clone();
        if satisfied {
            for dependent in dependents {
                self.remaining[dependent] -= 1;
                if self.remaining[dependent] == 0 && self.states[dependent].is_none() {
                    self.ready.insert(dependent);
                }
            }
        } else {
            let reason = format!("dependency '{}' was not installed", self.names[idx]);
            for dependent in dependents {
                if self.states[dependent].is_none() {
                    tracing::warn!(tool = %self.names[dependent], %reason, "Skipping");
                    self.ready.remove(&dependent);
                    self.finish(dependent, ToolState::Skipped(reason.clone()), None);
                }
            }
        }
    }

    fn into_report(self, interrupted: bool) -> BuildReport {
        let results = self
            .names
            .into_iter()
            .zip(self.states)
            .zip(self.versions)
            .map(|((name, state), version)| ToolResult {
                name,
                status: state.unwrap_or_else(|| ToolState::Skipped("not started".to_string())),
                version,
            })
            .collect();
        BuildReport {
            results,
            dry_run: false,
            invocations: Vec::new(),
            interrupted,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::catalog::test_support::tool;
    use crate::planner::DependencyPlanner;
    use crate::types::InstallMethod;
    use async_trait::async_trait;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingBackend {
        calls: Mutex<Vec<(String, bool)>>,
        fail: Vec<String>,
    }

    #[async_trait]
    impl BuildBackend for RecordingBackend {
        async fn build(&self, request: &BuildRequest, _cancel: CancellationToken) -> Result<BuildOutput> {
            self.calls
                .lock()
                .unwrap()
                .push((request.tool.name.clone(), request.skip_deps));
            if self.fail.contains(&request.tool.name) {
                return Err(GearboxError::BuildFailure {
                    tool: request.tool.name.clone(),
                    reason: "exit status 1".to_string(),
                });
            }
            Ok(BuildOutput {
                method: InstallMethod::SourceBuild,
                version: "1.0.0".to_string(),
                binary_paths: Vec::new(),
            })
        }

        fn describe(&self, request: &BuildRequest) -> String {
            format!("build {} {}", request.tool.name, request.build_flag)
        }
    }

    fn setup() -> (TempDir, Catalog, ManifestStore) {
        let temp = TempDir::new().unwrap();
        let catalog = Catalog::from_parts(
            "standard".to_string(),
            vec![
                tool("fd", &["build-essential"]),
                tool("uses-fd", &["fd"]),
                tool("bat", &["build-essential"]),
            ],
            vec![],
        )
        .unwrap();
        let store = ManifestStore::new(temp.path().join("manifest.json"), temp.path().join("backups"));
        (temp, catalog, store)
    }

    #[tokio::test]
    async fn first_build_installs_shared_deps() {
        let (_temp, catalog, store) = setup();
        let plan = DependencyPlanner::new(&catalog)
            .plan(&["fd", "uses-fd", "bat"])
            .unwrap();
        let options = InstallationOptions {
            jobs: 1,
            ..Default::default()
        };
        let orchestrator = BuildOrchestrator::new(&catalog, RecordingBackend::default(), store, options);
        let report = orchestrator.run(&plan, CancellationToken::new()).await.unwrap();

        assert!(report.success());
        let calls = orchestrator.backend.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ("fd".to_string(), false),
                ("uses-fd".to_string(), true),
                ("bat".to_string(), true),
            ]
        );
    }

    #[tokio::test]
    async fn failure_skips_dependents_only() {
        let (_temp, catalog, store) = setup();
        let plan = DependencyPlanner::new(&catalog)
            .plan(&["uses-fd", "bat"])
            .unwrap();
        let backend = RecordingBackend {
            fail: vec!["fd".to_string()],
            ..Default::default()
        };
        let orchestrator = BuildOrchestrator::new(&catalog, backend, store.clone(), InstallationOptions::default());
        let report = orchestrator.run(&plan, CancellationToken::new()).await.unwrap();

        assert!(!report.success());
        assert_eq!(report.failed(), vec!["fd"]);
        assert_eq!(report.skipped(), vec!["uses-fd"]);
        assert_eq!(report.get("bat").unwrap().status, ToolState::Succeeded);

        let manifest = store.load().unwrap();
        assert!(manifest.contains("bat"));
        assert!(!manifest.contains("fd"));
    }

    #[tokio::test]
    async fn records_explicit_and_dependencies() {
        let (_temp, catalog, store) = setup();
        let plan = DependencyPlanner::new(&catalog).plan(&["uses-fd"]).unwrap();
        let orchestrator = BuildOrchestrator::new(
            &catalog,
            RecordingBackend::default(),
            store.clone(),
            InstallationOptions::default(),
        );
        orchestrator.run(&plan, CancellationToken::new()).await.unwrap();

        let manifest = store.load().unwrap();
        let fd = manifest.get("fd").unwrap();
        assert!(!fd.explicit);
        assert_eq!(fd.build_type.as_deref(), Some("standard"));
        let uses_fd = manifest.get("uses-fd").unwrap();
        assert!(uses_fd.explicit);
        assert_eq!(uses_fd.dependencies, vec!["fd"]);
    }

    #[tokio::test]
    async fn unknown_build_type_fails_tool() {
        let (_temp, catalog, store) = setup();
        let plan = DependencyPlanner::new(&catalog).plan(&["bat"]).unwrap();
        let options = InstallationOptions {
            build_type: Some("turbo".to_string()),
            ..Default::default()
        };
        let orchestrator = BuildOrchestrator::new(&catalog, RecordingBackend::default(), store, options);
        let report = orchestrator.run(&plan, CancellationToken::new()).await.unwrap();

        match &report.get("bat").unwrap().status {
            ToolState::Failed(reason) => assert!(reason.contains("turbo")),
            other => panic!("unexpected state: {:?}", other),
        }
        assert!(orchestrator.backend.calls.lock().unwrap().is_empty());
    }
}
