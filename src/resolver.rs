//! Drives the reference-graph closure to completion.
//!
//! The driver is single-threaded at the control-flow level: it owns the
//! [`ReferenceTable`] and the decision log, and consumes the work queue in
//! FIFO order. Candidate searches and metadata probes for one queue wave are
//! fanned out over a bounded worker pool and delivered back through a
//! completion channel, then integrated in deterministic wave order, so two
//! invocations with equal inputs and cache state produce byte-equal outputs.
//!
//! A full invocation is: seed primaries, expand the closure, prune
//! exclusion-list members, decide conflicts, and (in auto-unify mode, when a
//! conflict produced new redirects) recompute the closure once more with the
//! synthesized redirects installed.

use crate::{
    cache::{FsMemo, ProbeCache},
    config::{ArchMismatchSeverity, PrimaryReference, ResolverConfig},
    conflicts::{resolve_conflicts, ConflictOutcome},
    error::{ResolveError, Result},
    identity::{identity_order, AssemblyIdentity, ProcessorArchitecture},
    locator::{AssemblyRequest, CandidateLocator, FileLocation, LocationSource, RejectionReason},
    outputs::{collect_outputs, ClassifierOptions, OutputClassifier, ResolutionOutputs},
    probe::ProbeResult,
    redirects::{load_config_redirects, RedirectSet},
    redist::{Classification, FrameworkPolicy},
    reference::{Reference, ReferenceError, ReferenceKey, ReferenceTable},
    registry::Registry,
    report::{codes, DecisionLog, EventSink, ReferenceKind, ResolutionEvent, UnificationReason},
    utils,
};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
};

/// Cooperative cancellation signal, checked at each queue pop and before
/// each probe dispatch.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// One queued resolution request.
#[derive(Clone, Debug)]
struct WorkItem {
    request: AssemblyRequest,
    is_primary: bool,
    /// `(parent key, identity the parent asked for)` back-edges; empty for
    /// primaries. Wave-level dedup folds extra requesters in here.
    origins: Vec<(ReferenceKey, AssemblyIdentity)>,
    source_items: Vec<String>,
    primary: Option<PrimaryReference>,
}

/// One closure computation over the current redirect set.
struct ClosurePass<'a> {
    config: &'a ResolverConfig,
    locator: CandidateLocator<'a>,
    redirects: &'a RedirectSet,
    cancel: &'a CancellationToken,
    pool: &'a rayon::ThreadPool,
}

impl<'a> ClosurePass<'a> {
    /// Runs the closure to a fixpoint, returning the table and the scratch
    /// log holding the per-reference blocks of this pass.
    fn run(&self) -> Result<(ReferenceTable, DecisionLog)> {
        let mut table = ReferenceTable::new();
        let mut log = DecisionLog::default();
        let mut queue: VecDeque<WorkItem> = VecDeque::new();

        for primary in &self.config.primary_assemblies {
            queue.push_back(WorkItem {
                request: AssemblyRequest {
                    identity: primary.identity.clone(),
                    hint_path: primary.hint_path.clone(),
                    specific_version: primary.specific_version,
                    executable_extension: primary.executable_extension.clone(),
                },
                is_primary: true,
                origins: Vec::new(),
                source_items: vec![primary.item_name.clone()],
                primary: Some(primary.clone()),
            });
        }
        self.seed_primary_files(&mut table, &mut log, &mut queue)?;

        while !queue.is_empty() {
            if self.cancel.is_cancelled() {
                return Err(ResolveError::Cancelled);
            }

            // take one BFS wave; merge-checks are sequential (they read the
            // table), the candidate searches fan out over the pool
            let mut wave: Vec<WorkItem> = Vec::new();
            while let Some(item) = queue.pop_front() {
                if self.merge_into_existing(&mut table, &item) {
                    continue;
                }
                if let Some(slot) = Self::merge_into_wave(&wave, &item) {
                    let kept = &mut wave[slot];
                    kept.origins.extend(item.origins);
                    for item_name in item.source_items {
                        if !kept.source_items.contains(&item_name) {
                            kept.source_items.push(item_name);
                        }
                    }
                    continue;
                }
                wave.push(item);
            }

            let outcomes = self.locate_wave(&wave)?;

            for (item, outcome) in wave.into_iter().zip(outcomes) {
                self.integrate(&mut table, &mut log, &mut queue, item, outcome);
            }
        }

        Ok((table, log))
    }

    /// Roots stated as file paths resolve directly at their location.
    fn seed_primary_files(
        &self,
        table: &mut ReferenceTable,
        log: &mut DecisionLog,
        queue: &mut VecDeque<WorkItem>,
    ) -> Result<()> {
        for path in &self.config.primary_files {
            if self.cancel.is_cancelled() {
                return Err(ResolveError::Cancelled);
            }
            let path = utils::canonicalized(path);
            match self.locator.cache.probe(&path) {
                Ok(probe) => {
                    let identity = probe.identity.clone();
                    log.push(ResolutionEvent::PrimaryOrDependency {
                        identity: identity.clone(),
                        kind: ReferenceKind::Primary,
                    });
                    log.push(ResolutionEvent::Resolved {
                        identity: identity.clone(),
                        location: path.clone(),
                    });
                    let key = ReferenceKey::of(&identity);
                    let mut reference = Reference::new(identity.clone(), true);
                    reference.add_source_item(&path.to_string_lossy());
                    self.apply_resolution(
                        &mut reference,
                        FileLocation {
                            last_write_time: utils::last_write_time(&path).ok(),
                            path,
                            source: LocationSource::RawFile,
                            search_path_index: usize::MAX,
                        },
                        probe.clone(),
                    );
                    self.enqueue_dependencies(queue, &key, &reference, &probe);
                    table.insert(key, reference);
                }
                Err(err) => {
                    let stem = path
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.to_string_lossy().into_owned());
                    let identity = AssemblyIdentity::new(stem);
                    log.push(ResolutionEvent::PrimaryOrDependency {
                        identity: identity.clone(),
                        kind: ReferenceKind::Primary,
                    });
                    log.push(ResolutionEvent::Considered {
                        location: path.clone(),
                        reason: RejectionReason::TargetHadNoFusionName,
                    });
                    log.push(ResolutionEvent::coded_advisory(
                        codes::BAD_IMAGE,
                        format!("\"{}\" could not be read as an assembly: {err}", path.display()),
                    ));
                    let mut reference = Reference::new(identity.clone(), true);
                    reference.add_source_item(&path.to_string_lossy());
                    reference
                        .record_error(ReferenceError::BadImage { path, reason: err.to_string() });
                    reference.record_error(ReferenceError::ResolutionFailed);
                    table.insert(ReferenceKey::of(&identity), reference);
                }
            }
        }
        Ok(())
    }

    /// Step 2a: merge into an existing table entry when the request matches
    /// under its own match mode.
    fn merge_into_existing(&self, table: &mut ReferenceTable, item: &WorkItem) -> bool {
        let (effective, _) = self.effective_identity(&item.request.identity);
        let mode = item.request.match_mode();
        let existing = match mode {
            crate::identity::MatchMode::Strict => table.find_strict(&effective).cloned(),
            crate::identity::MatchMode::Simple => table.find_simple(&effective).cloned(),
        };
        let Some(key) = existing else { return false };
        if let Some(reference) = table.get_mut(&key) {
            for (parent, requested) in &item.origins {
                reference.add_dependee(parent.clone(), requested.clone());
            }
            for item_name in &item.source_items {
                reference.add_source_item(item_name);
            }
        }
        true
    }

    /// Dedup within one wave: a later request matching an earlier one under
    /// its own mode is folded into it.
    fn merge_into_wave(wave: &[WorkItem], item: &WorkItem) -> Option<usize> {
        let mode = item.request.match_mode();
        wave.iter()
            .position(|kept| kept.request.identity.matches(&item.request.identity, mode))
    }

    /// Step 2b: apply the redirect engine to the requested identity.
    fn effective_identity(
        &self,
        requested: &AssemblyIdentity,
    ) -> (AssemblyIdentity, Option<UnificationReason>) {
        match self.redirects.apply(requested) {
            Some((version, reason)) => {
                let mut identity = requested.clone();
                identity.version = Some(version);
                (identity, Some(reason))
            }
            None => (requested.clone(), None),
        }
    }

    /// Step 2c: run the candidate searches of one wave on the worker pool,
    /// delivering results through a completion channel.
    fn locate_wave(&self, wave: &[WorkItem]) -> Result<Vec<crate::locator::LocateOutcome>> {
        let requests: Vec<AssemblyRequest> = wave
            .iter()
            .map(|item| {
                let (effective, _) = self.effective_identity(&item.request.identity);
                AssemblyRequest { identity: effective, ..item.request.clone() }
            })
            .collect();

        if requests.len() <= 1 {
            return requests
                .iter()
                .map(|request| {
                    if self.cancel.is_cancelled() {
                        return Err(ResolveError::Cancelled);
                    }
                    Ok(self.locator.locate(request))
                })
                .collect();
        }

        let locator = &self.locator;
        let cancel = self.cancel;
        let (tx, rx) = mpsc::sync_channel(requests.len());
        self.pool.scope(|scope| {
            for (index, request) in requests.iter().enumerate() {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    if cancel.is_cancelled() {
                        return;
                    }
                    let outcome = locator.locate(request);
                    let _ = tx.send((index, outcome));
                });
            }
        });
        drop(tx);

        let mut slots: Vec<Option<crate::locator::LocateOutcome>> =
            (0..requests.len()).map(|_| None).collect();
        for (index, outcome) in rx {
            slots[index] = Some(outcome);
        }
        if self.cancel.is_cancelled() || slots.iter().any(Option::is_none) {
            return Err(ResolveError::Cancelled);
        }
        Ok(slots.into_iter().map(|slot| slot.expect("all slots filled")).collect())
    }

    /// Steps 2d/2e: record the search outcome on a fresh reference and
    /// enqueue its dependencies.
    fn integrate(
        &self,
        table: &mut ReferenceTable,
        log: &mut DecisionLog,
        queue: &mut VecDeque<WorkItem>,
        item: WorkItem,
        outcome: crate::locator::LocateOutcome,
    ) {
        let (effective, unification) = self.effective_identity(&item.request.identity);

        // requests that unified onto an existing entry mid-wave merge here,
        // the same way step 2a merges at pop time
        let key = ReferenceKey::of(&effective);
        if let Some(existing) = table.get_mut(&key) {
            for (parent, requested) in &item.origins {
                existing.add_dependee(parent.clone(), requested.clone());
            }
            for item_name in &item.source_items {
                existing.add_source_item(item_name);
            }
            return;
        }

        let kind =
            if item.is_primary { ReferenceKind::Primary } else { ReferenceKind::Dependency };
        log.push(ResolutionEvent::PrimaryOrDependency {
            identity: effective.clone(),
            kind,
        });

        let mut reference = Reference::new(effective.clone(), item.is_primary);
        if let Some(reason) = unification {
            reference.is_unified = true;
            reference.pre_unification_versions.push(crate::reference::PreUnificationVersion {
                version: item.request.identity.version_or_zero(),
                reason,
            });
            log.push(ResolutionEvent::Unified {
                identity: item.request.identity.clone(),
                from: item.request.identity.version_or_zero(),
                to: effective.version_or_zero(),
                reason,
            });
        }
        for (parent, requested) in &item.origins {
            reference.add_dependee(parent.clone(), requested.clone());
        }
        for item_name in &item.source_items {
            reference.add_source_item(item_name);
        }
        if let Some(primary) = &item.primary {
            reference.hint_path = primary.hint_path.clone();
            reference.private = primary.private;
            reference.specific_version = primary.specific_version;
            reference.embed_interop = primary.embed_interop;
            reference.executable_extension = primary.executable_extension.clone();
            reference.sub_type = primary.sub_type.clone();
            reference.is_externally_resolved = primary.is_externally_resolved;
        }

        for considered in &outcome.considered {
            log.push(ResolutionEvent::Considered {
                location: considered.path.clone(),
                reason: considered.reason,
            });
            if considered.reason == RejectionReason::TargetHadNoFusionName {
                let detail = considered.detail.clone().unwrap_or_default();
                log.push(ResolutionEvent::coded_advisory(
                    codes::BAD_IMAGE,
                    format!(
                        "\"{}\" could not be read as an assembly: {detail}",
                        considered.path.display()
                    ),
                ));
                reference.record_error(ReferenceError::BadImage {
                    path: considered.path.clone(),
                    reason: detail,
                });
            }
        }
        reference.considered_locations = outcome.considered;

        match outcome.resolved {
            Some((location, probe)) => {
                log.push(ResolutionEvent::Resolved {
                    identity: probe.identity.clone(),
                    location: location.path.clone(),
                });
                self.apply_resolution(&mut reference, location, probe.clone());
                let skip_dependencies = reference.is_externally_resolved
                    && !self.config.find_dependencies_of_externally_resolved;
                if !skip_dependencies {
                    self.enqueue_dependencies(queue, &key, &reference, &probe);
                }
            }
            None => {
                reference.record_error(ReferenceError::ResolutionFailed);
            }
        }

        table.insert(key, reference);
    }

    fn apply_resolution(
        &self,
        reference: &mut Reference,
        location: FileLocation,
        probe: Arc<ProbeResult>,
    ) {
        reference.resolved_identity = Some(probe.identity.clone());
        reference.is_winmd = probe.is_winmd;
        reference.runtime_version = Some(probe.runtime_version.clone());
        reference.is_framework_file = location.source == LocationSource::FrameworkDir;
        reference.resolved_location = Some(location);
        reference.probe = Some(probe);
    }

    /// Step 2e: enqueue referenced identities, sorted so expansion order is
    /// deterministic.
    fn enqueue_dependencies(
        &self,
        queue: &mut VecDeque<WorkItem>,
        parent: &ReferenceKey,
        parent_reference: &Reference,
        probe: &ProbeResult,
    ) {
        if !self.config.find_dependencies {
            return;
        }
        let mut dependencies = probe.references.clone();
        dependencies.sort_by(identity_order);
        dependencies.dedup();
        for dependency in dependencies {
            queue.push_back(WorkItem {
                request: AssemblyRequest::new(dependency.clone()),
                is_primary: false,
                origins: vec![(parent.clone(), dependency)],
                source_items: parent_reference.source_items.clone(),
                primary: None,
            });
        }
    }
}

/// Step 3: remove excluded references, the edges to them, and any dependency
/// orphaned by the removal. Returns the exclusion events for the log's
/// post-block section.
fn prune_exclusions(table: &mut ReferenceTable, policy: &FrameworkPolicy) -> Vec<ResolutionEvent> {
    let mut events = Vec::new();
    let mut removed: Vec<ReferenceKey> = Vec::new();
    let excluded: Vec<(ReferenceKey, String)> = table
        .iter()
        .filter_map(|(key, reference)| {
            match policy.classify(reference.effective_identity()) {
                Classification::Excluded { subset } => Some((key.clone(), subset)),
                _ => None,
            }
        })
        .collect();

    for (key, subset) in excluded {
        if let Some(reference) = table.remove(&key) {
            events.push(ResolutionEvent::ExclusionApplied {
                identity: reference.effective_identity().clone(),
                subset,
            });
            removed.push(key);
        }
    }

    // cascade: drop edges to removed nodes, then any non-primary left
    // without a dependee
    while !removed.is_empty() {
        let gone = std::mem::take(&mut removed);
        let mut orphans: Vec<ReferenceKey> = Vec::new();
        for (key, reference) in table.iter_mut() {
            reference.dependees.retain(|d| !gone.contains(&d.key));
            if !reference.is_primary && reference.dependees.is_empty() {
                orphans.push(key.clone());
            }
        }
        for key in orphans {
            if table.remove(&key).is_some() {
                removed.push(key);
            }
        }
    }

    events
}

/// Applies framework classification flags to every reference.
fn mark_framework_membership(table: &mut ReferenceTable, policy: &FrameworkPolicy) {
    for (_, reference) in table.iter_mut() {
        if let Classification::InFramework { redist_name, .. } =
            policy.classify(reference.effective_identity())
        {
            reference.is_framework_file = true;
            reference.redist_name = Some(redist_name);
        }
    }
}

/// Records `DependencyFailed` on every resolved parent of an unresolved
/// dependency and logs the aggregated advisories.
fn record_dependency_failures(table: &mut ReferenceTable, log: &mut DecisionLog) {
    let failures: Vec<(ReferenceKey, AssemblyIdentity, Vec<ReferenceKey>)> = table
        .iter()
        .filter(|(_, r)| !r.is_resolved())
        .map(|(key, r)| {
            (
                key.clone(),
                r.effective_identity().clone(),
                r.dependees.iter().map(|d| d.key.clone()).collect(),
            )
        })
        .collect();

    for (key, identity, parents) in failures {
        let is_primary = table.get(&key).map(|r| r.is_primary).unwrap_or(false);
        if is_primary {
            log.push(ResolutionEvent::Warning {
                code: codes::RESOLUTION_FAILED,
                message: format!("could not resolve primary reference \"{identity}\""),
            });
        }
        for parent in parents {
            if let Some(parent_reference) = table.get_mut(&parent) {
                parent_reference
                    .record_error(ReferenceError::DependencyFailed { dependency: identity.clone() });
            }
        }
        if !is_primary {
            log.push(ResolutionEvent::coded_advisory(
                codes::DEPENDENCY_FAILED,
                format!(
                    "dependency \"{identity}\" could not be resolved; dependent references may fail at runtime"
                ),
            ));
        }
    }
}

/// Raises architecture mismatch diagnostics at the configured severity.
fn check_architectures(
    table: &mut ReferenceTable,
    target: ProcessorArchitecture,
    severity: ArchMismatchSeverity,
    log: &mut DecisionLog,
) {
    if target == ProcessorArchitecture::None || severity == ArchMismatchSeverity::None {
        return;
    }
    let mismatches: Vec<(ReferenceKey, AssemblyIdentity, ProcessorArchitecture)> = table
        .live()
        .filter_map(|(key, reference)| {
            let probe = reference.probe.as_ref()?;
            (!probe.architecture.is_compatible_with(target))
                .then(|| (key.clone(), reference.effective_identity().clone(), probe.architecture))
        })
        .collect();

    for (key, identity, got) in mismatches {
        if let Some(reference) = table.get_mut(&key) {
            reference.record_error(ReferenceError::ArchMismatch { want: target, got });
        }
        let message =
            format!("\"{identity}\" targets {got} but the project targets {target}");
        match severity {
            ArchMismatchSeverity::Warning => {
                log.push(ResolutionEvent::Warning { code: codes::ARCH_MISMATCH, message })
            }
            ArchMismatchSeverity::Error => {
                log.push(ResolutionEvent::Error { code: codes::ARCH_MISMATCH, message })
            }
            ArchMismatchSeverity::None => {}
        }
    }
}

/// Replays the per-reference blocks of a closure pass into the main log,
/// closing each block with the copy-local decision of its reference.
///
/// Blocks open at `PrimaryOrDependency` and run until the next one; entries
/// that no longer exist in the table (pruned by exclusion) get no decision.
fn replay_reference_blocks(log: &mut DecisionLog, pass_log: &DecisionLog, table: &ReferenceTable) {
    let close_block = |log: &mut DecisionLog, identity: &AssemblyIdentity| {
        if let Some(reference) = table.get(&ReferenceKey::of(identity)) {
            if let Some(state) = reference.copy_local {
                log.push(ResolutionEvent::CopyLocalDecision {
                    identity: reference.effective_identity().clone(),
                    state,
                });
            }
        }
    };

    let mut open_block: Option<AssemblyIdentity> = None;
    for event in pass_log.events() {
        if let ResolutionEvent::PrimaryOrDependency { identity, .. } = event {
            if let Some(previous) = open_block.take() {
                close_block(log, &previous);
            }
            open_block = Some(identity.clone());
        }
        log.push(event.clone());
    }
    if let Some(previous) = open_block.take() {
        close_block(log, &previous);
    }
}

/// Flags references built for a newer runtime than the targeted one.
fn check_runtime_versions(table: &ReferenceTable, targeted: &str, log: &mut DecisionLog) {
    let Some(targeted_version) = crate::locator::parse_loose_version(targeted) else { return };
    for (_, reference) in table.live() {
        let Some(runtime) = &reference.runtime_version else { continue };
        if let Some(runtime_version) = crate::locator::parse_loose_version(runtime) {
            if runtime_version > targeted_version {
                log.push(ResolutionEvent::advisory(format!(
                    "\"{}\" requires runtime {runtime}, newer than the targeted {targeted}",
                    reference.effective_identity()
                )));
            }
        }
    }
}

/// One full resolver invocation; see the module docs for the sequence.
pub(crate) struct ResolutionDriver<'a> {
    pub config: &'a ResolverConfig,
    pub cache: &'a ProbeCache,
    pub registry: &'a dyn Registry,
    pub sink: Option<Arc<dyn EventSink>>,
    pub cancel: &'a CancellationToken,
    /// Advisory from a failed state-file load, surfaced once per invocation.
    pub cache_advisory: Option<&'a str>,
}

impl<'a> ResolutionDriver<'a> {
    pub fn run(self) -> Result<ResolutionOutputs> {
        self.config.validate()?;
        let search_paths = self.config.parsed_search_paths()?;
        let verbose = self.config.verbose_search();
        let mut log = DecisionLog::new(self.sink.clone(), self.config.silent, verbose);

        self.log_inputs(&mut log);
        if let Some(advisory) = self.cache_advisory {
            log.push(ResolutionEvent::advisory(advisory));
        }

        // C5: framework membership policy
        let policy = FrameworkPolicy::load(
            &self.config.effective_installed_tables(),
            &self.config.effective_subset_tables(),
            &self.config.effective_full_framework_tables(),
            &self.config.full_subset_names,
        );
        for advisory in &policy.advisories {
            log.push(ResolutionEvent::advisory(advisory.clone()));
        }

        // C6: explicit redirects, then framework retargets
        let mut redirects = match &self.config.config_file {
            Some(path) => RedirectSet::new(load_config_redirects(path)?),
            None => RedirectSet::default(),
        };
        redirects.add_framework_retargets(policy.redist());

        let memo = FsMemo::new();
        let jobs = num_cpus::get().max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|err| ResolveError::msg(format!("failed to build worker pool: {err}")))?;
        let base_locator = CandidateLocator {
            search_paths: &search_paths,
            extensions: &self.config.allowed_assembly_extensions,
            framework_dirs: &self.config.target_framework_dirs,
            gac_paths: &self.config.gac_paths,
            candidate_files: &self.config.candidate_assembly_files,
            target_arch: self.config.target_processor_architecture,
            registry: self.registry,
            cache: self.cache,
            memo: &memo,
        };

        // auto-unify needs a closure to operate on (see ResolverConfig)
        let auto_unify = self.config.auto_unify && self.config.find_dependencies;

        // first closure pass
        let (mut table, mut pass_log) = ClosurePass {
            config: self.config,
            locator: base_locator,
            redirects: &redirects,
            cancel: self.cancel,
            pool: &pool,
        }
        .run()?;
        let mut exclusion_events = prune_exclusions(&mut table, &policy);
        let mut outcome = resolve_conflicts(&mut table, auto_unify);
        let suggested = outcome.suggested_redirects.clone();

        // one additional pass lets the synthesized redirects propagate
        if auto_unify && !outcome.auto_unify_redirects.is_empty() {
            redirects.add_auto_unify(outcome.auto_unify_redirects.drain(..));
            let (second_table, second_log) = ClosurePass {
                config: self.config,
                locator: base_locator,
                redirects: &redirects,
                cancel: self.cancel,
                pool: &pool,
            }
            .run()?;
            table = second_table;
            pass_log = second_log;
            exclusion_events = prune_exclusions(&mut table, &policy);
            outcome = resolve_conflicts(&mut table, false);
        }

        // C9: copy-local and auxiliary file classification; runs before the
        // log replay so every reference block can close with its decision
        mark_framework_membership(&mut table, &policy);
        let classifier = OutputClassifier {
            policy: &policy,
            memo: &memo,
            locator: &base_locator,
            options: ClassifierOptions {
                related_extensions: &self.config.allowed_related_file_extensions,
                find_related_files: self.config.find_related_files,
                find_satellites: self.config.find_satellites,
                find_serialization_assemblies: self.config.find_serialization_assemblies,
                do_not_copy_local_if_in_gac: self.config.do_not_copy_local_if_in_gac,
                copy_local_dependencies_when_parent_in_gac: self
                    .config
                    .copy_local_dependencies_when_parent_in_gac,
            },
        };
        classifier.classify(&mut table);

        replay_reference_blocks(&mut log, &pass_log, &table);
        for event in exclusion_events {
            log.push(event);
        }

        self.log_conflicts(&mut log, &outcome, auto_unify);
        for redirect in &suggested {
            log.push(ResolutionEvent::SuggestedRedirect {
                identity: redirect.identity.clone(),
                new_version: redirect.max_version,
            });
        }

        // trailing diagnostics section
        record_dependency_failures(&mut table, &mut log);
        check_runtime_versions(&table, &self.config.targeted_runtime_version, &mut log);
        check_architectures(
            &mut table,
            self.config.target_processor_architecture,
            self.config.warn_or_error_on_arch_mismatch,
            &mut log,
        );

        let mut outputs = ResolutionOutputs::default();
        collect_outputs(&table, &mut outputs);
        outputs.suggested_redirects = suggested;

        // C3: flush on exit; io failures are reported but never fatal
        if let Some(state_file) = &self.config.state_file {
            if self.cache.is_dirty() {
                match self.cache.flush(state_file) {
                    Ok(()) => outputs.files_written.push(state_file.clone()),
                    Err(err) => log.push(ResolutionEvent::advisory(format!(
                        "failed to write state file \"{}\": {err}",
                        state_file.display()
                    ))),
                }
            }
        }

        debug_assert!(table.verify_invariants().is_ok(), "{:?}", table.verify_invariants());
        outputs.log = log;
        Ok(outputs)
    }

    fn log_inputs(&self, log: &mut DecisionLog) {
        let config = self.config;
        let primaries: Vec<String> =
            config.primary_assemblies.iter().map(|p| p.identity.to_string()).collect();
        log.push(ResolutionEvent::Input {
            name: "primary_assemblies",
            value: primaries.join("; "),
        });
        log.push(ResolutionEvent::Input {
            name: "search_paths",
            value: config.search_paths.join(";"),
        });
        log.push(ResolutionEvent::Input {
            name: "target_processor_architecture",
            value: config.target_processor_architecture.to_string(),
        });
        log.push(ResolutionEvent::Input {
            name: "targeted_runtime_version",
            value: config.targeted_runtime_version.clone(),
        });
        if let Some(moniker) = &config.target_framework_moniker {
            log.push(ResolutionEvent::Input {
                name: "target_framework_moniker",
                value: moniker.clone(),
            });
        }
        log.push(ResolutionEvent::Input {
            name: "auto_unify",
            value: config.auto_unify.to_string(),
        });
        log.push(ResolutionEvent::Input {
            name: "find_dependencies",
            value: config.find_dependencies.to_string(),
        });
    }

    fn log_conflicts(&self, log: &mut DecisionLog, outcome: &ConflictOutcome, auto_unify: bool) {
        for decision in &outcome.decisions {
            log.push(ResolutionEvent::Conflict {
                winner: decision.winner.clone(),
                loser: decision.loser.clone(),
                reason: decision.reason,
            });
            if decision.insoluble {
                log.push(ResolutionEvent::Warning {
                    code: codes::INSOLUBLE_CONFLICT,
                    message: format!(
                        "primary references \"{}\" and \"{}\" disagree on the version; both are kept",
                        decision.winner, decision.loser
                    ),
                });
            } else if !auto_unify {
                log.push(ResolutionEvent::Warning {
                    code: codes::SOLUBLE_CONFLICT,
                    message: format!(
                        "found conflicts between versions of \"{}\"; \"{}\" was chosen over \"{}\"",
                        decision.winner.simple_name, decision.winner, decision.loser
                    ),
                });
            }
        }
    }
}
