//! End-to-end resolver scenarios over real temporary directory trees.

use assembly_resolver::{
    report::UnificationReason, ArchMismatchSeverity, AssemblyVersion, CancellationToken,
    CopyLocalState, PrimaryReference, ProcessorArchitecture, ResolutionEvent, Resolver,
    ResolverConfig, ResolveError, Severity,
};
use pretty_assertions::assert_eq;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Once,
};

const PKT: &str = "b77a5c561934e089";

fn init_tracing() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn write_assembly(dir: &Path, name: &str, manifest: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, manifest).unwrap();
    path
}

fn config(primaries: Vec<PrimaryReference>, search_paths: Vec<String>) -> ResolverConfig {
    ResolverConfig { primary_assemblies: primaries, search_paths, ..Default::default() }
}

fn primary(fusion_name: &str) -> PrimaryReference {
    PrimaryReference::parse(fusion_name).unwrap()
}

fn warning_codes(events: &[ResolutionEvent]) -> Vec<&'static str> {
    events
        .iter()
        .filter_map(|e| match e {
            ResolutionEvent::Warning { code, .. } => Some(*code),
            _ => None,
        })
        .collect()
}

/// S1: one primary, one matching file, no dependencies.
#[test]
fn simple_resolution() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("lib");
    write_assembly(&dir, "Foo.dll", &format!("assembly Foo, Version=1.0.0.0, PublicKeyToken={PKT}"));
    fs::write(dir.join("Foo.pdb"), "pdb").unwrap();

    let outputs = Resolver::new(config(
        vec![primary(&format!("Foo, Version=1.0.0.0, PublicKeyToken={PKT}"))],
        vec![dir.to_string_lossy().into_owned()],
    ))
    .resolve()
    .unwrap();

    assert!(outputs.success());
    assert_eq!(outputs.resolved_files.len(), 1);
    assert!(outputs.resolved_dependency_files.is_empty());
    assert!(outputs.suggested_redirects.is_empty());
    assert_eq!(outputs.resolved_files[0].path, dir.join("Foo.dll"));
    assert_eq!(outputs.resolved_files[0].copy_local, CopyLocalState::YesHeuristic);
    assert_eq!(outputs.related_files, vec![dir.join("Foo.pdb")]);
    assert!(outputs.copy_local_files.contains(&dir.join("Foo.dll")));
    assert!(outputs.copy_local_files.contains(&dir.join("Foo.pdb")));
    assert!(warning_codes(outputs.log.events()).is_empty());

    // the copy-local decision closes the reference's own log block
    let events = outputs.log.events();
    let resolved = events
        .iter()
        .position(|e| matches!(e, ResolutionEvent::Resolved { .. }))
        .expect("resolved event");
    assert!(matches!(events[resolved + 1], ResolutionEvent::CopyLocalDecision { .. }));
}

fn conflict_tree(tmp: &Path) -> (PathBuf, PathBuf, PathBuf, PathBuf) {
    let roots = tmp.join("roots");
    let lib1 = tmp.join("lib1");
    let lib2 = tmp.join("lib2");
    write_assembly(
        &roots,
        "A.dll",
        &format!("assembly A, Version=1.0.0.0\nreference Lib, Version=1.0.0.0, PublicKeyToken={PKT}"),
    );
    write_assembly(
        &roots,
        "B.dll",
        &format!("assembly B, Version=1.0.0.0\nreference Lib, Version=2.0.0.0, PublicKeyToken={PKT}"),
    );
    let lib_v1 = write_assembly(
        &lib1,
        "Lib.dll",
        &format!("assembly Lib, Version=1.0.0.0, PublicKeyToken={PKT}"),
    );
    let lib_v2 = write_assembly(
        &lib2,
        "Lib.dll",
        &format!("assembly Lib, Version=2.0.0.0, PublicKeyToken={PKT}"),
    );
    (roots, lib1, lib_v1, lib_v2)
}

/// S2: two primaries pull different `Lib` versions; the higher version wins
/// and a redirect is suggested.
#[test]
fn transitive_conflict_without_auto_unify() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let (roots, lib1, _, lib_v2) = conflict_tree(tmp.path());

    let outputs = Resolver::new(config(
        vec![primary("A"), primary("B")],
        vec![
            roots.to_string_lossy().into_owned(),
            lib1.to_string_lossy().into_owned(),
            lib_v2.parent().unwrap().to_string_lossy().into_owned(),
        ],
    ))
    .resolve()
    .unwrap();

    assert!(outputs.success(), "a soluble conflict is a warning, not an error");
    assert_eq!(outputs.resolved_files.len(), 2);
    assert_eq!(outputs.resolved_dependency_files.len(), 1);
    let lib = &outputs.resolved_dependency_files[0];
    assert_eq!(lib.identity.version, Some(AssemblyVersion::new(2, 0, 0, 0)));
    assert_eq!(lib.path, lib_v2);

    assert_eq!(outputs.suggested_redirects.len(), 1);
    let suggested = &outputs.suggested_redirects[0];
    assert_eq!(suggested.identity.simple_name, "lib");
    assert_eq!(suggested.max_version, AssemblyVersion::new(2, 0, 0, 0));

    assert_eq!(warning_codes(outputs.log.events()), vec!["ARR1001"]);
    let events = outputs.log.events();
    let first_conflict = events
        .iter()
        .position(|e| matches!(e, ResolutionEvent::Conflict { .. }))
        .expect("conflict event");
    // per-reference blocks (copy-local included) precede the conflicts
    // section, which precedes the suggested redirects
    let last_copy_local = events
        .iter()
        .rposition(|e| matches!(e, ResolutionEvent::CopyLocalDecision { .. }))
        .expect("copy-local events");
    let first_suggested = events
        .iter()
        .position(|e| matches!(e, ResolutionEvent::SuggestedRedirect { .. }))
        .expect("suggested redirect event");
    assert!(last_copy_local < first_conflict);
    assert!(first_conflict < first_suggested);
}

/// S3: same tree with auto-unify; the conflict disappears and the log shows
/// the auto-unify remap instead of a warning.
#[test]
fn auto_unify_removes_conflict() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let (roots, lib1, _, lib_v2) = conflict_tree(tmp.path());

    let mut cfg = config(
        vec![primary("A"), primary("B")],
        vec![
            roots.to_string_lossy().into_owned(),
            lib1.to_string_lossy().into_owned(),
            lib_v2.parent().unwrap().to_string_lossy().into_owned(),
        ],
    );
    cfg.auto_unify = true;

    let outputs = Resolver::new(cfg).resolve().unwrap();

    assert!(outputs.success());
    assert_eq!(outputs.resolved_dependency_files.len(), 1);
    assert_eq!(
        outputs.resolved_dependency_files[0].identity.version,
        Some(AssemblyVersion::new(2, 0, 0, 0))
    );
    assert!(warning_codes(outputs.log.events()).is_empty(), "auto-unify silences the warning");
    assert!(outputs.log.events().iter().any(|e| matches!(
        e,
        ResolutionEvent::Unified { reason: UnificationReason::AutoUnify, .. }
    )));
    // the redirect is still suggested so a project file can be fixed up
    assert_eq!(outputs.suggested_redirects.len(), 1);
}

/// S4: a subset list that omits `Foo` prunes it from the closure.
#[test]
fn exclusion_list_prunes_reference() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("lib");
    write_assembly(&dir, "Foo.dll", &format!("assembly Foo, Version=1.0.0.0, PublicKeyToken={PKT}"));

    let full_list = tmp.path().join("FrameworkList.xml");
    fs::write(
        &full_list,
        format!(
            r#"<FileList Redist="Test" Name="Framework">
  <File AssemblyName="Foo" PublicKeyToken="{PKT}" Culture="neutral" InGac="true"/>
  <File AssemblyName="Bar" PublicKeyToken="{PKT}" Culture="neutral" InGac="true"/>
</FileList>"#
        ),
    )
    .unwrap();
    let subset_list = tmp.path().join("Client.xml");
    fs::write(
        &subset_list,
        format!(
            r#"<FileList Redist="Test" Name="Client">
  <File AssemblyName="Bar" PublicKeyToken="{PKT}" Culture="neutral" InGac="true"/>
</FileList>"#
        ),
    )
    .unwrap();

    let mut cfg = config(
        vec![primary(&format!("Foo, PublicKeyToken={PKT}"))],
        vec![dir.to_string_lossy().into_owned()],
    );
    cfg.installed_assembly_tables = vec![full_list];
    cfg.installed_assembly_subset_tables = vec![subset_list];

    let outputs = Resolver::new(cfg).resolve().unwrap();

    assert!(outputs.success(), "exclusion is not an error");
    assert!(outputs.resolved_files.is_empty());
    assert!(outputs.copy_local_files.is_empty());
    assert!(outputs.log.events().iter().any(|e| matches!(
        e,
        ResolutionEvent::ExclusionApplied { subset, .. } if subset == "Client"
    )));
}

/// S5: an architecture mismatch at `Error` severity fails the invocation.
#[test]
fn arch_mismatch_severity_error() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("lib");
    write_assembly(
        &dir,
        "Foo.dll",
        "assembly Foo, Version=1.0.0.0, ProcessorArchitecture=amd64",
    );

    let mut cfg = config(vec![primary("Foo")], vec![dir.to_string_lossy().into_owned()]);
    cfg.target_processor_architecture = ProcessorArchitecture::X86;
    cfg.warn_or_error_on_arch_mismatch = ArchMismatchSeverity::Error;

    let outputs = Resolver::new(cfg).resolve().unwrap();
    assert!(!outputs.success());
    assert!(outputs
        .log
        .events()
        .iter()
        .any(|e| e.severity() == Severity::Error && e.to_string().contains("ARR2002")));
}

/// S6 plus invariant 7: a second invocation over an unchanged tree performs
/// zero metadata probes, produces identical outputs and leaves the cache
/// clean.
#[test]
fn cache_reuse_across_invocations() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let (roots, lib1, _, lib_v2) = conflict_tree(tmp.path());
    let state_file = tmp.path().join("state").join("resolver.cache");

    let make_config = || {
        let mut cfg = config(
            vec![primary("A"), primary("B")],
            vec![
                roots.to_string_lossy().into_owned(),
                lib1.to_string_lossy().into_owned(),
                lib_v2.parent().unwrap().to_string_lossy().into_owned(),
            ],
        );
        cfg.state_file = Some(state_file.clone());
        cfg
    };

    let first = Resolver::new(make_config());
    let outputs1 = first.resolve().unwrap();
    assert!(first.cache().disk_probe_count() > 0);
    assert_eq!(outputs1.files_written, vec![state_file.clone()]);
    assert!(!first.cache().is_dirty());

    let second = Resolver::new(make_config());
    let outputs2 = second.resolve().unwrap();
    assert_eq!(second.cache().disk_probe_count(), 0, "everything is served from the cache");
    assert!(!second.cache().is_dirty());
    assert!(outputs2.files_written.is_empty(), "a clean cache is not rewritten");

    assert_eq!(outputs1.resolved_files, outputs2.resolved_files);
    assert_eq!(outputs1.resolved_dependency_files, outputs2.resolved_dependency_files);
    assert_eq!(outputs1.suggested_redirects, outputs2.suggested_redirects);
    assert_eq!(outputs1.log.events(), outputs2.log.events());
}

/// Determinism: equal inputs and cache state yield equal event sequences.
#[test]
fn identical_runs_are_deterministic() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let (roots, lib1, _, lib_v2) = conflict_tree(tmp.path());

    let make_outputs = || {
        Resolver::new(config(
            vec![primary("A"), primary("B")],
            vec![
                roots.to_string_lossy().into_owned(),
                lib1.to_string_lossy().into_owned(),
                lib_v2.parent().unwrap().to_string_lossy().into_owned(),
            ],
        ))
        .resolve()
        .unwrap()
    };

    let outputs1 = make_outputs();
    let outputs2 = make_outputs();
    assert_eq!(outputs1.log.events(), outputs2.log.events());
    assert_eq!(outputs1.resolved_files, outputs2.resolved_files);
    assert_eq!(outputs1.copy_local_files, outputs2.copy_local_files);
}

/// A corrupt state file is discarded with an advisory and rebuilt.
#[test]
fn corrupt_state_file_is_rebuilt() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("lib");
    write_assembly(&dir, "Foo.dll", "assembly Foo, Version=1.0.0.0");
    let state_file = tmp.path().join("resolver.cache");
    fs::write(&state_file, "definitely not a cache").unwrap();

    let mut cfg = config(vec![primary("Foo")], vec![dir.to_string_lossy().into_owned()]);
    cfg.state_file = Some(state_file.clone());

    let outputs = Resolver::new(cfg).resolve().unwrap();
    assert!(outputs.success());
    assert!(outputs.log.events().iter().any(|e| matches!(
        e,
        ResolutionEvent::Advisory { message, .. } if message.contains("state file")
    )));
    // the rebuilt cache replaced the corrupt file
    assert_eq!(outputs.files_written, vec![state_file]);
}

/// Explicit config redirects remap a dependency before the search runs.
#[test]
fn config_redirect_applies_before_search() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let roots = tmp.path().join("roots");
    let lib = tmp.path().join("lib");
    write_assembly(
        &roots,
        "A.dll",
        &format!("assembly A, Version=1.0.0.0\nreference Lib, Version=1.0.0.0, PublicKeyToken={PKT}"),
    );
    // only the redirect target exists on disk
    write_assembly(&lib, "Lib.dll", &format!("assembly Lib, Version=2.0.0.0, PublicKeyToken={PKT}"));

    let app_config = tmp.path().join("app.config");
    fs::write(
        &app_config,
        format!(
            r#"<configuration><runtime><assemblyBinding>
  <dependentAssembly>
    <assemblyIdentity name="Lib" publicKeyToken="{PKT}" culture="neutral"/>
    <bindingRedirect oldVersion="0.0.0.0-1.9.9.9" newVersion="2.0.0.0"/>
  </dependentAssembly>
</assemblyBinding></runtime></configuration>"#
        ),
    )
    .unwrap();

    let mut cfg = config(
        vec![primary("A")],
        vec![roots.to_string_lossy().into_owned(), lib.to_string_lossy().into_owned()],
    );
    cfg.config_file = Some(app_config);

    let outputs = Resolver::new(cfg).resolve().unwrap();
    assert!(outputs.success());
    assert_eq!(outputs.resolved_dependency_files.len(), 1);
    assert_eq!(
        outputs.resolved_dependency_files[0].identity.version,
        Some(AssemblyVersion::new(2, 0, 0, 0))
    );
    assert!(outputs.log.events().iter().any(|e| matches!(
        e,
        ResolutionEvent::Unified { reason: UnificationReason::ConfigRedirect, .. }
    )));
}

/// A malformed redirect configuration aborts the invocation.
#[test]
fn malformed_config_file_aborts() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("lib");
    write_assembly(&dir, "Foo.dll", "assembly Foo, Version=1.0.0.0");
    let app_config = tmp.path().join("app.config");
    fs::write(
        &app_config,
        "<configuration><runtime><assemblyBinding><dependentAssembly>\n<bindingRedirect oldVersion=\"1.0\" newVersion=\"2.0\"/>",
    )
    .unwrap();

    let mut cfg = config(vec![primary("Foo")], vec![dir.to_string_lossy().into_owned()]);
    cfg.config_file = Some(app_config);

    match Resolver::new(cfg).resolve() {
        Err(ResolveError::InvalidConfigFile { .. }) => {}
        other => panic!("expected InvalidConfigFile, got {other:?}"),
    }
}

/// Two primaries disagreeing on a version is an insoluble conflict: both
/// stay resolved, diagnostics escalate to a warning.
#[test]
fn insoluble_conflict_between_primaries() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let lib1 = tmp.path().join("lib1");
    let lib2 = tmp.path().join("lib2");
    write_assembly(&lib1, "Lib.dll", &format!("assembly Lib, Version=1.0.0.0, PublicKeyToken={PKT}"));
    write_assembly(&lib2, "Lib.dll", &format!("assembly Lib, Version=2.0.0.0, PublicKeyToken={PKT}"));

    let outputs = Resolver::new(config(
        vec![
            primary(&format!("Lib, Version=1.0.0.0, PublicKeyToken={PKT}")),
            primary(&format!("Lib, Version=2.0.0.0, PublicKeyToken={PKT}")),
        ],
        vec![lib1.to_string_lossy().into_owned(), lib2.to_string_lossy().into_owned()],
    ))
    .resolve()
    .unwrap();

    assert!(outputs.success(), "insoluble conflicts warn but do not fail the build");
    assert_eq!(warning_codes(outputs.log.events()), vec!["ARR1002"]);
    assert_eq!(outputs.resolved_files.len(), 1);
    assert_eq!(
        outputs.resolved_files[0].identity.version,
        Some(AssemblyVersion::new(2, 0, 0, 0))
    );
}

/// An unresolvable primary warns; an unresolvable dependency stays an
/// advisory.
#[test]
fn resolution_failures_keep_severity_rules() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let roots = tmp.path().join("roots");
    write_assembly(
        &roots,
        "A.dll",
        "assembly A, Version=1.0.0.0\nreference Ghost, Version=1.0.0.0",
    );

    let outputs = Resolver::new(config(
        vec![primary("A"), primary("Missing")],
        vec![roots.to_string_lossy().into_owned()],
    ))
    .resolve()
    .unwrap();

    assert!(outputs.success(), "resolution failures are warnings at worst");
    let codes = warning_codes(outputs.log.events());
    assert_eq!(codes, vec!["ARR3001"], "only the primary failure warns");
    assert!(outputs.log.events().iter().any(|e| matches!(
        e,
        ResolutionEvent::Advisory { code: Some("ARR3002"), message } if message.contains("Ghost")
    )));
    // A itself still resolves
    assert_eq!(outputs.resolved_files.len(), 1);
}

/// `find_dependencies = false` stops after the primaries and short-circuits
/// auto-unify.
#[test]
fn find_dependencies_off_stops_after_primaries() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let (roots, lib1, _, lib_v2) = conflict_tree(tmp.path());

    let mut cfg = config(
        vec![primary("A"), primary("B")],
        vec![
            roots.to_string_lossy().into_owned(),
            lib1.to_string_lossy().into_owned(),
            lib_v2.parent().unwrap().to_string_lossy().into_owned(),
        ],
    );
    cfg.find_dependencies = false;
    cfg.auto_unify = true;

    let outputs = Resolver::new(cfg).resolve().unwrap();
    assert!(outputs.success());
    assert_eq!(outputs.resolved_files.len(), 2);
    assert!(outputs.resolved_dependency_files.is_empty());
    assert!(outputs.suggested_redirects.is_empty());
    assert!(warning_codes(outputs.log.events()).is_empty());
}

/// Externally resolved primaries skip dependency walking by default.
#[test]
fn externally_resolved_skips_dependencies() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let roots = tmp.path().join("roots");
    let lib = tmp.path().join("lib");
    write_assembly(
        &roots,
        "A.dll",
        &format!("assembly A, Version=1.0.0.0\nreference Lib, Version=1.0.0.0, PublicKeyToken={PKT}"),
    );
    write_assembly(&lib, "Lib.dll", &format!("assembly Lib, Version=1.0.0.0, PublicKeyToken={PKT}"));

    let outputs = Resolver::new(config(
        vec![primary("A").externally_resolved()],
        vec![roots.to_string_lossy().into_owned(), lib.to_string_lossy().into_owned()],
    ))
    .resolve()
    .unwrap();
    assert!(outputs.resolved_dependency_files.is_empty());

    let mut cfg = config(
        vec![primary("A").externally_resolved()],
        vec![roots.to_string_lossy().into_owned(), lib.to_string_lossy().into_owned()],
    );
    cfg.find_dependencies_of_externally_resolved = true;
    let outputs = Resolver::new(cfg).resolve().unwrap();
    assert_eq!(outputs.resolved_dependency_files.len(), 1);
}

/// The `System.Runtime` / `netstandard` closure flags.
#[test]
fn depends_on_flags() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let roots = tmp.path().join("roots");
    let lib = tmp.path().join("lib");
    write_assembly(
        &roots,
        "A.dll",
        &format!(
            "assembly A, Version=1.0.0.0\nreference System.Runtime, Version=4.0.0.0, PublicKeyToken={PKT}"
        ),
    );
    write_assembly(
        &lib,
        "System.Runtime.dll",
        &format!("assembly System.Runtime, Version=4.0.0.0, PublicKeyToken={PKT}"),
    );

    let outputs = Resolver::new(config(
        vec![primary("A")],
        vec![roots.to_string_lossy().into_owned(), lib.to_string_lossy().into_owned()],
    ))
    .resolve()
    .unwrap();
    assert!(outputs.depends_on_system_runtime);
    assert!(!outputs.depends_on_netstandard);
}

/// Cancellation aborts without flushing the cache.
#[test]
fn cancellation_aborts_cleanly() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("lib");
    write_assembly(&dir, "Foo.dll", "assembly Foo, Version=1.0.0.0");
    let state_file = tmp.path().join("resolver.cache");

    let mut cfg = config(vec![primary("Foo")], vec![dir.to_string_lossy().into_owned()]);
    cfg.state_file = Some(state_file.clone());

    let token = CancellationToken::new();
    token.cancel();
    match Resolver::new(cfg).resolve_with_cancellation(&token) {
        Err(ResolveError::Cancelled) => {}
        other => panic!("expected cancellation, got {other:?}"),
    }
    assert!(!state_file.exists(), "a cancelled invocation must not flush the cache");
}

/// Resolution from the shared assembly cache turns copy-local off.
#[test]
fn gac_resolution_is_not_copy_local() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let gac = tmp.path().join("gac");
    write_assembly(
        &gac.join("Foo").join(format!("1.0.0.0__{PKT}")),
        "Foo.dll",
        &format!("assembly Foo, Version=1.0.0.0, PublicKeyToken={PKT}"),
    );

    let mut cfg = config(
        vec![primary(&format!("Foo, Version=1.0.0.0, PublicKeyToken={PKT}"))],
        vec!["{Gac}".to_string()],
    );
    cfg.gac_paths = vec![gac];

    let outputs = Resolver::new(cfg).resolve().unwrap();
    assert!(outputs.success());
    assert_eq!(outputs.resolved_files.len(), 1);
    assert_eq!(outputs.resolved_files[0].copy_local, CopyLocalState::NoResolvedFromGac);
    assert!(outputs.copy_local_files.is_empty());
}

/// Primary files resolve at their stated location and contribute their
/// dependencies.
#[test]
fn primary_files_are_roots_with_known_locations() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let roots = tmp.path().join("roots");
    let lib = tmp.path().join("lib");
    let a = write_assembly(
        &roots,
        "A.dll",
        &format!("assembly A, Version=1.0.0.0\nreference Lib, Version=1.0.0.0, PublicKeyToken={PKT}"),
    );
    write_assembly(&lib, "Lib.dll", &format!("assembly Lib, Version=1.0.0.0, PublicKeyToken={PKT}"));

    let cfg = ResolverConfig {
        primary_files: vec![a.clone()],
        search_paths: vec![lib.to_string_lossy().into_owned()],
        ..Default::default()
    };
    let outputs = Resolver::new(cfg).resolve().unwrap();
    assert!(outputs.success());
    assert_eq!(outputs.resolved_files.len(), 1);
    assert_eq!(outputs.resolved_files[0].identity.simple_name, "A");
    assert_eq!(outputs.resolved_dependency_files.len(), 1);
}
