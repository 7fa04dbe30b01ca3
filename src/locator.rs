//! Candidate search across the configured search paths.
//!
//! For a requested identity the [`CandidateLocator`] walks the search-path
//! list strictly in order, yields candidate files, probes them through the
//! cache and picks the first whose identity matches the request. Every
//! location that was examined and did not match is recorded with a
//! [`RejectionReason`] so the decision log can explain the search.

use crate::{
    cache::{FsMemo, ProbeCache},
    error::{ResolveError, Result},
    identity::{AssemblyIdentity, AssemblyVersion, MatchMode, ProcessorArchitecture},
    probe::{ProbeError, ProbeResult},
    registry::{Registry, RegistryRoot},
    utils,
};
use std::{
    fmt,
    path::PathBuf,
    sync::Arc,
};

/// Registry location of legacy `{AssemblyFolders}` directories.
const ASSEMBLY_FOLDERS_KEY: &str = r"Software\Microsoft\.NETFramework\AssemblyFolders";

/// One entry of the search-path list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchPath {
    /// A literal directory scanned for `{name}.{ext}`.
    Directory(PathBuf),
    /// The requester's hint-path attribute as a single candidate.
    HintPath,
    /// The configured candidate-files list, filtered by allowed extensions.
    CandidateAssemblyFiles,
    /// A platform-registry subtree deriving directories.
    Registry { base: String, version: String, suffix: String },
    /// Legacy registered directories.
    AssemblyFolders,
    /// The shared assembly cache.
    Gac,
    /// The request's name treated literally as a path.
    RawFileName,
    /// The configured target framework directories, in order.
    TargetFrameworkDirectory,
}

impl SearchPath {
    /// Parses one search-path token.
    pub fn parse(token: &str) -> Result<Self> {
        let token = token.trim();
        if !token.starts_with('{') {
            if token.is_empty() {
                return Err(ResolveError::invalid_parameter("search_paths", "empty entry"));
            }
            return Ok(Self::Directory(PathBuf::from(token)));
        }
        if let Some(inner) =
            token.strip_prefix("{Registry:").and_then(|rest| rest.strip_suffix('}'))
        {
            let mut parts = inner.splitn(3, ',').map(str::trim);
            let (base, version, suffix) = (parts.next(), parts.next(), parts.next());
            return match (base, version, suffix) {
                (Some(base), Some(version), Some(suffix)) if !base.is_empty() => {
                    Ok(Self::Registry {
                        base: base.to_string(),
                        version: version.to_string(),
                        suffix: suffix.to_string(),
                    })
                }
                _ => Err(ResolveError::invalid_parameter("search_paths", token)),
            };
        }
        match token.to_ascii_lowercase().as_str() {
            "{hintpath}" => Ok(Self::HintPath),
            "{candidateassemblyfiles}" => Ok(Self::CandidateAssemblyFiles),
            "{assemblyfolders}" => Ok(Self::AssemblyFolders),
            "{gac}" => Ok(Self::Gac),
            "{rawfilename}" => Ok(Self::RawFileName),
            "{targetframeworkdirectory}" => Ok(Self::TargetFrameworkDirectory),
            _ => Err(ResolveError::invalid_parameter("search_paths", token)),
        }
    }

    /// Parses a whole search-path list, preserving order.
    pub fn parse_list<I, S>(tokens: I) -> Result<Vec<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tokens.into_iter().map(|t| Self::parse(t.as_ref())).collect()
    }
}

/// Where a candidate file came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LocationSource {
    HintPath,
    CandidateFile,
    Directory,
    Registry,
    Gac,
    RawFile,
    FrameworkDir,
}

/// A concrete candidate file, tagged with the search-path entry that
/// produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileLocation {
    pub path: PathBuf,
    pub last_write_time: Option<i64>,
    pub source: LocationSource,
    /// Index into the search-path list; the conflict tie-break of last
    /// resort.
    pub search_path_index: usize,
}

/// Why a considered candidate was not selected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectionReason {
    FileNotFound,
    FusionNamesDidNotMatch,
    TargetHadNoFusionName,
    NotInGac,
    NotAFileNameOnDisk,
    ProcessorArchitectureDoesNotMatch,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FileNotFound => "the file did not exist",
            Self::FusionNamesDidNotMatch => "the fusion names did not match",
            Self::TargetHadNoFusionName => "the target had no fusion name",
            Self::NotInGac => "the assembly is not in the GAC",
            Self::NotAFileNameOnDisk => "the name is not a file name on disk",
            Self::ProcessorArchitectureDoesNotMatch => "the processor architecture did not match",
        };
        f.write_str(s)
    }
}

/// A candidate that was examined and rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsideredLocation {
    pub path: PathBuf,
    pub source: LocationSource,
    pub search_path_index: usize,
    pub reason: RejectionReason,
    /// Extra detail, e.g. the bad-image reason.
    pub detail: Option<String>,
}

/// One resolution request as seen by the locator.
#[derive(Clone, Debug, Default)]
pub struct AssemblyRequest {
    pub identity: AssemblyIdentity,
    /// The requester's hint-path attribute, used by `{HintPath}`.
    pub hint_path: Option<PathBuf>,
    /// Forces strict (`Some(true)`) or simple (`Some(false)`) matching.
    pub specific_version: Option<bool>,
    /// Restricts the extension list, e.g. `.exe` for executables.
    pub executable_extension: Option<String>,
}

impl AssemblyRequest {
    pub fn new(identity: AssemblyIdentity) -> Self {
        Self { identity, ..Default::default() }
    }

    /// The match mode the candidate search uses for this request: strict when
    /// a specific version was demanded or the request is strong-named with a
    /// version, simple otherwise.
    pub fn match_mode(&self) -> MatchMode {
        match self.specific_version {
            Some(true) => MatchMode::Strict,
            Some(false) => MatchMode::Simple,
            None => {
                if self.identity.is_strong_named() && self.identity.version.is_some() {
                    MatchMode::Strict
                } else {
                    MatchMode::Simple
                }
            }
        }
    }
}

/// The outcome of one candidate search.
#[derive(Debug, Default)]
pub struct LocateOutcome {
    pub resolved: Option<(FileLocation, Arc<ProbeResult>)>,
    pub considered: Vec<ConsideredLocation>,
}

/// Walks the search-path list for requested identities.
#[derive(Clone, Copy)]
pub struct CandidateLocator<'a> {
    pub search_paths: &'a [SearchPath],
    pub extensions: &'a [String],
    pub framework_dirs: &'a [PathBuf],
    pub gac_paths: &'a [PathBuf],
    pub candidate_files: &'a [PathBuf],
    pub target_arch: ProcessorArchitecture,
    pub registry: &'a dyn Registry,
    pub cache: &'a ProbeCache,
    pub memo: &'a FsMemo,
}

impl<'a> CandidateLocator<'a> {
    /// Runs the candidate search for `request`, returning the first matching
    /// candidate and every rejected location.
    pub fn locate(&self, request: &AssemblyRequest) -> LocateOutcome {
        let mut outcome = LocateOutcome::default();
        let mode = request.match_mode();

        for (index, entry) in self.search_paths.iter().enumerate() {
            let done = match entry {
                SearchPath::Directory(dir) => {
                    self.try_directories(request, mode, index, std::slice::from_ref(dir), LocationSource::Directory, &mut outcome)
                }
                SearchPath::HintPath => self.try_hint_path(request, mode, index, &mut outcome),
                SearchPath::CandidateAssemblyFiles => {
                    self.try_candidate_files(request, mode, index, &mut outcome)
                }
                SearchPath::Registry { base, version, suffix } => {
                    let dirs = self.registry_directories(base, version, suffix);
                    self.try_directories(request, mode, index, &dirs, LocationSource::Registry, &mut outcome)
                }
                SearchPath::AssemblyFolders => {
                    let dirs = self.assembly_folders_directories();
                    self.try_directories(request, mode, index, &dirs, LocationSource::Registry, &mut outcome)
                }
                SearchPath::Gac => self.try_gac(request, index, &mut outcome),
                SearchPath::RawFileName => self.try_raw_file(request, index, &mut outcome),
                SearchPath::TargetFrameworkDirectory => self.try_directories(
                    request,
                    mode,
                    index,
                    self.framework_dirs,
                    LocationSource::FrameworkDir,
                    &mut outcome,
                ),
            };
            if done {
                break;
            }
        }

        outcome
    }

    /// Whether the identity can be found in the shared assembly cache at all,
    /// regardless of the search-path list. Used by the copy-local rules.
    pub fn gac_contains(&self, identity: &AssemblyIdentity) -> bool {
        let mut scratch = LocateOutcome::default();
        let request = AssemblyRequest::new(identity.clone());
        self.try_gac(&request, usize::MAX, &mut scratch);
        scratch.resolved.is_some()
    }

    /// The file extensions in effect for `request`.
    fn effective_extensions(&self, request: &AssemblyRequest) -> Vec<String> {
        match &request.executable_extension {
            Some(ext) => vec![ext.clone()],
            None => self.extensions.to_vec(),
        }
    }

    fn try_directories(
        &self,
        request: &AssemblyRequest,
        mode: MatchMode,
        index: usize,
        dirs: &[PathBuf],
        source: LocationSource,
        outcome: &mut LocateOutcome,
    ) -> bool {
        for dir in dirs {
            for ext in self.effective_extensions(request) {
                let path = dir.join(format!("{}{ext}", request.identity.simple_name));
                if !self.memo.exists(&path) {
                    outcome.considered.push(ConsideredLocation {
                        path,
                        source,
                        search_path_index: index,
                        reason: RejectionReason::FileNotFound,
                        detail: None,
                    });
                    continue;
                }
                if self.check_candidate(request, mode, index, path, source, outcome) {
                    return true;
                }
            }
        }
        false
    }

    fn try_hint_path(
        &self,
        request: &AssemblyRequest,
        mode: MatchMode,
        index: usize,
        outcome: &mut LocateOutcome,
    ) -> bool {
        let Some(hint) = &request.hint_path else { return false };
        if !self.memo.exists(hint) {
            outcome.considered.push(ConsideredLocation {
                path: hint.clone(),
                source: LocationSource::HintPath,
                search_path_index: index,
                reason: RejectionReason::FileNotFound,
                detail: None,
            });
            return false;
        }
        self.check_candidate(request, mode, index, hint.clone(), LocationSource::HintPath, outcome)
    }

    fn try_candidate_files(
        &self,
        request: &AssemblyRequest,
        mode: MatchMode,
        index: usize,
        outcome: &mut LocateOutcome,
    ) -> bool {
        let extensions = self.effective_extensions(request);
        for file in self.candidate_files {
            if !utils::has_extension(file, &extensions) {
                continue;
            }
            let stem_matches = file
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|stem| stem.eq_ignore_ascii_case(&request.identity.simple_name));
            if !stem_matches {
                continue;
            }
            if self.check_candidate(
                request,
                mode,
                index,
                file.clone(),
                LocationSource::CandidateFile,
                outcome,
            ) {
                return true;
            }
        }
        false
    }

    fn try_raw_file(
        &self,
        request: &AssemblyRequest,
        index: usize,
        outcome: &mut LocateOutcome,
    ) -> bool {
        let path = PathBuf::from(&request.identity.simple_name);
        if !self.memo.exists(&path) {
            outcome.considered.push(ConsideredLocation {
                path,
                source: LocationSource::RawFile,
                search_path_index: index,
                reason: RejectionReason::NotAFileNameOnDisk,
                detail: None,
            });
            return false;
        }
        // a raw file name carries no fusion name to compare against, so the
        // probed identity is accepted as-is
        match self.cache.probe(&path) {
            Ok(probe) => {
                outcome.resolved = Some((
                    FileLocation {
                        last_write_time: utils::last_write_time(&path).ok(),
                        path,
                        source: LocationSource::RawFile,
                        search_path_index: index,
                    },
                    probe,
                ));
                true
            }
            Err(err) => {
                outcome.considered.push(ConsideredLocation {
                    path,
                    source: LocationSource::RawFile,
                    search_path_index: index,
                    reason: RejectionReason::TargetHadNoFusionName,
                    detail: Some(err.to_string()),
                });
                false
            }
        }
    }

    fn try_gac(
        &self,
        request: &AssemblyRequest,
        index: usize,
        outcome: &mut LocateOutcome,
    ) -> bool {
        let name = &request.identity.simple_name;
        for root in self.gac_paths {
            let assembly_dir = root.join(name);
            let mut version_dirs: Vec<(AssemblyVersion, PathBuf)> = self
                .memo
                .sub_dirs(&assembly_dir)
                .into_iter()
                .filter_map(|dir| {
                    let dir_name = utils::file_name_str(&dir)?;
                    let (version, culture, token) = parse_gac_dir_name(dir_name)?;
                    let want_token = request.identity.public_key_token?;
                    if culture != request.identity.culture || token != Some(want_token) {
                        return None;
                    }
                    if let Some(want) = request.identity.version {
                        if want != version {
                            return None;
                        }
                    }
                    Some((version, dir))
                })
                .collect();
            // highest version first
            version_dirs.sort_by(|a, b| b.0.cmp(&a.0));

            for (_, dir) in version_dirs {
                for ext in self.effective_extensions(request) {
                    let path = dir.join(format!("{name}{ext}"));
                    if !self.memo.exists(&path) {
                        continue;
                    }
                    match self.cache.probe(&path) {
                        Ok(probe)
                            if probe.architecture.is_compatible_with(self.target_arch) =>
                        {
                            outcome.resolved = Some((
                                FileLocation {
                                    last_write_time: utils::last_write_time(&path).ok(),
                                    path,
                                    source: LocationSource::Gac,
                                    search_path_index: index,
                                },
                                probe,
                            ));
                            return true;
                        }
                        Ok(_) => outcome.considered.push(ConsideredLocation {
                            path,
                            source: LocationSource::Gac,
                            search_path_index: index,
                            reason: RejectionReason::ProcessorArchitectureDoesNotMatch,
                            detail: None,
                        }),
                        Err(err) => outcome.considered.push(ConsideredLocation {
                            path,
                            source: LocationSource::Gac,
                            search_path_index: index,
                            reason: RejectionReason::TargetHadNoFusionName,
                            detail: Some(err.to_string()),
                        }),
                    }
                }
            }
        }

        outcome.considered.push(ConsideredLocation {
            path: PathBuf::from(format!("{{Gac}}/{name}")),
            source: LocationSource::Gac,
            search_path_index: index,
            reason: RejectionReason::NotInGac,
            detail: None,
        });
        false
    }

    /// Probes one existing candidate; returns `true` if it matched.
    fn check_candidate(
        &self,
        request: &AssemblyRequest,
        mode: MatchMode,
        index: usize,
        path: PathBuf,
        source: LocationSource,
        outcome: &mut LocateOutcome,
    ) -> bool {
        match self.cache.probe(&path) {
            Ok(probe) if probe.identity.matches(&request.identity, mode) => {
                outcome.resolved = Some((
                    FileLocation {
                        last_write_time: utils::last_write_time(&path).ok(),
                        path,
                        source,
                        search_path_index: index,
                    },
                    probe,
                ));
                true
            }
            Ok(_) => {
                outcome.considered.push(ConsideredLocation {
                    path,
                    source,
                    search_path_index: index,
                    reason: RejectionReason::FusionNamesDidNotMatch,
                    detail: None,
                });
                false
            }
            Err(ProbeError::BadImage(reason)) => {
                outcome.considered.push(ConsideredLocation {
                    path,
                    source,
                    search_path_index: index,
                    reason: RejectionReason::TargetHadNoFusionName,
                    detail: Some(reason),
                });
                false
            }
            Err(ProbeError::Io(err)) => {
                outcome.considered.push(ConsideredLocation {
                    path,
                    source,
                    search_path_index: index,
                    reason: RejectionReason::FileNotFound,
                    detail: Some(err.to_string()),
                });
                false
            }
        }
    }

    /// Directories derived from a `{Registry:base,version,suffix}` token.
    ///
    /// Version subkeys of `base` no newer than the requested version are
    /// visited newest-first; each vendor subkey under `<version>\<suffix>`
    /// contributes its default value as a directory.
    fn registry_directories(&self, base: &str, version: &str, suffix: &str) -> Vec<PathBuf> {
        let want = parse_loose_version(version);
        let mut dirs = Vec::new();
        for root in RegistryRoot::ALL {
            if !self.registry.open(root, base) {
                continue;
            }
            let mut versions: Vec<(Vec<u32>, String)> = self
                .registry
                .subkey_names(root, base)
                .into_iter()
                .filter_map(|name| {
                    let parsed = parse_loose_version(&name)?;
                    (want.is_none() || Some(&parsed) <= want.as_ref()).then_some((parsed, name))
                })
                .collect();
            versions.sort_by(|a, b| b.0.cmp(&a.0));

            for (_, version_key) in versions {
                let folder_key = format!("{base}\\{version_key}\\{suffix}");
                for vendor in self.registry.subkey_names(root, &folder_key) {
                    let vendor_key = format!("{folder_key}\\{vendor}");
                    if let Some(dir) = self.registry.default_value(root, &vendor_key) {
                        let dir = PathBuf::from(dir);
                        if !dirs.contains(&dir) {
                            dirs.push(dir);
                        }
                    }
                }
            }
        }
        dirs
    }

    /// Directories registered under the legacy `AssemblyFolders` key.
    fn assembly_folders_directories(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        for root in RegistryRoot::ALL {
            for vendor in self.registry.subkey_names(root, ASSEMBLY_FOLDERS_KEY) {
                let key = format!("{ASSEMBLY_FOLDERS_KEY}\\{vendor}");
                if let Some(dir) = self.registry.default_value(root, &key) {
                    let dir = PathBuf::from(dir);
                    if !dirs.contains(&dir) {
                        dirs.push(dir);
                    }
                }
            }
        }
        dirs
    }
}

/// Parses `1.0.0.0_<culture>_<pkt>` GAC directory names.
fn parse_gac_dir_name(name: &str) -> Option<(AssemblyVersion, Option<String>, Option<[u8; 8]>)> {
    let mut parts = name.splitn(3, '_');
    let version: AssemblyVersion = parts.next()?.parse().ok()?;
    let culture = crate::identity::normalize_culture(parts.next()?);
    let token = crate::identity::parse_public_key_token(parts.next()?).ok()?;
    Some((version, culture, token))
}

/// Parses version-shaped strings like `v4.0.30319` or `2.0`, used for
/// registry key names and runtime version comparisons.
pub(crate) fn parse_loose_version(s: &str) -> Option<Vec<u32>> {
    let s = s.trim().trim_start_matches(['v', 'V']);
    if s.is_empty() {
        return None;
    }
    s.split('.').map(|part| part.parse().ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MapRegistry, NoRegistry};
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::Path;

    fn default_extensions() -> Vec<String> {
        vec![".winmd".to_string(), ".dll".to_string(), ".exe".to_string()]
    }

    fn write_assembly(dir: &Path, name: &str, manifest: &str) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, manifest).unwrap();
        path
    }

    struct Fixture {
        cache: ProbeCache,
        memo: FsMemo,
        extensions: Vec<String>,
        search_paths: Vec<SearchPath>,
        framework_dirs: Vec<PathBuf>,
        gac_paths: Vec<PathBuf>,
        candidate_files: Vec<PathBuf>,
    }

    impl Fixture {
        fn new(search_paths: Vec<SearchPath>) -> Self {
            Self {
                cache: ProbeCache::new(),
                memo: FsMemo::new(),
                extensions: default_extensions(),
                search_paths,
                framework_dirs: Vec::new(),
                gac_paths: Vec::new(),
                candidate_files: Vec::new(),
            }
        }

        fn locator<'a>(&'a self, registry: &'a dyn Registry) -> CandidateLocator<'a> {
            CandidateLocator {
                search_paths: &self.search_paths,
                extensions: &self.extensions,
                framework_dirs: &self.framework_dirs,
                gac_paths: &self.gac_paths,
                candidate_files: &self.candidate_files,
                target_arch: ProcessorArchitecture::None,
                registry,
                cache: &self.cache,
                memo: &self.memo,
            }
        }
    }

    #[test]
    fn parses_search_path_tokens() {
        assert_eq!(SearchPath::parse("{HintPath}").unwrap(), SearchPath::HintPath);
        assert_eq!(SearchPath::parse("{GAC}").unwrap(), SearchPath::Gac);
        assert_eq!(
            SearchPath::parse("/usr/lib/assemblies").unwrap(),
            SearchPath::Directory(PathBuf::from("/usr/lib/assemblies"))
        );
        assert_eq!(
            SearchPath::parse(r"{Registry:Software\Vendors,v4.0,AssemblyFoldersEx}").unwrap(),
            SearchPath::Registry {
                base: r"Software\Vendors".to_string(),
                version: "v4.0".to_string(),
                suffix: "AssemblyFoldersEx".to_string(),
            }
        );
        assert!(SearchPath::parse("{Bogus}").is_err());
        assert!(SearchPath::parse("").is_err());
    }

    #[test]
    fn resolves_from_directory_in_extension_order() {
        let dir = tempfile::tempdir().unwrap();
        write_assembly(dir.path(), "Foo.dll", "assembly Foo, Version=1.0.0.0");
        write_assembly(dir.path(), "Foo.exe", "assembly Foo, Version=1.0.0.0");

        let fixture = Fixture::new(vec![SearchPath::Directory(dir.path().to_path_buf())]);
        let registry = NoRegistry;
        let locator = fixture.locator(&registry);

        let request = AssemblyRequest::new(AssemblyIdentity::new("Foo"));
        let outcome = locator.locate(&request);
        let (location, probe) = outcome.resolved.expect("resolved");
        // .winmd is probed (and missed) first, then .dll matches
        assert_eq!(location.path, dir.path().join("Foo.dll"));
        assert_eq!(probe.identity.simple_name, "Foo");
        assert_eq!(outcome.considered.len(), 1);
        assert_eq!(outcome.considered[0].reason, RejectionReason::FileNotFound);
    }

    #[test]
    fn strict_match_rejects_other_versions() {
        let dir = tempfile::tempdir().unwrap();
        write_assembly(
            dir.path(),
            "Foo.dll",
            "assembly Foo, Version=1.0.0.0, PublicKeyToken=b77a5c561934e089",
        );

        let fixture = Fixture::new(vec![SearchPath::Directory(dir.path().to_path_buf())]);
        let registry = NoRegistry;
        let locator = fixture.locator(&registry);

        let identity =
            AssemblyIdentity::parse("Foo, Version=2.0.0.0, PublicKeyToken=b77a5c561934e089")
                .unwrap();
        let outcome = locator.locate(&AssemblyRequest::new(identity));
        assert!(outcome.resolved.is_none());
        assert!(outcome
            .considered
            .iter()
            .any(|c| c.reason == RejectionReason::FusionNamesDidNotMatch));
    }

    #[test]
    fn specific_version_false_allows_any_version() {
        let dir = tempfile::tempdir().unwrap();
        write_assembly(
            dir.path(),
            "Foo.dll",
            "assembly Foo, Version=1.0.0.0, PublicKeyToken=b77a5c561934e089",
        );

        let fixture = Fixture::new(vec![SearchPath::Directory(dir.path().to_path_buf())]);
        let registry = NoRegistry;
        let locator = fixture.locator(&registry);

        let identity =
            AssemblyIdentity::parse("Foo, Version=2.0.0.0, PublicKeyToken=b77a5c561934e089")
                .unwrap();
        let mut request = AssemblyRequest::new(identity);
        request.specific_version = Some(false);
        let outcome = locator.locate(&request);
        assert!(outcome.resolved.is_some());
    }

    #[test]
    fn hint_path_wins_over_later_directories() {
        let dir = tempfile::tempdir().unwrap();
        let hint_dir = dir.path().join("hint");
        let other_dir = dir.path().join("other");
        let hinted = write_assembly(&hint_dir, "Foo.dll", "assembly Foo, Version=1.0.0.0");
        write_assembly(&other_dir, "Foo.dll", "assembly Foo, Version=9.0.0.0");

        let fixture =
            Fixture::new(vec![SearchPath::HintPath, SearchPath::Directory(other_dir.clone())]);
        let registry = NoRegistry;
        let locator = fixture.locator(&registry);

        let mut request = AssemblyRequest::new(AssemblyIdentity::new("Foo"));
        request.hint_path = Some(hinted.clone());
        let outcome = locator.locate(&request);
        let (location, _) = outcome.resolved.expect("resolved");
        assert_eq!(location.path, hinted);
        assert_eq!(location.source, LocationSource::HintPath);
        assert_eq!(location.search_path_index, 0);
    }

    #[test]
    fn bad_image_is_recorded_and_search_continues() {
        let dir = tempfile::tempdir().unwrap();
        let bad_dir = dir.path().join("bad");
        let good_dir = dir.path().join("good");
        write_assembly(&bad_dir, "Foo.dll", "garbage bytes");
        let good = write_assembly(&good_dir, "Foo.dll", "assembly Foo, Version=1.0.0.0");

        let fixture = Fixture::new(vec![
            SearchPath::Directory(bad_dir),
            SearchPath::Directory(good_dir),
        ]);
        let registry = NoRegistry;
        let locator = fixture.locator(&registry);

        let outcome = locator.locate(&AssemblyRequest::new(AssemblyIdentity::new("Foo")));
        assert_eq!(outcome.resolved.as_ref().unwrap().0.path, good);
        let bad = outcome
            .considered
            .iter()
            .find(|c| c.reason == RejectionReason::TargetHadNoFusionName)
            .expect("bad image recorded");
        assert!(bad.detail.as_deref().unwrap().contains("assembly"));
    }

    #[test]
    fn gac_lookup_prefers_highest_version() {
        let dir = tempfile::tempdir().unwrap();
        let gac = dir.path().join("gac");
        write_assembly(
            &gac.join("Foo").join("1.0.0.0__b77a5c561934e089"),
            "Foo.dll",
            "assembly Foo, Version=1.0.0.0, PublicKeyToken=b77a5c561934e089",
        );
        write_assembly(
            &gac.join("Foo").join("2.0.0.0__b77a5c561934e089"),
            "Foo.dll",
            "assembly Foo, Version=2.0.0.0, PublicKeyToken=b77a5c561934e089",
        );

        let mut fixture = Fixture::new(vec![SearchPath::Gac]);
        fixture.gac_paths = vec![gac];
        let registry = NoRegistry;
        let locator = fixture.locator(&registry);

        let identity = AssemblyIdentity::parse("Foo, PublicKeyToken=b77a5c561934e089").unwrap();
        let outcome = locator.locate(&AssemblyRequest::new(identity.clone()));
        let (location, probe) = outcome.resolved.expect("resolved from gac");
        assert_eq!(location.source, LocationSource::Gac);
        assert_eq!(probe.identity.version, Some(AssemblyVersion::new(2, 0, 0, 0)));
        assert!(locator.gac_contains(&identity));
    }

    #[test]
    fn gac_miss_records_not_in_gac() {
        let dir = tempfile::tempdir().unwrap();
        let mut fixture = Fixture::new(vec![SearchPath::Gac]);
        fixture.gac_paths = vec![dir.path().to_path_buf()];
        let registry = NoRegistry;
        let locator = fixture.locator(&registry);

        let identity = AssemblyIdentity::parse("Foo, PublicKeyToken=b77a5c561934e089").unwrap();
        let outcome = locator.locate(&AssemblyRequest::new(identity));
        assert!(outcome.resolved.is_none());
        assert_eq!(outcome.considered.last().unwrap().reason, RejectionReason::NotInGac);
    }

    #[test]
    fn raw_file_name_resolves_literally() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_assembly(dir.path(), "Custom.dll", "assembly Custom, Version=3.0.0.0");

        let fixture = Fixture::new(vec![SearchPath::RawFileName]);
        let registry = NoRegistry;
        let locator = fixture.locator(&registry);

        let request =
            AssemblyRequest::new(AssemblyIdentity::new(file.to_string_lossy().to_string()));
        let outcome = locator.locate(&request);
        let (location, probe) = outcome.resolved.expect("resolved raw file");
        assert_eq!(location.source, LocationSource::RawFile);
        assert_eq!(probe.identity.simple_name, "Custom");

        let missing = AssemblyRequest::new(AssemblyIdentity::new("/nonexistent/Nope.dll"));
        let outcome = locator.locate(&missing);
        assert!(outcome.resolved.is_none());
        assert_eq!(outcome.considered[0].reason, RejectionReason::NotAFileNameOnDisk);
    }

    #[test]
    fn registry_search_path_derives_directories() {
        let dir = tempfile::tempdir().unwrap();
        let vendor_dir = dir.path().join("vendor");
        write_assembly(&vendor_dir, "Widget.dll", "assembly Widget, Version=1.0.0.0");

        let mut registry = MapRegistry::new();
        registry.insert(
            RegistryRoot::LocalMachine,
            r"Software\Vendors\v4.0\AssemblyFoldersEx\Acme",
            Some(vendor_dir.to_string_lossy().as_ref()),
        );
        // a newer-than-target version key is skipped
        registry.insert(
            RegistryRoot::LocalMachine,
            r"Software\Vendors\v9.9\AssemblyFoldersEx\Future",
            Some("/nonexistent"),
        );

        let fixture = Fixture::new(vec![SearchPath::Registry {
            base: r"Software\Vendors".to_string(),
            version: "v4.5".to_string(),
            suffix: "AssemblyFoldersEx".to_string(),
        }]);
        let locator = fixture.locator(&registry);

        let outcome = locator.locate(&AssemblyRequest::new(AssemblyIdentity::new("Widget")));
        let (location, _) = outcome.resolved.expect("resolved via registry");
        assert_eq!(location.source, LocationSource::Registry);
        assert_eq!(location.path, vendor_dir.join("Widget.dll"));
    }

    #[test]
    fn candidate_files_filtered_by_extension_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_assembly(dir.path(), "Foo.dll", "assembly Foo, Version=1.0.0.0");
        let other = write_assembly(dir.path(), "Foo.txt", "assembly Foo, Version=1.0.0.0");

        let mut fixture = Fixture::new(vec![SearchPath::CandidateAssemblyFiles]);
        fixture.candidate_files = vec![other, file.clone()];
        let registry = NoRegistry;
        let locator = fixture.locator(&registry);

        let outcome = locator.locate(&AssemblyRequest::new(AssemblyIdentity::new("Foo")));
        assert_eq!(outcome.resolved.unwrap().0.path, file);
    }
}
