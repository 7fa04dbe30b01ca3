//! Classification of resolved references into the output tables.
//!
//! After the graph is final, every live reference receives a copy-local
//! verdict via the ordered rule chain, plus its related files (`.pdb`,
//! `.xml`), per-culture satellite assemblies, serialization assemblies and
//! scatter files. The results are flattened into the ordered output tables a
//! build engine consumes.

use crate::{
    cache::FsMemo,
    identity::AssemblyIdentity,
    locator::{CandidateLocator, LocationSource},
    redist::FrameworkPolicy,
    reference::{ReferenceKey, ReferenceTable},
    report::DecisionLog,
    utils,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::{
    fmt,
    path::{Path, PathBuf},
};

/// Culture-shaped directory names, e.g. `de`, `en-US`, `zh-Hans`.
static RE_CULTURE_DIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?i)[a-z]{2,3}(-[a-z0-9]+)*$").unwrap());

/// The copy-local verdict of one reference; the first matching rule of the
/// ordered chain names its state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CopyLocalState {
    /// `Private=true` on the requesting item.
    YesPrivate,
    /// `Private=false` on the requesting item.
    NoPrivate,
    NoUnresolved,
    /// In-framework and expected in the GAC.
    NoPrerequisite,
    NoEmbedded,
    NoConflictVictim,
    NoResolvedFromGac,
    NoFoundInGac,
    NoParentsInGac,
    NoFrameworkFile,
    YesHeuristic,
}

impl CopyLocalState {
    /// Whether the file should be copied next to the build output.
    pub fn is_copy_local(self) -> bool {
        matches!(self, Self::YesPrivate | Self::YesHeuristic)
    }
}

impl fmt::Display for CopyLocalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A per-culture satellite assembly found next to a resolved reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SatelliteFile {
    pub path: PathBuf,
    pub culture: String,
    /// Destination relative to the output directory, e.g.
    /// `de/Foo.resources.dll`.
    pub destination: PathBuf,
}

/// One row of the resolved output tables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedFile {
    pub path: PathBuf,
    pub identity: AssemblyIdentity,
    pub copy_local: CopyLocalState,
    pub source: LocationSource,
    pub is_winmd: bool,
    pub runtime_version: Option<String>,
    pub redist_name: Option<String>,
}

/// Everything one resolver invocation produced.
#[derive(Debug, Default)]
pub struct ResolutionOutputs {
    /// Resolved primary references, in table order.
    pub resolved_files: Vec<ResolvedFile>,
    /// Resolved transitive dependencies, in table order.
    pub resolved_dependency_files: Vec<ResolvedFile>,
    pub related_files: Vec<PathBuf>,
    pub satellite_files: Vec<SatelliteFile>,
    pub serialization_assembly_files: Vec<PathBuf>,
    pub scatter_files: Vec<PathBuf>,
    /// Every file that must be copied to the output directory.
    pub copy_local_files: Vec<PathBuf>,
    pub suggested_redirects: Vec<crate::conflicts::SuggestedRedirect>,
    pub depends_on_system_runtime: bool,
    pub depends_on_netstandard: bool,
    /// The state file, if it was (re)written.
    pub files_written: Vec<PathBuf>,
    pub log: DecisionLog,
}

impl ResolutionOutputs {
    /// `false` iff the decision log recorded any error.
    pub fn success(&self) -> bool {
        self.log.success()
    }

    /// The ordered warning and error events of the invocation.
    pub fn diagnostics(&self) -> impl Iterator<Item = &crate::report::ResolutionEvent> {
        self.log.diagnostics()
    }
}

/// Configuration slice consumed by the classifier.
#[derive(Clone, Copy, Debug)]
pub struct ClassifierOptions<'a> {
    pub related_extensions: &'a [String],
    pub find_related_files: bool,
    pub find_satellites: bool,
    pub find_serialization_assemblies: bool,
    pub do_not_copy_local_if_in_gac: bool,
    pub copy_local_dependencies_when_parent_in_gac: bool,
}

/// Computes copy-local states and auxiliary files for every reference.
pub struct OutputClassifier<'a> {
    pub policy: &'a FrameworkPolicy,
    pub memo: &'a FsMemo,
    pub locator: &'a CandidateLocator<'a>,
    pub options: ClassifierOptions<'a>,
}

impl<'a> OutputClassifier<'a> {
    /// Classifies every reference in the table, first match of the rule
    /// chain winning.
    pub fn classify(&self, table: &mut ReferenceTable) {
        let keys: Vec<ReferenceKey> = table.keys().cloned().collect();
        let verdicts: Vec<(ReferenceKey, CopyLocalState)> = keys
            .into_iter()
            .map(|key| {
                let state = self.copy_local_state(table, &key);
                (key, state)
            })
            .collect();

        for (key, state) in verdicts {
            if let Some(reference) = table.get_mut(&key) {
                reference.copy_local = Some(state);
            }
        }

        let auxiliary: Vec<(ReferenceKey, Auxiliary)> = table
            .iter()
            .filter(|(_, r)| !r.is_victim())
            .map(|(key, reference)| (key.clone(), self.auxiliary_files(reference)))
            .collect();

        for (key, aux) in auxiliary {
            if let Some(reference) = table.get_mut(&key) {
                reference.related_files = aux.related;
                reference.satellite_files = aux.satellites;
                reference.serialization_assembly = aux.serialization;
                reference.scatter_files = aux.scatter;
            }
        }
    }

    fn copy_local_state(&self, table: &ReferenceTable, key: &ReferenceKey) -> CopyLocalState {
        let reference = table.get(key).expect("key in table");

        if let Some(private) = reference.private {
            return if private { CopyLocalState::YesPrivate } else { CopyLocalState::NoPrivate };
        }
        if !reference.is_resolved() {
            return CopyLocalState::NoUnresolved;
        }
        let identity = reference.effective_identity();
        if self.policy.is_prerequisite(identity) {
            return CopyLocalState::NoPrerequisite;
        }
        if reference.embed_interop {
            return CopyLocalState::NoEmbedded;
        }
        if reference.is_victim() {
            return CopyLocalState::NoConflictVictim;
        }
        if reference.resolved_from_gac() {
            return CopyLocalState::NoResolvedFromGac;
        }
        if self.options.do_not_copy_local_if_in_gac && self.locator.gac_contains(identity) {
            return CopyLocalState::NoFoundInGac;
        }
        if !self.options.copy_local_dependencies_when_parent_in_gac
            && !reference.dependees.is_empty()
        {
            let all_parents_in_gac = reference
                .dependees
                .iter()
                .all(|d| table.get(&d.key).is_some_and(|parent| parent.resolved_from_gac()));
            if all_parents_in_gac {
                return CopyLocalState::NoParentsInGac;
            }
        }
        if reference.is_framework_file {
            return CopyLocalState::NoFrameworkFile;
        }
        CopyLocalState::YesHeuristic
    }

    fn auxiliary_files(&self, reference: &crate::reference::Reference) -> Auxiliary {
        let mut aux = Auxiliary::default();
        let Some(location) = &reference.resolved_location else { return aux };
        let Some(dir) = location.path.parent() else { return aux };
        let Some(file_name) = utils::file_name_str(&location.path) else { return aux };
        let stem = location
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        if self.options.find_related_files {
            for ext in self.options.related_extensions {
                let candidate = dir.join(utils::with_extension(file_name, ext));
                if candidate != location.path && self.memo.exists(&candidate) {
                    aux.related.push(candidate);
                }
            }
        }

        if self.options.find_satellites {
            for sub_dir in self.memo.sub_dirs(dir) {
                let Some(culture) = utils::file_name_str(&sub_dir) else { continue };
                if !RE_CULTURE_DIR.is_match(culture) {
                    continue;
                }
                let satellite_name = format!("{stem}.resources.dll");
                let candidate = sub_dir.join(&satellite_name);
                if self.memo.exists(&candidate) {
                    aux.satellites.push(SatelliteFile {
                        path: candidate,
                        culture: culture.to_ascii_lowercase(),
                        destination: Path::new(culture).join(satellite_name),
                    });
                }
            }
        }

        if self.options.find_serialization_assemblies {
            let candidate = dir.join(format!("{stem}.XmlSerializers.dll"));
            if self.memo.exists(&candidate) {
                aux.serialization = Some(candidate);
            }
        }

        for scatter in reference.probe.iter().flat_map(|p| &p.scatter_files) {
            aux.scatter.push(dir.join(scatter));
        }

        aux
    }
}

#[derive(Debug, Default)]
struct Auxiliary {
    related: Vec<PathBuf>,
    satellites: Vec<SatelliteFile>,
    serialization: Option<PathBuf>,
    scatter: Vec<PathBuf>,
}

/// Flattens the classified table into the ordered output tables.
pub fn collect_outputs(table: &ReferenceTable, outputs: &mut ResolutionOutputs) {
    for (_, reference) in table.live() {
        let identity = reference.effective_identity();
        let simple = &identity.simple_name;
        if simple.eq_ignore_ascii_case("System.Runtime") {
            outputs.depends_on_system_runtime = true;
        }
        if simple.eq_ignore_ascii_case("netstandard") {
            outputs.depends_on_netstandard = true;
        }

        let Some(location) = &reference.resolved_location else { continue };
        let copy_local = reference.copy_local.unwrap_or(CopyLocalState::NoUnresolved);

        let row = ResolvedFile {
            path: location.path.clone(),
            identity: identity.clone(),
            copy_local,
            source: location.source,
            is_winmd: reference.is_winmd,
            runtime_version: reference.runtime_version.clone(),
            redist_name: reference.redist_name.clone(),
        };
        if reference.is_primary {
            outputs.resolved_files.push(row);
        } else {
            outputs.resolved_dependency_files.push(row);
        }

        outputs.related_files.extend(reference.related_files.iter().cloned());
        outputs.satellite_files.extend(reference.satellite_files.iter().cloned());
        if let Some(serialization) = &reference.serialization_assembly {
            outputs.serialization_assembly_files.push(serialization.clone());
        }
        outputs.scatter_files.extend(reference.scatter_files.iter().cloned());

        if copy_local.is_copy_local() {
            outputs.copy_local_files.push(location.path.clone());
            outputs.copy_local_files.extend(reference.related_files.iter().cloned());
            outputs
                .copy_local_files
                .extend(reference.satellite_files.iter().map(|s| s.path.clone()));
            if let Some(serialization) = &reference.serialization_assembly {
                outputs.copy_local_files.push(serialization.clone());
            }
            outputs.copy_local_files.extend(reference.scatter_files.iter().cloned());
        }
    }
}
