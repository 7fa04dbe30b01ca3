//! The reference graph data model.
//!
//! A [`Reference`] is the central graph node: one per requested identity,
//! created when the identity is first named (as a primary input or a
//! discovered dependency), mutated during closure expansion and conflict
//! resolution, and destroyed only by exclusion-list pruning. The
//! [`ReferenceTable`] owns every node; back-edges hold lookup keys instead of
//! pointers, which is what makes the graph cycle tolerant.

use crate::{
    identity::{AssemblyIdentity, AssemblyVersion, ProcessorArchitecture, SimpleIdentityKey},
    locator::{ConsideredLocation, FileLocation, LocationSource},
    outputs::{CopyLocalState, SatelliteFile},
    probe::ProbeResult,
    report::UnificationReason,
};
use std::{
    collections::BTreeMap,
    fmt,
    path::PathBuf,
    sync::Arc,
};

/// Why a conflict participant lost.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictLoss {
    HadLowerVersion,
    WasNotPrimary,
    /// Two primaries disagree; the loser is kept but diagnostics escalate.
    InsolubleConflict,
    FusionEquivalentWithSameVersion,
}

impl fmt::Display for ConflictLoss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::HadLowerVersion => "it had a lower version",
            Self::WasNotPrimary => "it was not a primary reference",
            Self::InsolubleConflict => "two primary references disagree",
            Self::FusionEquivalentWithSameVersion => "fusion-equivalent with the same version",
        };
        f.write_str(s)
    }
}

/// Conflict participation of a reference.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ConflictState {
    #[default]
    None,
    Victor,
    Victim { reason: ConflictLoss, winner: ReferenceKey },
}

/// A failure recorded on the owning reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReferenceError {
    /// No candidate matched the requested identity.
    ResolutionFailed,
    /// A transitive dependency could not be resolved.
    DependencyFailed { dependency: AssemblyIdentity },
    /// A candidate file was rejected as malformed.
    BadImage { path: PathBuf, reason: String },
    /// The resolved architecture differs from the target.
    ArchMismatch { want: ProcessorArchitecture, got: ProcessorArchitecture },
}

/// A back-edge: who required this reference, and as what.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dependee {
    /// Table key of the requiring reference.
    pub key: ReferenceKey,
    /// The identity the requirer asked for (before unification).
    pub requested: AssemblyIdentity,
}

/// A version the reference carried before unification remapped it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreUnificationVersion {
    pub version: AssemblyVersion,
    pub reason: UnificationReason,
}

/// Table key of a reference: the simple-identity bucket plus the effective
/// requested version, so conflicting versions coexist until resolution.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReferenceKey {
    pub simple: SimpleIdentityKey,
    pub version: Option<AssemblyVersion>,
}

impl ReferenceKey {
    pub fn of(identity: &AssemblyIdentity) -> Self {
        Self { simple: identity.simple_key(), version: identity.version }
    }
}

impl fmt::Display for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simple)?;
        if let Some(version) = self.version {
            write!(f, ", Version={version}")?;
        }
        Ok(())
    }
}

/// One node of the reference graph.
#[derive(Clone, Debug)]
pub struct Reference {
    /// The identity as stated by the requester, before any redirect.
    pub requested_identity: AssemblyIdentity,
    /// The identity of the chosen file, after any redirect.
    pub resolved_identity: Option<AssemblyIdentity>,
    /// Absent means unresolved.
    pub resolved_location: Option<FileLocation>,
    /// Metadata of the chosen file.
    pub probe: Option<Arc<ProbeResult>>,
    pub is_primary: bool,
    /// `true` if a redirect changed the version.
    pub is_unified: bool,
    pub pre_unification_versions: Vec<PreUnificationVersion>,
    pub dependees: Vec<Dependee>,
    /// Names of the primary items that transitively required this reference.
    pub source_items: Vec<String>,
    pub considered_locations: Vec<ConsideredLocation>,
    pub related_files: Vec<PathBuf>,
    pub satellite_files: Vec<SatelliteFile>,
    pub scatter_files: Vec<PathBuf>,
    pub serialization_assembly: Option<PathBuf>,
    pub copy_local: Option<CopyLocalState>,
    pub errors: Vec<ReferenceError>,
    pub conflict_state: ConflictState,
    pub is_framework_file: bool,
    pub is_winmd: bool,
    pub runtime_version: Option<String>,
    /// The redist the assembly belongs to, when in-framework.
    pub redist_name: Option<String>,

    // requester metadata carried from the primary item
    pub hint_path: Option<PathBuf>,
    pub private: Option<bool>,
    pub specific_version: Option<bool>,
    pub embed_interop: bool,
    pub executable_extension: Option<String>,
    pub sub_type: Option<String>,
    pub is_externally_resolved: bool,
}

impl Reference {
    pub fn new(requested_identity: AssemblyIdentity, is_primary: bool) -> Self {
        Self {
            requested_identity,
            resolved_identity: None,
            resolved_location: None,
            probe: None,
            is_primary,
            is_unified: false,
            pre_unification_versions: Vec::new(),
            dependees: Vec::new(),
            source_items: Vec::new(),
            considered_locations: Vec::new(),
            related_files: Vec::new(),
            satellite_files: Vec::new(),
            scatter_files: Vec::new(),
            serialization_assembly: None,
            copy_local: None,
            errors: Vec::new(),
            conflict_state: ConflictState::None,
            is_framework_file: false,
            is_winmd: false,
            runtime_version: None,
            redist_name: None,
            hint_path: None,
            private: None,
            specific_version: None,
            embed_interop: false,
            executable_extension: None,
            sub_type: None,
            is_externally_resolved: false,
        }
    }

    /// A reference is resolved once a location was chosen and its metadata
    /// probed.
    pub fn is_resolved(&self) -> bool {
        self.resolved_location.is_some() && self.probe.is_some()
    }

    /// The identity to report for this reference: the resolved one when
    /// available, the requested one otherwise.
    pub fn effective_identity(&self) -> &AssemblyIdentity {
        self.resolved_identity.as_ref().unwrap_or(&self.requested_identity)
    }

    pub fn is_victim(&self) -> bool {
        matches!(self.conflict_state, ConflictState::Victim { .. })
    }

    /// Whether the chosen file came from the shared assembly cache.
    pub fn resolved_from_gac(&self) -> bool {
        self.resolved_location
            .as_ref()
            .is_some_and(|location| location.source == LocationSource::Gac)
    }

    pub fn add_dependee(&mut self, key: ReferenceKey, requested: AssemblyIdentity) {
        if !self.dependees.iter().any(|d| d.key == key) {
            self.dependees.push(Dependee { key, requested });
        }
    }

    pub fn add_source_item(&mut self, item: &str) {
        if !self.source_items.iter().any(|s| s == item) {
            self.source_items.push(item.to_string());
        }
    }

    pub fn record_error(&mut self, error: ReferenceError) {
        if !self.errors.contains(&error) {
            self.errors.push(error);
        }
    }
}

/// Owner of every reference in one resolver invocation, keyed so iteration
/// (and therefore logging and output order) is deterministic.
#[derive(Debug, Default)]
pub struct ReferenceTable {
    entries: BTreeMap<ReferenceKey, Reference>,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ReferenceKey) -> Option<&Reference> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &ReferenceKey) -> Option<&mut Reference> {
        self.entries.get_mut(key)
    }

    pub fn insert(&mut self, key: ReferenceKey, reference: Reference) {
        self.entries.insert(key, reference);
    }

    pub fn remove(&mut self, key: &ReferenceKey) -> Option<Reference> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &ReferenceKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in key order, victims included.
    pub fn iter(&self) -> impl Iterator<Item = (&ReferenceKey, &Reference)> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ReferenceKey, &mut Reference)> {
        self.entries.iter_mut()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ReferenceKey> {
        self.entries.keys()
    }

    /// Entries that survived conflict resolution.
    pub fn live(&self) -> impl Iterator<Item = (&ReferenceKey, &Reference)> {
        self.entries.iter().filter(|(_, r)| !r.is_victim())
    }

    /// Looks up an entry matching `identity` under simple equality,
    /// preferring an exact version match.
    pub fn find_simple(&self, identity: &AssemblyIdentity) -> Option<&ReferenceKey> {
        let simple = identity.simple_key();
        let mut fallback = None;
        for key in self.entries.keys() {
            if key.simple != simple {
                continue;
            }
            if key.version == identity.version {
                return Some(key);
            }
            fallback.get_or_insert(key);
        }
        fallback
    }

    /// Looks up the entry with exactly this key's simple identity and version.
    pub fn find_strict(&self, identity: &AssemblyIdentity) -> Option<&ReferenceKey> {
        self.entries.get_key_value(&ReferenceKey::of(identity)).map(|(key, _)| key)
    }

    /// Groups of table keys sharing a simple identity, in key order. Groups
    /// with more than one member are conflict sets.
    pub fn simple_groups(&self) -> Vec<Vec<ReferenceKey>> {
        let mut groups: Vec<Vec<ReferenceKey>> = Vec::new();
        for key in self.entries.keys() {
            match groups.last_mut() {
                Some(group) if group[0].simple == key.simple => group.push(key.clone()),
                _ => groups.push(vec![key.clone()]),
            }
        }
        groups
    }

    /// Checks the structural invariants of the table; used by tests.
    pub fn verify_invariants(&self) -> Result<(), String> {
        for (key, reference) in &self.entries {
            if !reference.is_primary && reference.dependees.is_empty() {
                return Err(format!("non-primary `{key}` has no dependees"));
            }
            for dependee in &reference.dependees {
                if !self.entries.contains_key(&dependee.key) {
                    return Err(format!(
                        "dependee `{}` of `{key}` is not in the table",
                        dependee.key
                    ));
                }
            }
            if let ConflictState::Victim { winner, .. } = &reference.conflict_state {
                match self.entries.get(winner) {
                    Some(victor) if victor.conflict_state == ConflictState::Victor => {}
                    Some(_) => return Err(format!("winner `{winner}` of `{key}` is not a victor")),
                    None => return Err(format!("winner `{winner}` of `{key}` does not exist")),
                }
                if winner.simple != key.simple {
                    return Err(format!("victim `{key}` lost to unrelated `{winner}`"));
                }
            }
        }
        // no two live entries share a simple identity
        let mut previous: Option<&ReferenceKey> = None;
        for (key, _) in self.live() {
            if let Some(prev) = previous {
                if prev.simple == key.simple {
                    return Err(format!("live duplicates of simple identity `{}`", key.simple));
                }
            }
            previous = Some(key);
        }
        Ok(())
    }
}
