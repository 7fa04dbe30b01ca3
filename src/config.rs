//! Strongly-typed resolver configuration.

use crate::{
    error::{ResolveError, Result},
    identity::{AssemblyIdentity, AssemblyVersion, ProcessorArchitecture},
    locator::SearchPath,
    probe::DEFAULT_RUNTIME_VERSION,
    utils,
};
use std::path::{Path, PathBuf};

/// Environment variable forcing per-candidate search events through even in
/// silent mode.
pub const VERBOSE_SEARCH_ENV: &str = "ARR_LOG_VERBOSE_SEARCH_RESULTS";

/// Subdirectory of a framework directory holding redist lists.
const REDIST_LIST_DIR: &str = "RedistList";
/// Subdirectory of a framework directory holding subset lists.
const SUBSET_LIST_DIR: &str = "SubsetList";

/// One user-requested root of the reference graph.
#[derive(Clone, Debug)]
pub struct PrimaryReference {
    pub identity: AssemblyIdentity,
    /// The name of the project item that requested the reference; defaults to
    /// the simple name.
    pub item_name: String,
    pub hint_path: Option<PathBuf>,
    /// Explicit copy-local override.
    pub private: Option<bool>,
    pub specific_version: Option<bool>,
    pub embed_interop: bool,
    pub executable_extension: Option<String>,
    pub sub_type: Option<String>,
    /// Dependency walking is skipped for externally resolved references
    /// unless [`ResolverConfig::find_dependencies_of_externally_resolved`].
    pub is_externally_resolved: bool,
}

impl PrimaryReference {
    pub fn new(identity: AssemblyIdentity) -> Self {
        let item_name = identity.simple_name.clone();
        Self {
            identity,
            item_name,
            hint_path: None,
            private: None,
            specific_version: None,
            embed_interop: false,
            executable_extension: None,
            sub_type: None,
            is_externally_resolved: false,
        }
    }

    /// Parses the fusion name and builds a primary reference from it.
    pub fn parse(fusion_name: &str) -> Result<Self> {
        Ok(Self::new(AssemblyIdentity::parse(fusion_name)?))
    }

    pub fn with_hint_path(mut self, hint: impl Into<PathBuf>) -> Self {
        self.hint_path = Some(hint.into());
        self
    }

    pub fn with_private(mut self, private: bool) -> Self {
        self.private = Some(private);
        self
    }

    pub fn with_specific_version(mut self, specific: bool) -> Self {
        self.specific_version = Some(specific);
        self
    }

    pub fn with_embed_interop(mut self, embed: bool) -> Self {
        self.embed_interop = embed;
        self
    }

    pub fn externally_resolved(mut self) -> Self {
        self.is_externally_resolved = true;
        self
    }
}

/// Severity of an architecture mismatch diagnostic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ArchMismatchSeverity {
    None,
    #[default]
    Warning,
    Error,
}

/// The full configuration of one resolver invocation.
#[derive(Clone, Debug)]
pub struct ResolverConfig {
    /// Roots of the graph stated as identities.
    pub primary_assemblies: Vec<PrimaryReference>,
    /// Roots of the graph stated as known file locations.
    pub primary_files: Vec<PathBuf>,
    /// Search-path tokens, in priority order.
    pub search_paths: Vec<String>,
    pub allowed_assembly_extensions: Vec<String>,
    pub allowed_related_file_extensions: Vec<String>,
    pub target_framework_dirs: Vec<PathBuf>,
    pub installed_assembly_tables: Vec<PathBuf>,
    pub installed_assembly_subset_tables: Vec<PathBuf>,
    pub full_framework_tables: Vec<PathBuf>,
    pub full_framework_dirs: Vec<PathBuf>,
    /// Skip redist-list discovery under the framework directories.
    pub ignore_default_installed_assembly_tables: bool,
    pub target_framework_version: Option<String>,
    pub target_framework_moniker: Option<String>,
    pub targeted_runtime_version: String,
    pub target_processor_architecture: ProcessorArchitecture,
    /// Enables synthesis of live redirects from decided conflicts. Requires
    /// dependency walking: with `find_dependencies == false` there is no
    /// closure to unify and the pass is short-circuited.
    pub auto_unify: bool,
    pub copy_local_dependencies_when_parent_in_gac: bool,
    pub do_not_copy_local_if_in_gac: bool,
    /// Source of explicit binding redirects.
    pub config_file: Option<PathBuf>,
    /// Persistent location of the probe cache.
    pub state_file: Option<PathBuf>,
    pub find_dependencies: bool,
    pub find_satellites: bool,
    pub find_serialization_assemblies: bool,
    pub find_related_files: bool,
    pub find_dependencies_of_externally_resolved: bool,
    pub warn_or_error_on_arch_mismatch: ArchMismatchSeverity,
    /// Suppresses the per-reference log block from sinks.
    pub silent: bool,
    /// Roots of the shared assembly cache.
    pub gac_paths: Vec<PathBuf>,
    /// Input list iterated by `{CandidateAssemblyFiles}`.
    pub candidate_assembly_files: Vec<PathBuf>,
    /// Subset names treated as covering the full framework.
    pub full_subset_names: Vec<String>,
    /// Force per-candidate search events through the sink; also settable via
    /// [`VERBOSE_SEARCH_ENV`].
    pub log_verbose_search_results: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            primary_assemblies: Vec::new(),
            primary_files: Vec::new(),
            search_paths: Vec::new(),
            allowed_assembly_extensions: vec![
                ".winmd".to_string(),
                ".dll".to_string(),
                ".exe".to_string(),
            ],
            allowed_related_file_extensions: vec![".pdb".to_string(), ".xml".to_string()],
            target_framework_dirs: Vec::new(),
            installed_assembly_tables: Vec::new(),
            installed_assembly_subset_tables: Vec::new(),
            full_framework_tables: Vec::new(),
            full_framework_dirs: Vec::new(),
            ignore_default_installed_assembly_tables: false,
            target_framework_version: None,
            target_framework_moniker: None,
            targeted_runtime_version: DEFAULT_RUNTIME_VERSION.to_string(),
            target_processor_architecture: ProcessorArchitecture::None,
            auto_unify: false,
            copy_local_dependencies_when_parent_in_gac: true,
            do_not_copy_local_if_in_gac: false,
            config_file: None,
            state_file: None,
            find_dependencies: true,
            find_satellites: true,
            find_serialization_assemblies: true,
            find_related_files: true,
            find_dependencies_of_externally_resolved: false,
            warn_or_error_on_arch_mismatch: ArchMismatchSeverity::default(),
            silent: false,
            gac_paths: Vec::new(),
            candidate_assembly_files: Vec::new(),
            full_subset_names: vec!["Full".to_string()],
            log_verbose_search_results: false,
        }
    }
}

impl ResolverConfig {
    /// Validates the configuration, failing with
    /// [`ResolveError::InvalidParameter`] on the first offending input.
    pub fn validate(&self) -> Result<()> {
        if self.primary_assemblies.is_empty() && self.primary_files.is_empty() {
            return Err(ResolveError::invalid_parameter(
                "primary_assemblies",
                "at least one primary reference or file is required",
            ));
        }
        for ext in self
            .allowed_assembly_extensions
            .iter()
            .chain(&self.allowed_related_file_extensions)
        {
            if !ext.starts_with('.') || ext.len() < 2 {
                return Err(ResolveError::invalid_parameter(
                    "allowed_extensions",
                    ext.clone(),
                ));
            }
        }
        if let Some(version) = &self.target_framework_version {
            let trimmed = version.trim_start_matches(['v', 'V']);
            trimmed.parse::<AssemblyVersion>().map_err(|_| {
                ResolveError::invalid_parameter("target_framework_version", version.clone())
            })?;
        }
        for primary in &self.primary_assemblies {
            if primary.identity.simple_name.is_empty() {
                return Err(ResolveError::invalid_parameter(
                    "primary_assemblies",
                    "empty simple name",
                ));
            }
        }
        // surfaces malformed tokens before any filesystem work happens
        self.parsed_search_paths()?;
        Ok(())
    }

    /// The parsed search-path list.
    pub fn parsed_search_paths(&self) -> Result<Vec<SearchPath>> {
        SearchPath::parse_list(&self.search_paths)
    }

    /// All redist lists in effect: the explicit tables plus, unless disabled,
    /// every `RedistList/*.xml` under the framework directories.
    pub fn effective_installed_tables(&self) -> Vec<PathBuf> {
        let mut tables = self.installed_assembly_tables.clone();
        if !self.ignore_default_installed_assembly_tables {
            for dir in &self.target_framework_dirs {
                tables.extend(xml_files_in(&dir.join(REDIST_LIST_DIR)));
            }
        }
        tables
    }

    /// All subset lists in effect, mirroring
    /// [`Self::effective_installed_tables`].
    pub fn effective_subset_tables(&self) -> Vec<PathBuf> {
        let mut tables = self.installed_assembly_subset_tables.clone();
        if !self.ignore_default_installed_assembly_tables
            && !self.installed_assembly_subset_tables.is_empty()
        {
            for dir in &self.target_framework_dirs {
                tables.extend(xml_files_in(&dir.join(SUBSET_LIST_DIR)));
            }
        }
        tables
    }

    /// Full-framework lists used for exclusion derivation: explicit tables
    /// plus discovery under `full_framework_dirs`.
    pub fn effective_full_framework_tables(&self) -> Vec<PathBuf> {
        let mut tables = self.full_framework_tables.clone();
        for dir in &self.full_framework_dirs {
            tables.extend(xml_files_in(&dir.join(REDIST_LIST_DIR)));
        }
        tables
    }

    /// Whether verbose search logging is on, via config or environment.
    pub fn verbose_search(&self) -> bool {
        if self.log_verbose_search_results {
            return true;
        }
        std::env::var(VERBOSE_SEARCH_ENV)
            .map(|v| !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false"))
            .unwrap_or(false)
    }
}

fn xml_files_in(dir: &Path) -> Vec<PathBuf> {
    let xml = [".xml".to_string()];
    utils::sorted_dir_entries(dir)
        .into_iter()
        .filter(|p| p.is_file() && utils::has_extension(p, &xml))
        .collect()
}
