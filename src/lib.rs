//! Assembly reference resolution for .NET-style build graphs.
//!
//! Given the primary assembly references a project requests, the resolver
//! computes the transitive closure of everything the project needs at build
//! and runtime, chooses exactly one concrete file per assembly identity,
//! decides which files are copied next to the build output, and explains
//! every decision in a structured log, including the binding redirects that
//! would reconcile version conflicts.
//!
//! ```no_run
//! use assembly_resolver::{PrimaryReference, Resolver, ResolverConfig};
//!
//! let config = ResolverConfig {
//!     primary_assemblies: vec![PrimaryReference::parse(
//!         "Foo, Version=1.0.0.0, Culture=neutral, PublicKeyToken=b03f5f7f11d50a3a",
//!     )?],
//!     search_paths: vec!["{HintPath}".into(), "lib".into(), "{Gac}".into()],
//!     ..Default::default()
//! };
//! let outputs = Resolver::new(config).resolve()?;
//! for file in &outputs.resolved_files {
//!     println!("{} -> {}", file.identity, file.path.display());
//! }
//! assert!(outputs.success());
//! # Ok::<(), assembly_resolver::ResolveError>(())
//! ```

#![warn(rustdoc::all)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(unused_must_use, rust_2018_idioms)]

#[macro_use]
extern crate tracing;

pub mod error;
pub use error::{ResolveError, ResolveIoError, Result};

pub mod identity;
pub use identity::{
    AssemblyIdentity, AssemblyVersion, MatchMode, ProcessorArchitecture, SimpleIdentityKey,
};

pub mod probe;
pub use probe::{ProbeError, ProbeResult};

pub mod cache;
pub use cache::ProbeCache;

pub mod locator;
pub use locator::{FileLocation, LocationSource, RejectionReason, SearchPath};

pub mod redist;
pub use redist::{Classification, FrameworkPolicy};

pub mod redirects;
pub use redirects::{BindingRedirect, RedirectSet, VersionRange};

pub mod reference;
pub use reference::{ConflictLoss, ConflictState, Reference, ReferenceKey, ReferenceTable};

pub mod conflicts;
pub use conflicts::SuggestedRedirect;

pub mod outputs;
pub use outputs::{CopyLocalState, ResolutionOutputs, ResolvedFile, SatelliteFile};

pub mod report;
pub use report::{DecisionLog, EventSink, ResolutionEvent, Severity, TracingSink};

pub mod registry;
pub use registry::{MapRegistry, NoRegistry, Registry, RegistryRoot};

pub mod config;
pub use config::{ArchMismatchSeverity, PrimaryReference, ResolverConfig};

pub mod resolver;
pub use resolver::CancellationToken;

pub mod utils;

use resolver::ResolutionDriver;
use std::sync::Arc;

/// Resolves assembly references for one project configuration.
///
/// The resolver owns the persistent probe cache, the registry abstraction
/// and the decision-log sink; [`Resolver::resolve()`] can be invoked
/// repeatedly and reuses cached metadata across invocations.
#[derive(Clone)]
pub struct Resolver {
    config: ResolverConfig,
    cache: Arc<ProbeCache>,
    registry: Arc<dyn Registry>,
    sink: Option<Arc<dyn EventSink>>,
    /// Advisory from a failed state-file load, surfaced in the decision log.
    cache_advisory: Option<String>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("config", &self.config)
            .field("cache_entries", &self.cache.len())
            .finish()
    }
}

impl Resolver {
    /// Creates a resolver with the default registry and no sink, loading the
    /// probe cache from the configured state file when present.
    pub fn new(config: ResolverConfig) -> Self {
        Self::builder(config).build()
    }

    /// Returns a builder for customizing the registry, cache and sink.
    pub fn builder(config: ResolverConfig) -> ResolverBuilder {
        ResolverBuilder::new(config)
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// The persistent probe cache, shared across invocations.
    pub fn cache(&self) -> &ProbeCache {
        &self.cache
    }

    /// Runs one resolver invocation.
    ///
    /// Recoverable failures are recorded in the decision log and on the
    /// owning references; only invalid parameters, an unreadable redirect
    /// configuration file, or cancellation abort with an `Err`.
    pub fn resolve(&self) -> Result<ResolutionOutputs> {
        self.resolve_with_cancellation(&CancellationToken::new())
    }

    /// Same as [`Self::resolve()`] with a cooperative cancellation signal.
    ///
    /// On cancellation outstanding probe work is drained, partial results
    /// are discarded and the cache is not flushed.
    pub fn resolve_with_cancellation(&self, cancel: &CancellationToken) -> Result<ResolutionOutputs> {
        trace!(
            primaries = self.config.primary_assemblies.len(),
            files = self.config.primary_files.len(),
            "resolving assembly references"
        );
        ResolutionDriver {
            config: &self.config,
            cache: &self.cache,
            registry: self.registry.as_ref(),
            sink: self.sink.clone(),
            cancel,
            cache_advisory: self.cache_advisory.as_deref(),
        }
        .run()
    }
}

/// Builds a [`Resolver`], optionally sharing a cache or injecting a registry
/// and event sink.
pub struct ResolverBuilder {
    config: ResolverConfig,
    cache: Option<Arc<ProbeCache>>,
    registry: Arc<dyn Registry>,
    sink: Option<Arc<dyn EventSink>>,
}

impl ResolverBuilder {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config, cache: None, registry: Arc::new(NoRegistry), sink: None }
    }

    /// Shares a previously constructed probe cache instead of loading one
    /// from the state file.
    #[must_use]
    pub fn cache(mut self, cache: Arc<ProbeCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Resolver {
        let Self { config, cache, registry, sink } = self;

        let mut cache_advisory = None;
        let cache = cache.unwrap_or_else(|| {
            match &config.state_file {
                Some(path) if path.exists() => match ProbeCache::load(path) {
                    Ok(cache) => Arc::new(cache),
                    Err(err) => {
                        debug!("discarding unreadable state file: {err}");
                        cache_advisory = Some(format!(
                            "state file \"{}\" was unreadable and will be rebuilt: {err}",
                            path.display()
                        ));
                        Arc::new(ProbeCache::new())
                    }
                },
                _ => Arc::new(ProbeCache::new()),
            }
        });

        Resolver { config, cache, registry, sink, cache_advisory }
    }
}
