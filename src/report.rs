//! The structured decision log.
//!
//! Every choice the resolver makes is appended to a [`DecisionLog`] as a
//! [`ResolutionEvent`]. The log is owned and written by the driver thread
//! only, so its event order is deterministic for identical inputs. Sinks are
//! pluggable: anything implementing [`EventSink`] receives events as they are
//! recorded, e.g. [`TracingSink`] forwards them to the `tracing` ecosystem.

use crate::{
    identity::{AssemblyIdentity, AssemblyVersion, SimpleIdentityKey},
    locator::RejectionReason,
    outputs::CopyLocalState,
    reference::ConflictLoss,
};
use std::{fmt, path::PathBuf, sync::Arc};

/// Stable diagnostic codes attached to warnings and errors.
pub mod codes {
    /// A dependency conflict was resolved with a winner.
    pub const SOLUBLE_CONFLICT: &str = "ARR1001";
    /// Two primary references disagree on a version.
    pub const INSOLUBLE_CONFLICT: &str = "ARR1002";
    /// The resolved architecture does not match the target.
    pub const ARCH_MISMATCH: &str = "ARR2002";
    /// No candidate matched a requested identity.
    pub const RESOLUTION_FAILED: &str = "ARR3001";
    /// A transitive dependency of a resolved reference failed to resolve.
    pub const DEPENDENCY_FAILED: &str = "ARR3002";
    /// A candidate file was rejected as malformed.
    pub const BAD_IMAGE: &str = "ARR3003";
}

/// Why a reference ended up on a version other than the requested one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnificationReason {
    /// An explicit redirect from the configuration file.
    ConfigRedirect,
    /// A redirect synthesized by the auto-unify pass.
    AutoUnify,
    /// Retargeted to the version shipped by the target framework.
    FrameworkRetarget,
    None,
}

impl fmt::Display for UnificationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ConfigRedirect => "UnificationByConfigRedirect",
            Self::AutoUnify => "UnificationByAutoUnify",
            Self::FrameworkRetarget => "UnificationByFrameworkRetarget",
            Self::None => "None",
        };
        f.write_str(s)
    }
}

/// Whether an event describes a primary reference or a discovered dependency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferenceKind {
    Primary,
    Dependency,
}

/// One recorded resolver decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolutionEvent {
    /// An input parameter, logged before any resolution work.
    Input { name: &'static str, value: String },
    /// A reference block begins.
    PrimaryOrDependency { identity: AssemblyIdentity, kind: ReferenceKind },
    /// A candidate location was examined and rejected.
    Considered { location: PathBuf, reason: RejectionReason },
    /// A reference resolved to a concrete file.
    Resolved { identity: AssemblyIdentity, location: PathBuf },
    /// A version was remapped before the candidate search.
    Unified {
        identity: AssemblyIdentity,
        from: AssemblyVersion,
        to: AssemblyVersion,
        reason: UnificationReason,
    },
    /// A conflict was decided.
    Conflict { winner: AssemblyIdentity, loser: AssemblyIdentity, reason: ConflictLoss },
    /// A binding redirect that would silence a conflict.
    SuggestedRedirect { identity: SimpleIdentityKey, new_version: AssemblyVersion },
    /// The copy-local outcome for one reference.
    CopyLocalDecision { identity: AssemblyIdentity, state: CopyLocalState },
    /// A reference was pruned by the subset exclusion list.
    ExclusionApplied { identity: AssemblyIdentity, subset: String },
    Advisory { code: Option<&'static str>, message: String },
    Warning { code: &'static str, message: String },
    Error { code: &'static str, message: String },
}

/// Coarse severity, derived from the event kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Advisory,
    Warning,
    Error,
}

impl ResolutionEvent {
    /// An advisory without a diagnostic code.
    pub fn advisory(message: impl Into<String>) -> Self {
        Self::Advisory { code: None, message: message.into() }
    }

    /// An advisory carrying one of the stable [`codes`].
    pub fn coded_advisory(code: &'static str, message: impl Into<String>) -> Self {
        Self::Advisory { code: Some(code), message: message.into() }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Error { .. } => Severity::Error,
            Self::Warning { .. } => Severity::Warning,
            Self::Advisory { .. } => Severity::Advisory,
            _ => Severity::Info,
        }
    }

    /// Events belonging to the per-reference log block, which `silent`
    /// suppresses from sinks.
    pub fn is_reference_detail(&self) -> bool {
        matches!(
            self,
            Self::PrimaryOrDependency { .. }
                | Self::Considered { .. }
                | Self::Resolved { .. }
                | Self::Unified { .. }
                | Self::CopyLocalDecision { .. }
        )
    }
}

impl fmt::Display for ResolutionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input { name, value } => write!(f, "input {name}={value}"),
            Self::PrimaryOrDependency { identity, kind } => match kind {
                ReferenceKind::Primary => write!(f, "primary reference \"{identity}\""),
                ReferenceKind::Dependency => write!(f, "dependency \"{identity}\""),
            },
            Self::Considered { location, reason } => {
                write!(f, "considered \"{}\": {reason}", location.display())
            }
            Self::Resolved { identity, location } => {
                write!(f, "resolved \"{identity}\" -> \"{}\"", location.display())
            }
            Self::Unified { identity, from, to, reason } => {
                write!(f, "{reason}: \"{identity}\" {from} -> {to}")
            }
            Self::Conflict { winner, loser, reason } => {
                write!(f, "conflict: \"{winner}\" won over \"{loser}\" ({reason})")
            }
            Self::SuggestedRedirect { identity, new_version } => {
                write!(f, "suggested redirect: \"{identity}\" 0.0.0.0 -> {new_version}")
            }
            Self::CopyLocalDecision { identity, state } => {
                write!(f, "copy-local \"{identity}\": {state}")
            }
            Self::ExclusionApplied { identity, subset } => {
                write!(f, "excluded \"{identity}\" (not in subset \"{subset}\")")
            }
            Self::Advisory { code: Some(code), message } => {
                write!(f, "advisory {code}: {message}")
            }
            Self::Advisory { code: None, message } => write!(f, "advisory: {message}"),
            Self::Warning { code, message } => write!(f, "warning {code}: {message}"),
            Self::Error { code, message } => write!(f, "error {code}: {message}"),
        }
    }
}

/// Receives events as the resolver records them.
pub trait EventSink: Send + Sync {
    fn event(&self, event: &ResolutionEvent);
}

/// Forwards events to `tracing` at a level matching their severity.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn event(&self, event: &ResolutionEvent) {
        match event.severity() {
            Severity::Error => error!(target: "assembly_resolver", "{event}"),
            Severity::Warning => warn!(target: "assembly_resolver", "{event}"),
            Severity::Advisory => info!(target: "assembly_resolver", "{event}"),
            Severity::Info => debug!(target: "assembly_resolver", "{event}"),
        }
    }
}

/// The append-only event stream of one resolver invocation.
///
/// Order is inputs first, then one block per reference (primaries before the
/// dependencies they pulled in), then conflicts, suggested redirects and
/// trailing advisories, mirroring the driver's control flow.
#[derive(Default)]
pub struct DecisionLog {
    events: Vec<ResolutionEvent>,
    sink: Option<Arc<dyn EventSink>>,
    /// Suppresses per-reference blocks from the sink.
    silent: bool,
    /// Forces per-candidate events through even when `silent` is set.
    verbose_search: bool,
}

impl DecisionLog {
    pub fn new(sink: Option<Arc<dyn EventSink>>, silent: bool, verbose_search: bool) -> Self {
        Self { events: Vec::new(), sink, silent, verbose_search }
    }

    /// Records an event, forwarding it to the sink unless suppressed.
    pub fn push(&mut self, event: ResolutionEvent) {
        if let Some(sink) = &self.sink {
            let suppressed = self.silent && event.is_reference_detail() && !self.verbose_search;
            if !suppressed {
                sink.event(&event);
            }
        }
        self.events.push(event);
    }

    pub fn events(&self) -> &[ResolutionEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// `false` iff any recorded event is an error.
    pub fn success(&self) -> bool {
        !self.events.iter().any(|e| e.severity() == Severity::Error)
    }

    /// All warning and error events in recorded order.
    pub fn diagnostics(&self) -> impl Iterator<Item = &ResolutionEvent> {
        self.events.iter().filter(|e| e.severity() >= Severity::Warning)
    }
}

impl fmt::Debug for DecisionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionLog")
            .field("events", &self.events.len())
            .field("silent", &self.silent)
            .finish()
    }
}
