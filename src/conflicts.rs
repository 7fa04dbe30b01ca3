//! Conflict detection and resolution.
//!
//! A conflict set is a group of references sharing a simple identity but
//! carrying distinct strict identities. Exactly one winner is chosen per set
//! by the priority rules (primary, higher version, newer file version,
//! earlier search path); everyone else is marked a victim. Each decided
//! conflict yields a suggested binding redirect, and in auto-unify mode the
//! same redirects are fed back into the redirect engine for one more closure
//! pass.

use crate::{
    identity::{AssemblyIdentity, AssemblyVersion, SimpleIdentityKey},
    redirects::{BindingRedirect, VersionRange},
    reference::{ConflictLoss, ConflictState, ReferenceKey, ReferenceTable},
};

/// A redirect the user could add to silence a conflict.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuggestedRedirect {
    pub identity: SimpleIdentityKey,
    pub max_version: AssemblyVersion,
}

/// One decided conflict pair, for the decision log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConflictDecision {
    pub winner: AssemblyIdentity,
    pub loser: AssemblyIdentity,
    pub reason: ConflictLoss,
    /// Two primaries disagreed; diagnostics escalate to warnings.
    pub insoluble: bool,
}

/// Everything the conflict pass produced.
#[derive(Debug, Default)]
pub struct ConflictOutcome {
    pub decisions: Vec<ConflictDecision>,
    pub suggested_redirects: Vec<SuggestedRedirect>,
    /// Live redirects for the auto-unify closure pass.
    pub auto_unify_redirects: Vec<BindingRedirect>,
}

impl ConflictOutcome {
    pub fn has_conflicts(&self) -> bool {
        !self.decisions.is_empty()
    }
}

/// Ranking material for one conflict participant.
struct Contender {
    key: ReferenceKey,
    identity: AssemblyIdentity,
    is_primary: bool,
    version: AssemblyVersion,
    file_version: Option<AssemblyVersion>,
    search_path_index: usize,
}

/// Detects and decides every conflict in the table.
///
/// Winners become [`ConflictState::Victor`], losers
/// [`ConflictState::Victim`]. When `auto_unify` is set the suggested
/// redirects are also returned as live redirects.
pub fn resolve_conflicts(table: &mut ReferenceTable, auto_unify: bool) -> ConflictOutcome {
    let mut outcome = ConflictOutcome::default();

    for group in table.simple_groups() {
        if group.len() < 2 {
            continue;
        }

        let contenders: Vec<Contender> = group
            .iter()
            .map(|key| {
                let reference = table.get(key).expect("group key in table");
                Contender {
                    key: key.clone(),
                    identity: reference.effective_identity().clone(),
                    is_primary: reference.is_primary,
                    version: reference
                        .resolved_identity
                        .as_ref()
                        .map(AssemblyIdentity::version_or_zero)
                        .unwrap_or_else(|| reference.requested_identity.version_or_zero()),
                    file_version: reference.probe.as_ref().and_then(|p| p.file_version),
                    search_path_index: reference
                        .resolved_location
                        .as_ref()
                        .map(|l| l.search_path_index)
                        .unwrap_or(usize::MAX),
                }
            })
            .collect();

        let insoluble = {
            let primaries: Vec<_> = contenders.iter().filter(|c| c.is_primary).collect();
            primaries.len() > 1
                && primaries.windows(2).any(|w| w[0].version != w[1].version)
        };

        let winner_index = select_winner(&contenders);
        let winner_key = contenders[winner_index].key.clone();
        let winner_identity = contenders[winner_index].identity.clone();
        let winner_version = contenders[winner_index].version;
        let winner_is_primary = contenders[winner_index].is_primary;

        let mut victims = 0usize;
        for (index, contender) in contenders.iter().enumerate() {
            if index == winner_index {
                continue;
            }
            victims += 1;
            let reason = if insoluble && contender.is_primary {
                ConflictLoss::InsolubleConflict
            } else if contender.version < winner_version {
                ConflictLoss::HadLowerVersion
            } else if contender.version == winner_version {
                ConflictLoss::FusionEquivalentWithSameVersion
            } else {
                ConflictLoss::WasNotPrimary
            };
            debug_assert!(
                reason != ConflictLoss::WasNotPrimary || winner_is_primary,
                "WasNotPrimary loss implies a primary winner"
            );
            outcome.decisions.push(ConflictDecision {
                winner: winner_identity.clone(),
                loser: contender.identity.clone(),
                reason,
                insoluble,
            });
            if let Some(reference) = table.get_mut(&contender.key) {
                reference.conflict_state =
                    ConflictState::Victim { reason, winner: winner_key.clone() };
            }
        }

        if let Some(reference) = table.get_mut(&winner_key) {
            reference.conflict_state = ConflictState::Victor;
        }

        if victims > 0 && winner_version > AssemblyVersion::ZERO {
            outcome.suggested_redirects.push(SuggestedRedirect {
                identity: winner_key.simple.clone(),
                max_version: winner_version,
            });
            if auto_unify {
                outcome.auto_unify_redirects.push(BindingRedirect {
                    identity: winner_key.simple.clone(),
                    old_versions: VersionRange::up_to(winner_version),
                    new_version: winner_version,
                });
            }
        }
    }

    outcome
}

/// Applies the winner priority rules in order; the search-path index and
/// finally the key order break remaining ties deterministically.
fn select_winner(contenders: &[Contender]) -> usize {
    let mut best = 0;
    for index in 1..contenders.len() {
        let challenger = &contenders[index];
        let champion = &contenders[best];
        let challenger_wins = (challenger.is_primary, !champion.is_primary) == (true, true)
            || (challenger.is_primary == champion.is_primary
                && (challenger.version > champion.version
                    || (challenger.version == champion.version
                        && (challenger.file_version > champion.file_version
                            || (challenger.file_version == champion.file_version
                                && challenger.search_path_index
                                    < champion.search_path_index)))));
        if challenger_wins {
            best = index;
        }
    }
    best
}
