use std::collections::HashMap;

use crate::error::{PipelineError, Result};
use crate::models::{AgeContext, MatchTier, RosterTeam};
use crate::services::normalizer;

/// Minimum token-set similarity for the fuzzy tier when reconciling match
/// opponents against rosters.
const FUZZY_THRESHOLD: f64 = 0.85;

/// Looser token-overlap floor used when picking a profile-search candidate.
const SEARCH_THRESHOLD: f64 = 0.60;

#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub team_key: String,
    pub display_name: String,
    pub state: Option<String>,
    pub age_context: AgeContext,
}

/// Resolution of a raw opponent name against the registry.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub team_key: String,
    pub display_name: String,
    pub tier: MatchTier,
    pub age_context: AgeContext,
}

/// Canonical team registry for one division: the union of the division's own
/// roster and its adjacent-age rosters, indexed for the three matcher tiers.
pub struct TeamRegistry {
    entries: Vec<RegistryEntry>,
    by_key: HashMap<String, usize>,
    by_reduced: HashMap<String, usize>,
}

impl TeamRegistry {
    pub fn from_rosters(
        own: &[RosterTeam],
        older: Option<&[RosterTeam]>,
        younger: Option<&[RosterTeam]>,
    ) -> Self {
        let mut registry = Self {
            entries: Vec::new(),
            by_key: HashMap::new(),
            by_reduced: HashMap::new(),
        };
        // own-roster entries win all collisions, so they load first
        registry.load(own, AgeContext::Own);
        if let Some(roster) = older {
            registry.load(roster, AgeContext::Older);
        }
        if let Some(roster) = younger {
            registry.load(roster, AgeContext::Younger);
        }
        registry
    }

    fn load(&mut self, roster: &[RosterTeam], age_context: AgeContext) {
        for team in roster {
            if self.by_key.contains_key(&team.team_key) {
                tracing::warn!(
                    "Registry collision on '{}' ({}); keeping first entry",
                    team.team_key,
                    team.team_name
                );
                continue;
            }
            let index = self.entries.len();
            self.entries.push(RegistryEntry {
                team_key: team.team_key.clone(),
                display_name: team.team_name.clone(),
                state: team.state.clone(),
                age_context,
            });
            self.by_key.insert(team.team_key.clone(), index);
            self.by_reduced
                .entry(normalizer::reduce(&team.team_key))
                .or_insert(index);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, team_key: &str) -> Option<&RegistryEntry> {
        self.by_key.get(team_key).map(|&i| &self.entries[i])
    }

    /// Resolve a raw opponent name through the tiers: exact key equality,
    /// reduced equality, then token-set similarity. A name no tier accepts
    /// comes back as a synthesized external team.
    pub fn resolve(&self, raw_name: &str) -> Result<Resolution> {
        if raw_name.trim().is_empty() {
            return Err(PipelineError::MatchSchemaInvalid(
                "empty opponent name".to_string(),
            ));
        }

        let key = normalizer::normalize(raw_name);
        if let Some(entry) = self.get(&key) {
            return Ok(Resolution {
                team_key: entry.team_key.clone(),
                display_name: entry.display_name.clone(),
                tier: MatchTier::Exact,
                age_context: entry.age_context,
            });
        }

        let reduced = normalizer::reduce(&key);
        if let Some(&index) = self.by_reduced.get(&reduced) {
            let entry = &self.entries[index];
            return Ok(Resolution {
                team_key: entry.team_key.clone(),
                display_name: entry.display_name.clone(),
                tier: MatchTier::Normalized,
                age_context: entry.age_context,
            });
        }

        let mut best: Option<(&RegistryEntry, f64)> = None;
        for entry in &self.entries {
            let similarity = normalizer::token_set_similarity(&key, &entry.team_key);
            if similarity < FUZZY_THRESHOLD {
                continue;
            }
            best = match best {
                None => Some((entry, similarity)),
                Some((current, current_sim)) => {
                    if similarity > current_sim
                        || (similarity == current_sim
                            && (entry.display_name.len(), &entry.team_key)
                                < (current.display_name.len(), &current.team_key))
                    {
                        Some((entry, similarity))
                    } else {
                        Some((current, current_sim))
                    }
                }
            };
        }
        if let Some((entry, similarity)) = best {
            return Ok(Resolution {
                team_key: entry.team_key.clone(),
                display_name: entry.display_name.clone(),
                tier: MatchTier::Fuzzy(similarity),
                age_context: entry.age_context,
            });
        }

        let external = normalizer::external_key(raw_name);
        Ok(Resolution {
            team_key: external.clone(),
            display_name: raw_name.trim().to_string(),
            tier: MatchTier::External(external),
            age_context: AgeContext::Unknown,
        })
    }
}

/// Pick the best profile-search candidate for a roster team name.
///
/// Exact and reduced equality win outright; otherwise candidates need at
/// least 0.60 token overlap, ranked by overlap with Jaro-Winkler as the
/// tie-break. Returns an index into `names`.
pub fn best_search_candidate(team_name: &str, names: &[String]) -> Option<usize> {
    let key = normalizer::normalize(team_name);
    let reduced = normalizer::reduce(&key);

    for (i, name) in names.iter().enumerate() {
        if normalizer::normalize(name) == key {
            return Some(i);
        }
    }
    for (i, name) in names.iter().enumerate() {
        if normalizer::reduce(&normalizer::normalize(name)) == reduced {
            return Some(i);
        }
    }

    let mut best: Option<(usize, f64, f64)> = None;
    for (i, name) in names.iter().enumerate() {
        let candidate_key = normalizer::normalize(name);
        let overlap = normalizer::token_set_similarity(&key, &candidate_key);
        if overlap < SEARCH_THRESHOLD {
            continue;
        }
        let string_sim = strsim::jaro_winkler(&key, &candidate_key);
        let better = match best {
            None => true,
            Some((_, b_overlap, b_sim)) => {
                overlap > b_overlap || (overlap == b_overlap && string_sim > b_sim)
            }
        };
        if better {
            best = Some((i, overlap, string_sim));
        }
    }
    best.map(|(i, _, _)| i)
}
