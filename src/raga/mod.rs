// Raga context - rolling inference of the scale being sung
//
// Matched tone names feed a fixed-size window. Once the window holds enough
// tones, every catalog raga is scored against the set of recent tones and
// the best one replaces the current context only if it clears the commit
// threshold. Below the threshold the previous context stays in place.

pub mod catalog;

pub use catalog::{RagaDefinition, RAGA_CATALOG};

use std::collections::{HashSet, VecDeque};

use crate::config::RagaConfig;

/// Bonus when the recent tones are a proper subset of the candidate
const PARTIAL_COVER_BONUS: f64 = 0.2;
/// Bonus when the recent tones contain every candidate tone
const FULL_COVER_BONUS: f64 = 0.3;

/// Score one candidate scale against a set of recently sung tones
///
/// Jaccard overlap plus the two cover bonuses; ranges over [0, 1.3].
pub fn score<'a>(recent: &HashSet<&'a str>, candidate: &HashSet<&'a str>) -> f64 {
    let union = recent.union(candidate).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = recent.intersection(candidate).count();
    let mut score = intersection as f64 / union as f64;

    if recent.len() < candidate.len() && recent.is_subset(candidate) {
        score += PARTIAL_COVER_BONUS;
    }
    if candidate.is_subset(recent) {
        score += FULL_COVER_BONUS;
    }
    score
}

/// Per-session raga context tracker
#[derive(Debug, Clone)]
pub struct RagaContextTracker {
    config: RagaConfig,
    recent: VecDeque<&'static str>,
    current: Option<&'static str>,
}

impl RagaContextTracker {
    pub fn new(config: RagaConfig) -> Self {
        Self {
            recent: VecDeque::with_capacity(config.window.max(1)),
            config,
            current: None,
        }
    }

    /// Current committed context, if any
    pub fn current(&self) -> Option<&'static str> {
        self.current
    }

    pub fn recent_tones(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.recent.iter().copied()
    }

    /// Forget the window and the committed context
    pub fn reset(&mut self) {
        self.recent.clear();
        self.current = None;
    }

    /// Record a matched tone and re-evaluate the context
    ///
    /// # Returns
    /// The new context name when it changed on this call
    pub fn observe(&mut self, tone_name: &'static str) -> Option<&'static str> {
        if self.recent.len() == self.config.window.max(1) {
            self.recent.pop_front();
        }
        self.recent.push_back(tone_name);

        if self.recent.len() < self.config.min_tones {
            return None;
        }

        let (best, best_score) = self.best_candidate()?;
        if best_score >= self.config.commit_threshold && self.current != Some(best) {
            tracing::debug!(raga = best, score = best_score, "raga context changed");
            self.current = Some(best);
            return Some(best);
        }
        None
    }

    /// Highest-scoring catalog raga; earlier entries win ties
    fn best_candidate(&self) -> Option<(&'static str, f64)> {
        let recent: HashSet<&str> = self.recent.iter().copied().collect();

        let mut best: Option<(&'static str, f64)> = None;
        for raga in RAGA_CATALOG.iter() {
            let candidate: HashSet<&str> = raga.tones.iter().copied().collect();
            let s = score(&recent, &candidate);
            if best.map_or(true, |(_, b)| s > b) {
                best = Some((raga.name, s));
            }
        }
        best
    }
}

impl Default for RagaContextTracker {
    fn default() -> Self {
        Self::new(RagaConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set<'a>(tones: &[&'a str]) -> HashSet<&'a str> {
        tones.iter().copied().collect()
    }

    fn feed(tracker: &mut RagaContextTracker, tones: &[&'static str]) -> Vec<&'static str> {
        tones.iter().filter_map(|&t| tracker.observe(t)).collect()
    }

    #[test]
    fn test_score_components() {
        let candidate = set(&["Sa", "Re4", "Ga3", "Pa", "Dha3"]);

        // Exact match: Jaccard 1 + full cover
        assert!((score(&candidate, &candidate) - 1.3).abs() < 1e-12);

        // Proper subset: 3/5 + partial cover bonus
        let partial = set(&["Sa", "Re4", "Pa"]);
        assert!((score(&partial, &candidate) - 0.8).abs() < 1e-12);

        // Superset: 5/6 + full cover bonus
        let superset = set(&["Sa", "Re4", "Ga3", "Pa", "Dha3", "Ni3"]);
        assert!((score(&superset, &candidate) - (5.0 / 6.0 + 0.3)).abs() < 1e-12);

        assert_eq!(score(&HashSet::new(), &HashSet::new()), 0.0);
    }

    #[test]
    fn test_needs_minimum_tones() {
        let mut tracker = RagaContextTracker::default();
        let changes = feed(&mut tracker, &["Sa", "Re4", "Ga3", "Pa"]);
        assert!(changes.is_empty());
        assert_eq!(tracker.current(), None);
    }

    #[test]
    fn test_pentatonic_phrase_commits_bhupali() {
        let mut tracker = RagaContextTracker::default();
        let changes = feed(&mut tracker, &["Sa", "Re4", "Ga3", "Pa", "Dha3", "Pa", "Ga3"]);
        assert_eq!(changes, vec!["Bhupali"]);
        assert_eq!(tracker.current(), Some("Bhupali"));
    }

    #[test]
    fn test_window_slides_to_new_raga() {
        let mut tracker = RagaContextTracker::default();
        feed(&mut tracker, &["Sa", "Re4", "Ga3", "Pa", "Dha3"]);
        assert_eq!(tracker.current(), Some("Bhupali"));

        // Ten Malkauns tones push every Bhupali tone out of the window
        feed(
            &mut tracker,
            &["Sa", "Ga1", "Ma1", "Dha1", "Ni1", "Sa", "Ga1", "Ma1", "Dha1", "Ni1"],
        );
        assert_eq!(tracker.recent_tones().count(), 10);
        assert_eq!(tracker.current(), Some("Malkauns"));
    }

    #[test]
    fn test_weak_evidence_keeps_previous_context() {
        let mut tracker = RagaContextTracker::default();
        feed(&mut tracker, &["Sa", "Re4", "Ga3", "Pa", "Dha3"]);

        // Chromatic wandering scores poorly against every raga
        let changes = feed(
            &mut tracker,
            &["Re2", "Re3", "Ga4", "Ma2", "Ma4", "Dha2", "Dha4", "Ni4", "Re2", "Ga4"],
        );
        assert!(changes.is_empty());
        assert_eq!(tracker.current(), Some("Bhupali"));
    }

    #[test]
    fn test_tie_goes_to_catalog_order() {
        // Bilawal and Yaman both contain this phrase with equal scores
        let mut tracker = RagaContextTracker::default();
        feed(&mut tracker, &["Sa", "Re4", "Ga3", "Dha3", "Ni3"]);
        assert_eq!(tracker.current(), Some("Bilawal"));
    }

    #[test]
    fn test_reset_clears_context() {
        let mut tracker = RagaContextTracker::default();
        feed(&mut tracker, &["Sa", "Re4", "Ga3", "Pa", "Dha3"]);
        tracker.reset();
        assert_eq!(tracker.current(), None);
        assert_eq!(tracker.recent_tones().count(), 0);
    }
}
