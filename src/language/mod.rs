//! Language - generation, evolution, dialect splits, borrowing and extinction
//!
//! Speaker shares are read from settlement head-counts each tick. A language
//! nobody speaks loses vitality and eventually goes extinct; extinct
//! languages are kept for history but never evolve again.

pub mod phonology;

use std::collections::BTreeMap;

use rand::seq::IteratorRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::error::{CivError, Result};
use crate::core::rng::{stream_rng, RngStream};
use crate::core::types::{approach, clamp01};
use crate::settlement::SettlementManager;

pub use phonology::{proper_name, Grammar, Morphology, Phonology, WordOrder, BASE_CONCEPTS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageParams {
    /// Drift rate of complexity and prestige
    pub evolution_rate: f32,
    /// Divergence gained per tick at full speaker share
    pub divergence_rate: f32,
    pub split_threshold: f32,
    pub max_dialects: usize,
    /// Per ordered pair per tick, when the donor out-ranks the target
    pub borrow_chance: f32,
    pub vitality_rate: f32,
    pub extinction_threshold: f32,
}

impl Default for LanguageParams {
    fn default() -> Self {
        Self {
            evolution_rate: 0.001,
            divergence_rate: 0.01,
            split_threshold: 1.0,
            max_dialects: 4,
            borrow_chance: 0.01,
            vitality_rate: 0.05,
            extinction_threshold: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Language {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub phonology: Phonology,
    pub grammar: Grammar,
    /// concept -> word
    pub vocabulary: BTreeMap<String, String>,
    /// concept -> borrowed word
    pub loanwords: BTreeMap<String, String>,
    pub dialects: Vec<String>,
    pub complexity: f32,
    pub prestige: f32,
    pub speaker_share: f32,
    pub vitality: f32,
    pub divergence: f32,
    pub is_extinct: bool,
}

impl Language {
    /// A fresh language with random sounds and a base vocabulary
    pub fn generate<R: Rng>(id: &str, rng: &mut R) -> Self {
        let phonology = Phonology::random(rng);
        let grammar = Grammar::random(rng);
        let vocabulary = BASE_CONCEPTS
            .iter()
            .map(|c| (c.to_string(), phonology.word(rng)))
            .collect();
        let name = proper_name(&phonology, rng);
        let complexity = clamp01(grammar.complexity() + rng.gen_range(-0.05..0.05));
        Self {
            id: id.to_string(),
            name,
            parent_id: None,
            phonology,
            grammar,
            vocabulary,
            loanwords: BTreeMap::new(),
            dialects: Vec::new(),
            complexity,
            prestige: rng.gen_range(0.3..0.7),
            speaker_share: 0.0,
            vitality: 1.0,
            divergence: 0.0,
            is_extinct: false,
        }
    }

    /// Word for a concept, native first then borrowed
    pub fn word(&self, concept: &str) -> Option<&str> {
        self.vocabulary
            .get(concept)
            .or_else(|| self.loanwords.get(concept))
            .map(String::as_str)
    }

    /// A daughter language: shifted sounds, reshaped words, lower prestige
    fn split<R: Rng>(&self, child_id: &str, rng: &mut R) -> Self {
        let mut child = self.clone();
        child.id = child_id.to_string();
        child.parent_id = Some(self.id.clone());
        child.dialects.clear();
        child.loanwords.clear();
        child.divergence = 0.0;
        child.vitality = 1.0;
        child.complexity = clamp01(self.complexity + rng.gen_range(-0.1..=0.1));
        child.prestige = self.prestige * 0.8;

        if let Some((old, new)) = child.phonology.shift(rng) {
            for word in child.vocabulary.values_mut() {
                *word = word.replace(old.as_str(), new.as_str());
            }
        }
        // A handful of words are simply replaced
        let concepts: Vec<String> = child.vocabulary.keys().cloned().collect();
        for concept in concepts {
            if rng.gen_bool(0.15) {
                let w = child.phonology.word(rng);
                child.vocabulary.insert(concept, w);
            }
        }
        child.name = proper_name(&child.phonology, rng);
        child
    }
}

/// Kinship bonus plus weighted complexity closeness, in [0, 1]
pub fn similarity(a: &Language, b: &Language) -> f32 {
    let kin = if a.parent_id.as_deref() == Some(b.id.as_str()) || b.parent_id.as_deref() == Some(a.id.as_str()) {
        0.6
    } else if a.parent_id.is_some() && a.parent_id == b.parent_id {
        0.4
    } else {
        0.0
    };
    (kin + 0.4 * (1.0 - (a.complexity - b.complexity).abs())).min(1.0)
}

/// Language events this tick
#[derive(Debug, Clone, Default)]
pub struct LanguageOutcome {
    /// (parent, child)
    pub splits: Vec<(String, String)>,
    pub extinctions: Vec<String>,
    /// (donor, target, concept)
    pub borrowings: Vec<(String, String, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageManager {
    languages: BTreeMap<String, Language>,
    params: LanguageParams,
    rng: ChaCha8Rng,
}

impl LanguageManager {
    pub fn new(seed: u64, params: LanguageParams) -> Self {
        Self {
            languages: BTreeMap::new(),
            params,
            rng: stream_rng(seed, RngStream::Language),
        }
    }

    pub fn language(&self, id: &str) -> Option<&Language> {
        self.languages.get(id)
    }

    pub fn languages(&self) -> impl Iterator<Item = &Language> {
        self.languages.values()
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    pub fn add_language(&mut self, language: Language) -> Result<()> {
        if self.languages.contains_key(&language.id) {
            return Err(CivError::InvalidState(format!("duplicate language '{}'", language.id)));
        }
        self.languages.insert(language.id.clone(), language);
        Ok(())
    }

    /// Generate a random language under `id`; returns its name
    pub fn generate(&mut self, id: &str) -> Result<String> {
        let language = Language::generate(id, &mut self.rng);
        let name = language.name.clone();
        self.add_language(language)?;
        Ok(name)
    }

    /// A fresh place name in the given language's sounds
    pub fn coin_name(&mut self, language: &str) -> Result<String> {
        let lang = self
            .languages
            .get(language)
            .ok_or_else(|| CivError::NotFound(format!("language '{}'", language)))?;
        Ok(proper_name(&lang.phonology, &mut self.rng))
    }

    pub fn similarity(&self, a: &str, b: &str) -> Result<f32> {
        let la = self
            .languages
            .get(a)
            .ok_or_else(|| CivError::NotFound(format!("language '{}'", a)))?;
        let lb = self
            .languages
            .get(b)
            .ok_or_else(|| CivError::NotFound(format!("language '{}'", b)))?;
        Ok(similarity(la, lb))
    }

    /// Split a dialect off `parent`; returns the child id
    pub fn split(&mut self, parent: &str) -> Result<String> {
        let p = self
            .languages
            .get(parent)
            .ok_or_else(|| CivError::NotFound(format!("language '{}'", parent)))?;
        if p.is_extinct {
            return Err(CivError::InvalidState(format!("{} is extinct", parent)));
        }
        if p.dialects.len() >= self.params.max_dialects {
            return Err(CivError::InvalidState(format!("{} has no room for dialects", parent)));
        }

        let mut n = p.dialects.len() + 1;
        let mut child_id = format!("{}-d{}", parent, n);
        while self.languages.contains_key(&child_id) {
            n += 1;
            child_id = format!("{}-d{}", parent, n);
        }
        let child = p.split(&child_id, &mut self.rng);
        info!("{} splits from {} as {}", child.name, parent, child_id);

        if let Some(p) = self.languages.get_mut(parent) {
            p.dialects.push(child_id.clone());
            p.divergence = 0.0;
        }
        self.languages.insert(child_id.clone(), child);
        Ok(child_id)
    }

    /// Copy one (concept, word) pair from donor into target's loanwords
    pub fn borrow_word(&mut self, donor: &str, target: &str) -> Result<Option<String>> {
        let d = self
            .languages
            .get(donor)
            .ok_or_else(|| CivError::NotFound(format!("language '{}'", donor)))?;
        let t = self
            .languages
            .get(target)
            .ok_or_else(|| CivError::NotFound(format!("language '{}'", target)))?;
        let pick = d
            .vocabulary
            .iter()
            .filter(|(c, _)| !t.loanwords.contains_key(*c))
            .choose(&mut self.rng)
            .map(|(c, w)| (c.clone(), w.clone()));

        let Some((concept, word)) = pick else {
            return Ok(None);
        };
        if let Some(t) = self.languages.get_mut(target) {
            t.loanwords.insert(concept.clone(), word);
        }
        Ok(Some(concept))
    }

    pub fn update(&mut self, dt: f32, settlements: &SettlementManager) -> LanguageOutcome {
        let mut outcome = LanguageOutcome::default();
        let p = self.params.clone();

        let mut speakers: BTreeMap<&str, u64> = BTreeMap::new();
        let mut total = 0u64;
        for s in settlements.iter() {
            for (lang, count) in &s.demographics.languages {
                *speakers.entry(lang.as_str()).or_insert(0) += count;
                total += count;
            }
        }

        let mut ready_to_split = Vec::new();
        for lang in self.languages.values_mut().filter(|l| !l.is_extinct) {
            let share = if total > 0 {
                speakers.get(lang.id.as_str()).copied().unwrap_or(0) as f32 / total as f32
            } else {
                0.0
            };
            lang.speaker_share = share;

            let step = p.evolution_rate * dt;
            let complexity_target = share * lang.prestige;
            let prestige_target = share * lang.complexity;
            lang.complexity = clamp01(approach(lang.complexity, complexity_target, step));
            lang.prestige = clamp01(approach(lang.prestige, prestige_target, step));

            lang.vitality = clamp01(approach(lang.vitality, (4.0 * share).min(1.0), p.vitality_rate * dt));
            if lang.vitality <= p.extinction_threshold {
                lang.vitality = 0.0;
                lang.is_extinct = true;
                info!("{} ({}) is extinct", lang.name, lang.id);
                outcome.extinctions.push(lang.id.clone());
                continue;
            }

            lang.divergence = (lang.divergence + share * p.divergence_rate * dt).min(p.split_threshold);
            if lang.divergence >= p.split_threshold && lang.dialects.len() < p.max_dialects {
                ready_to_split.push(lang.id.clone());
            }
        }

        for parent in ready_to_split {
            match self.split(&parent) {
                Ok(child) => outcome.splits.push((parent, child)),
                Err(e) => debug!("split of {} skipped: {}", parent, e),
            }
        }

        let living: Vec<(String, f32)> = self
            .languages
            .values()
            .filter(|l| !l.is_extinct)
            .map(|l| (l.id.clone(), l.prestige))
            .collect();
        for (donor, donor_prestige) in &living {
            for (target, target_prestige) in &living {
                if donor == target || donor_prestige <= target_prestige {
                    continue;
                }
                if self.rng.gen::<f32>() < p.borrow_chance * dt {
                    if let Ok(Some(concept)) = self.borrow_word(donor, target) {
                        debug!("{} borrows '{}' from {}", target, concept, donor);
                        outcome.borrowings.push((donor.clone(), target.clone(), concept));
                    }
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec2;
    use crate::settlement::{Settlement, SettlementParams};

    fn speakers(lang: &str, pop: u64) -> SettlementManager {
        let mut m = SettlementManager::new(1, SettlementParams::default());
        m.add_settlement(
            Settlement::new("S1", "S1", Vec2::new(1.0, 1.0), "N")
                .with_identity("e", lang, "f")
                .with_population(pop),
        )
        .unwrap();
        m
    }

    #[test]
    fn test_generated_language_has_base_vocabulary() {
        let mut m = LanguageManager::new(3, LanguageParams::default());
        m.generate("L1").unwrap();
        let l = m.language("L1").unwrap();
        assert_eq!(l.vocabulary.len(), BASE_CONCEPTS.len());
        assert!(l.word("water").is_some());
        assert!(m.generate("L1").is_err());
    }

    #[test]
    fn test_split_child_inherits() {
        let mut m = LanguageManager::new(3, LanguageParams::default());
        m.generate("L1").unwrap();
        let child = m.split("L1").unwrap();
        let parent = m.language("L1").unwrap().clone();
        let c = m.language(&child).unwrap();
        assert_eq!(c.parent_id.as_deref(), Some("L1"));
        assert!((c.prestige - parent.prestige * 0.8).abs() < 1e-6);
        assert!((c.complexity - parent.complexity).abs() <= 0.1 + 1e-6);
        assert_eq!(parent.dialects, vec![child.clone()]);
        assert!(similarity(c, &parent) >= 0.6);
    }

    #[test]
    fn test_dialect_cap() {
        let mut m = LanguageManager::new(3, LanguageParams::default());
        m.generate("L1").unwrap();
        for _ in 0..4 {
            m.split("L1").unwrap();
        }
        assert!(m.split("L1").is_err());
    }

    #[test]
    fn test_sibling_similarity() {
        let mut m = LanguageManager::new(3, LanguageParams::default());
        m.generate("L1").unwrap();
        let a = m.split("L1").unwrap();
        let b = m.split("L1").unwrap();
        assert!(m.similarity(&a, &b).unwrap() >= 0.4);
    }

    #[test]
    fn test_unspoken_language_goes_extinct_and_stops() {
        let mut m = LanguageManager::new(3, LanguageParams::default());
        m.generate("L1").unwrap();
        m.generate("L2").unwrap();
        let settlements = speakers("L1", 1_000);

        let mut extinct = false;
        for _ in 0..100 {
            extinct |= m.update(1.0, &settlements).extinctions.contains(&"L2".to_string());
        }
        assert!(extinct);
        let l2 = m.language("L2").unwrap().clone();
        assert!(l2.is_extinct);
        assert_eq!(l2.vitality, 0.0);

        m.update(1.0, &settlements);
        assert_eq!(m.language("L2").unwrap(), &l2);
        assert!(!m.language("L1").unwrap().is_extinct);
    }

    #[test]
    fn test_sole_language_eventually_splits() {
        let mut m = LanguageManager::new(3, LanguageParams::default());
        m.generate("L1").unwrap();
        let settlements = speakers("L1", 1_000);
        let mut splits = 0;
        for _ in 0..150 {
            splits += m.update(1.0, &settlements).splits.len();
        }
        assert!(splits >= 1);
    }
}
