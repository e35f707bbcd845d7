//! Sound inventories, grammar classes and word building

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

const CONSONANT_POOL: &[&str] = &[
    "p", "b", "t", "d", "k", "g", "m", "n", "s", "z", "f", "v", "l", "r", "h", "w", "j", "sh", "th",
    "ch", "kh", "ng",
];
const VOWEL_POOL: &[&str] = &["a", "e", "i", "o", "u", "y", "aa", "ei", "ou", "ae"];

/// Concepts every generated language has a word for
pub const BASE_CONCEPTS: &[&str] = &[
    "water", "fire", "earth", "sky", "sun", "moon", "star", "river", "mountain", "tree", "stone",
    "man", "woman", "child", "mother", "father", "king", "god", "war", "peace", "home", "city",
    "bread", "horse", "sword", "gold", "death", "life", "friend", "enemy", "one", "two",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Morphology {
    Isolating,
    Agglutinative,
    Fusional,
    Polysynthetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WordOrder {
    Sov,
    Svo,
    Vso,
    Vos,
    Ovs,
    Osv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phonology {
    pub consonants: Vec<String>,
    pub vowels: Vec<String>,
    /// Share of syllables that close with a consonant
    pub consonant_ratio: f32,
    /// Share of syllables that open with a vowel
    pub vowel_ratio: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grammar {
    pub morphology: Morphology,
    pub word_order: WordOrder,
    pub has_gender: bool,
    pub has_case: bool,
}

impl Phonology {
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let mut consonants: Vec<String> = CONSONANT_POOL.iter().map(|s| s.to_string()).collect();
        consonants.shuffle(rng);
        consonants.truncate(rng.gen_range(8..=16));

        let mut vowels: Vec<String> = VOWEL_POOL.iter().map(|s| s.to_string()).collect();
        vowels.shuffle(rng);
        vowels.truncate(rng.gen_range(3..=7));

        Self {
            consonants,
            vowels,
            consonant_ratio: rng.gen_range(0.1..0.6),
            vowel_ratio: rng.gen_range(0.05..0.3),
        }
    }

    fn syllable<R: Rng>(&self, rng: &mut R) -> String {
        let mut s = String::new();
        if !rng.gen_bool(self.vowel_ratio.clamp(0.0, 1.0) as f64) {
            if let Some(c) = self.consonants.choose(rng) {
                s.push_str(c);
            }
        }
        if let Some(v) = self.vowels.choose(rng) {
            s.push_str(v);
        }
        if rng.gen_bool(self.consonant_ratio.clamp(0.0, 1.0) as f64) {
            if let Some(c) = self.consonants.choose(rng) {
                s.push_str(c);
            }
        }
        s
    }

    /// One to three syllables
    pub fn word<R: Rng>(&self, rng: &mut R) -> String {
        let n = rng.gen_range(1..=3);
        (0..n).map(|_| self.syllable(rng)).collect()
    }

    /// Replace one consonant of the inventory with another from the pool
    pub fn shift<R: Rng>(&mut self, rng: &mut R) -> Option<(String, String)> {
        let replacement = CONSONANT_POOL
            .iter()
            .filter(|c| !self.consonants.iter().any(|k| k == *c))
            .collect::<Vec<_>>()
            .choose(rng)
            .map(|c| c.to_string())?;
        let i = rng.gen_range(0..self.consonants.len().max(1));
        let old = self.consonants.get(i)?.clone();
        self.consonants[i] = replacement.clone();
        Some((old, replacement))
    }
}

impl Grammar {
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let morphology = *[
            Morphology::Isolating,
            Morphology::Agglutinative,
            Morphology::Fusional,
            Morphology::Polysynthetic,
        ]
        .choose(rng)
        .unwrap_or(&Morphology::Isolating);
        // Subject-first orders dominate
        let word_order = match rng.gen_range(0..100) {
            0..=44 => WordOrder::Sov,
            45..=86 => WordOrder::Svo,
            87..=95 => WordOrder::Vso,
            96..=97 => WordOrder::Vos,
            98 => WordOrder::Ovs,
            _ => WordOrder::Osv,
        };
        Self {
            morphology,
            word_order,
            has_gender: rng.gen_bool(0.4),
            has_case: rng.gen_bool(0.5),
        }
    }

    /// Baseline complexity implied by the grammar
    pub fn complexity(&self) -> f32 {
        let m = match self.morphology {
            Morphology::Isolating => 0.2,
            Morphology::Agglutinative => 0.45,
            Morphology::Fusional => 0.55,
            Morphology::Polysynthetic => 0.7,
        };
        m + if self.has_gender { 0.1 } else { 0.0 } + if self.has_case { 0.15 } else { 0.0 }
    }
}

/// Capitalised name built from the language's own sounds
pub fn proper_name<R: Rng>(phonology: &Phonology, rng: &mut R) -> String {
    let word = phonology.word(rng);
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Unnamed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::{stream_rng, RngStream};

    #[test]
    fn test_inventories_in_bounds() {
        let mut rng = stream_rng(5, RngStream::Language);
        for _ in 0..20 {
            let p = Phonology::random(&mut rng);
            assert!((8..=16).contains(&p.consonants.len()));
            assert!((3..=7).contains(&p.vowels.len()));
            assert!(!p.word(&mut rng).is_empty());
        }
    }

    #[test]
    fn test_shift_keeps_inventory_size() {
        let mut rng = stream_rng(5, RngStream::Language);
        let mut p = Phonology::random(&mut rng);
        let n = p.consonants.len();
        let (old, new) = p.shift(&mut rng).unwrap();
        assert_ne!(old, new);
        assert_eq!(p.consonants.len(), n);
        assert!(p.consonants.contains(&new));
    }

    #[test]
    fn test_proper_name_is_capitalised() {
        let mut rng = stream_rng(11, RngStream::Language);
        let p = Phonology::random(&mut rng);
        let name = proper_name(&p, &mut rng);
        assert!(name.chars().next().unwrap().is_uppercase());
    }
}
