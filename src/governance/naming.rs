//! Government names from continuous traits

/// Nouns indexed by [high centralization][high democracy], then intensity
const NOUNS: [[[&str; 3]; 2]; 2] = [
    [
        ["Tribal Lands", "Chiefdoms", "Clan Holds"],
        ["Confederation", "League", "Commonwealth"],
    ],
    [
        ["Kingdom", "Empire", "Autocracy"],
        ["Republic", "Union", "Directorate"],
    ],
];

/// Adjectives indexed by [high stability][high corruption], then intensity
const ADJECTIVES: [[[&str; 3]; 2]; 2] = [
    [
        ["Restless", "Troubled", "Embattled"],
        ["Fractured", "Crumbling", "Rotten"],
    ],
    [
        ["United", "Serene", "Eternal"],
        ["Gilded", "Venal", "Plutocratic"],
    ],
];

/// How far a pair of traits sits from the centre, as a table index
fn intensity(a: f32, b: f32) -> usize {
    let d = (a - 0.5).abs().max((b - 0.5).abs());
    ((d * 6.0) as usize).min(2)
}

pub fn government_noun(centralization: f32, democracy: f32) -> &'static str {
    let c = usize::from(centralization >= 0.5);
    let d = usize::from(democracy >= 0.5);
    NOUNS[c][d][intensity(centralization, democracy)]
}

pub fn government_adjective(stability: f32, corruption: f32) -> &'static str {
    let s = usize::from(stability >= 0.5);
    let c = usize::from(corruption >= 0.5);
    ADJECTIVES[s][c][intensity(stability, corruption)]
}

/// e.g. "Serene Republic of Aldmar"
pub fn government_name(nation: &str, centralization: f32, democracy: f32, corruption: f32, stability: f32) -> String {
    format!(
        "{} {} of {}",
        government_adjective(stability, corruption),
        government_noun(centralization, democracy),
        nation
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadrants() {
        assert_eq!(government_noun(0.9, 0.1), "Autocracy");
        assert_eq!(government_noun(0.55, 0.6), "Republic");
        assert_eq!(government_noun(0.1, 0.9), "Commonwealth");
        assert_eq!(government_adjective(0.9, 0.1), "Eternal");
        assert_eq!(government_adjective(0.2, 0.8), "Crumbling");
        assert_eq!(government_adjective(0.0, 1.0), "Rotten");
    }

    #[test]
    fn test_full_name() {
        let name = government_name("Aldmar", 0.55, 0.55, 0.45, 0.55);
        assert_eq!(name, "United Republic of Aldmar");
    }
}
