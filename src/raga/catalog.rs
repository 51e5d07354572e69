// Built-in raga catalog expressed in shruti names
//
// Each raga lists the table degrees it uses. Where a raga uses both forms of
// a svara (Khamaj's two Ni), both appear.

/// One candidate scale for context inference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RagaDefinition {
    pub name: &'static str,
    pub tones: &'static [&'static str],
}

/// Catalog order is the tie-break order
pub const RAGA_CATALOG: [RagaDefinition; 13] = [
    RagaDefinition {
        name: "Bilawal",
        tones: &["Sa", "Re4", "Ga3", "Ma1", "Pa", "Dha3", "Ni3"],
    },
    RagaDefinition {
        name: "Yaman",
        tones: &["Sa", "Re4", "Ga3", "Ma3", "Pa", "Dha3", "Ni3"],
    },
    RagaDefinition {
        name: "Khamaj",
        tones: &["Sa", "Re4", "Ga3", "Ma1", "Pa", "Dha3", "Ni2", "Ni3"],
    },
    RagaDefinition {
        name: "Kafi",
        tones: &["Sa", "Re4", "Ga2", "Ma1", "Pa", "Dha3", "Ni2"],
    },
    RagaDefinition {
        name: "Bhairav",
        tones: &["Sa", "Re1", "Ga3", "Ma1", "Pa", "Dha1", "Ni3"],
    },
    RagaDefinition {
        name: "Bhairavi",
        tones: &["Sa", "Re1", "Ga1", "Ma1", "Pa", "Dha1", "Ni1"],
    },
    RagaDefinition {
        name: "Todi",
        tones: &["Sa", "Re1", "Ga1", "Ma3", "Pa", "Dha1", "Ni3"],
    },
    RagaDefinition {
        name: "Purvi",
        tones: &["Sa", "Re1", "Ga3", "Ma3", "Pa", "Dha1", "Ni3"],
    },
    RagaDefinition {
        name: "Marwa",
        tones: &["Sa", "Re1", "Ga3", "Ma3", "Dha3", "Ni3"],
    },
    RagaDefinition {
        name: "Bhupali",
        tones: &["Sa", "Re4", "Ga3", "Pa", "Dha3"],
    },
    RagaDefinition {
        name: "Durga",
        tones: &["Sa", "Re4", "Ma1", "Pa", "Dha3"],
    },
    RagaDefinition {
        name: "Malkauns",
        tones: &["Sa", "Ga1", "Ma1", "Dha1", "Ni1"],
    },
    RagaDefinition {
        name: "Asavari",
        tones: &["Sa", "Re4", "Ga1", "Ma1", "Pa", "Dha1", "Ni1"],
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shruti::tone_by_name;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_uses_known_tones() {
        for raga in RAGA_CATALOG.iter() {
            for tone in raga.tones {
                assert!(tone_by_name(tone).is_some(), "{} uses unknown {}", raga.name, tone);
            }
            assert_eq!(raga.tones[0], "Sa");
        }
    }

    #[test]
    fn test_catalog_names_and_scales_are_unique() {
        let names: HashSet<_> = RAGA_CATALOG.iter().map(|r| r.name).collect();
        assert_eq!(names.len(), RAGA_CATALOG.len());

        let scales: HashSet<Vec<&str>> = RAGA_CATALOG.iter().map(|r| r.tones.to_vec()).collect();
        assert_eq!(scales.len(), RAGA_CATALOG.len());
    }
}
