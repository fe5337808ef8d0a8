use crate::data::atmosphere::ColumnSource;

// ---------------------------------------------------------------------------
// Molecule catalogue
// ---------------------------------------------------------------------------

/// One isotopologue of a molecule.
///
/// `local_id` is the single-character HITRAN isotopologue code as stored in
/// the line tables (`0` stands for the tenth isotopologue). `global_id` is
/// the HITRAN-wide isotopologue number used to name partition-sum tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Isotopologue {
    pub name: &'static str,
    pub local_id: u8,
    pub global_id: u16,
}

#[derive(Debug, Clone, Copy)]
pub struct Molecule {
    /// Formula, also the name of the molecule's line table.
    pub name: &'static str,
    pub hitran_id: u8,
    pub column_source: ColumnSource,
    /// Volume mixing ratio applied on top of the column density.
    pub concentration: f64,
    /// Linear molecules have two rotational degrees of freedom.
    pub linear: bool,
    pub isotopologues: &'static [Isotopologue],
}

impl Molecule {
    pub fn isotopologue(&self, local_id: u8) -> Option<&'static Isotopologue> {
        self.isotopologues.iter().find(|iso| iso.local_id == local_id)
    }
}

const fn iso(name: &'static str, local_id: u8, global_id: u16) -> Isotopologue {
    Isotopologue { name, local_id, global_id }
}

pub static MOLECULES: &[Molecule] = &[
    Molecule {
        name: "H2O",
        hitran_id: 1,
        column_source: ColumnSource::H2O,
        concentration: 1.0,
        linear: false,
        isotopologues: &[
            iso("H2O", 1, 1),
            iso("H2(18O)", 2, 2),
            iso("H2(17O)", 3, 3),
            iso("HD(16O)", 4, 4),
            iso("HD(18O)", 5, 5),
            iso("HD(17O)", 6, 6),
            iso("D2(16O)", 7, 129),
        ],
    },
    Molecule {
        name: "O3",
        hitran_id: 3,
        column_source: ColumnSource::OzoneByLatitude,
        concentration: 1.0,
        linear: false,
        isotopologues: &[
            iso("O3", 1, 16),
            iso("O2(18O)", 2, 17),
            iso("O(18O)O", 3, 18),
            iso("O2(17O)", 4, 19),
            iso("O(17O)O", 5, 20),
        ],
    },
    Molecule {
        name: "HNO3",
        hitran_id: 12,
        column_source: ColumnSource::Mix,
        concentration: 10.0e-9,
        linear: false,
        isotopologues: &[iso("HNO3", 1, 47), iso("H(15N)O3", 2, 117)],
    },
    Molecule {
        name: "N2O",
        hitran_id: 4,
        column_source: ColumnSource::Mix,
        concentration: 0.28e-6,
        linear: true,
        isotopologues: &[
            iso("N2O", 1, 21),
            iso("N(15N)O", 2, 22),
            iso("(15N)NO", 3, 23),
            iso("N2(18O)", 4, 24),
            iso("N2(17O)", 5, 25),
        ],
    },
    Molecule {
        name: "O2",
        hitran_id: 7,
        column_source: ColumnSource::Mix,
        concentration: 2.1e-6,
        linear: true,
        isotopologues: &[iso("O2", 1, 36), iso("O(18O)", 2, 37), iso("O(17O)", 3, 38)],
    },
    Molecule {
        name: "CO",
        hitran_id: 5,
        column_source: ColumnSource::Mix,
        concentration: 0.75e-6,
        linear: true,
        isotopologues: &[
            iso("CO", 1, 26),
            iso("(13C)O", 2, 27),
            iso("C(18O)", 3, 28),
            iso("C(17O)", 4, 29),
            iso("(13C)(18O)", 5, 30),
            iso("(13C)(17O)", 6, 31),
        ],
    },
    Molecule {
        name: "CO2",
        hitran_id: 2,
        column_source: ColumnSource::Mix,
        concentration: 400.0e-6,
        linear: true,
        isotopologues: &[
            iso("CO2", 1, 7),
            iso("(13C)O2", 2, 8),
            iso("OC(18O)", 3, 9),
            iso("OC(17O)", 4, 10),
            iso("O(13C)(18O)", 5, 11),
            iso("O(13C)(17O)", 6, 12),
            iso("C(18O)2", 7, 13),
            iso("(17O)C(18O)", 8, 14),
            iso("C(17O)2", 9, 121),
            iso("(13C)(18O)2", 0, 15),
            iso("(18O)(13C)(17O)", 11, 120),
            iso("(13C)(17O)2", 12, 122),
        ],
    },
    Molecule {
        name: "CH4",
        hitran_id: 6,
        column_source: ColumnSource::Mix,
        concentration: 1.6e-6,
        linear: false,
        isotopologues: &[
            iso("CH4", 1, 32),
            iso("(13C)H4", 2, 33),
            iso("CH3D", 3, 34),
            iso("(13C)H3D", 4, 35),
        ],
    },
];

pub fn molecule(name: &str) -> Option<&'static Molecule> {
    MOLECULES.iter().find(|m| m.name == name)
}

pub fn molecule_by_hitran_id(hitran_id: u8) -> Option<&'static Molecule> {
    MOLECULES.iter().find(|m| m.hitran_id == hitran_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn lookup_by_name_and_id() {
        assert_eq!(molecule("CO2").unwrap().hitran_id, 2);
        assert_eq!(molecule_by_hitran_id(12).unwrap().name, "HNO3");
        assert!(molecule("Xe").is_none());
    }

    #[test]
    fn tenth_isotopologue_uses_zero_code() {
        let co2 = molecule("CO2").unwrap();
        assert_eq!(co2.isotopologue(0).unwrap().name, "(13C)(18O)2");
        assert_eq!(co2.isotopologue(11).unwrap().global_id, 120);
    }

    #[test]
    fn ids_are_unique() {
        let mut globals = BTreeSet::new();
        for m in MOLECULES {
            let locals: BTreeSet<u8> = m.isotopologues.iter().map(|i| i.local_id).collect();
            assert_eq!(locals.len(), m.isotopologues.len(), "{}", m.name);
            for iso in m.isotopologues {
                assert!(globals.insert(iso.global_id), "{}", iso.name);
            }
        }
    }

    #[test]
    fn only_ozone_is_latitude_dependent() {
        for m in MOLECULES {
            let banded = m.column_source == ColumnSource::OzoneByLatitude;
            assert_eq!(banded, m.name == "O3");
        }
    }
}
