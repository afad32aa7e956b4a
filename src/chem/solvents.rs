//! Recognized solvent names

/// Solvent names accepted as categorical inputs. Matching is exact and
/// case-sensitive.
pub const AVAILABLE_SOLVENTS: &[&str] = &[
    "water",
    "heavy water",
    "methanol",
    "ethanol",
    "1-propanol",
    "2-propanol",
    "1-butanol",
    "2-butanol",
    "tert-butanol",
    "ethylene glycol",
    "glycerol",
    "acetone",
    "2-butanone",
    "acetonitrile",
    "benzonitrile",
    "dimethyl sulfoxide",
    "DMSO",
    "N,N-dimethylformamide",
    "DMF",
    "N,N-dimethylacetamide",
    "N-methyl-2-pyrrolidone",
    "tetrahydrofuran",
    "THF",
    "2-methyltetrahydrofuran",
    "1,4-dioxane",
    "diethyl ether",
    "diisopropyl ether",
    "methyl tert-butyl ether",
    "1,2-dimethoxyethane",
    "ethyl acetate",
    "methyl acetate",
    "dichloromethane",
    "chloroform",
    "carbon tetrachloride",
    "1,2-dichloroethane",
    "chlorobenzene",
    "benzene",
    "toluene",
    "p-xylene",
    "mesitylene",
    "pyridine",
    "n-hexane",
    "n-heptane",
    "cyclohexane",
    "pentane",
    "nitromethane",
    "formamide",
    "formic acid",
    "acetic acid",
    "trifluoroethanol",
    "hexafluoroisopropanol",
    "carbon disulfide",
];

/// Whether `name` is a recognized solvent
pub fn is_available(name: &str) -> bool {
    AVAILABLE_SOLVENTS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solvent_whitelist_is_case_sensitive() {
        assert!(is_available("water"));
        assert!(is_available("DMSO"));
        assert!(!is_available("Water"));
        assert!(!is_available("dmso"));
        assert!(!is_available("unobtainium"));
    }
}
