//! Periodic table subset used by the SMILES reader

/// Static properties of a chemical element
#[derive(Debug, PartialEq)]
pub struct Element {
    /// Element symbol with canonical capitalization
    pub symbol: &'static str,
    /// Atomic number (0 for the `*` wildcard)
    pub number: u8,
    /// Standard atomic weight
    pub mass: f32,
    /// Default valences, ascending. Empty for elements outside the organic subset.
    pub valences: &'static [u8],
}

macro_rules! elements {
    ($(($sym:literal, $num:literal, $mass:literal, [$($v:literal),*])),* $(,)?) => {
        &[$(Element { symbol: $sym, number: $num, mass: $mass, valences: &[$($v),*] }),*]
    };
}

static TABLE: &[Element] = elements![
    ("*", 0, 0.0, []),
    ("H", 1, 1.008, [1]),
    ("He", 2, 4.003, []),
    ("Li", 3, 6.94, []),
    ("Be", 4, 9.012, []),
    ("B", 5, 10.81, [3]),
    ("C", 6, 12.011, [4]),
    ("N", 7, 14.007, [3, 5]),
    ("O", 8, 15.999, [2]),
    ("F", 9, 18.998, [1]),
    ("Ne", 10, 20.180, []),
    ("Na", 11, 22.990, []),
    ("Mg", 12, 24.305, []),
    ("Al", 13, 26.982, []),
    ("Si", 14, 28.085, []),
    ("P", 15, 30.974, [3, 5]),
    ("S", 16, 32.06, [2, 4, 6]),
    ("Cl", 17, 35.45, [1]),
    ("Ar", 18, 39.948, []),
    ("K", 19, 39.098, []),
    ("Ca", 20, 40.078, []),
    ("Ti", 22, 47.867, []),
    ("Cr", 24, 51.996, []),
    ("Mn", 25, 54.938, []),
    ("Fe", 26, 55.845, []),
    ("Co", 27, 58.933, []),
    ("Ni", 28, 58.693, []),
    ("Cu", 29, 63.546, []),
    ("Zn", 30, 65.38, []),
    ("Ga", 31, 69.723, []),
    ("Ge", 32, 72.630, []),
    ("As", 33, 74.922, []),
    ("Se", 34, 78.971, []),
    ("Br", 35, 79.904, [1]),
    ("Kr", 36, 83.798, []),
    ("Sr", 38, 87.62, []),
    ("Zr", 40, 91.224, []),
    ("Mo", 42, 95.95, []),
    ("Ru", 44, 101.07, []),
    ("Rh", 45, 102.91, []),
    ("Pd", 46, 106.42, []),
    ("Ag", 47, 107.87, []),
    ("Cd", 48, 112.41, []),
    ("In", 49, 114.82, []),
    ("Sn", 50, 118.71, []),
    ("Sb", 51, 121.76, []),
    ("Te", 52, 127.60, []),
    ("I", 53, 126.90, [1]),
    ("Xe", 54, 131.29, []),
    ("Cs", 55, 132.91, []),
    ("Ba", 56, 137.33, []),
    ("La", 57, 138.91, []),
    ("Gd", 64, 157.25, []),
    ("Yb", 70, 173.05, []),
    ("W", 74, 183.84, []),
    ("Pt", 78, 195.08, []),
    ("Au", 79, 196.97, []),
    ("Hg", 80, 200.59, []),
    ("Tl", 81, 204.38, []),
    ("Pb", 82, 207.2, []),
    ("Bi", 83, 208.98, []),
];

/// Look up an element by its canonical symbol
#[must_use]
pub fn by_symbol(symbol: &str) -> Option<&'static Element> {
    TABLE.iter().find(|e| e.symbol == symbol)
}

/// Look up an element by atomic number
#[must_use]
pub fn by_number(number: u8) -> Option<&'static Element> {
    TABLE.iter().find(|e| e.number == number)
}

/// Resolve a lowercase aromatic symbol (`c`, `se`, ...) to its element
#[must_use]
pub fn aromatic(symbol: &str) -> Option<&'static Element> {
    match symbol {
        "b" | "c" | "n" | "o" | "p" | "s" | "se" | "as" | "te" => {
            let mut chars = symbol.chars();
            let canonical: String = chars
                .next()
                .map(|c| c.to_ascii_uppercase())
                .into_iter()
                .chain(chars)
                .collect();
            by_symbol(&canonical)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_symbol() {
        assert_eq!(by_symbol("Cl").map(|e| e.number), Some(17));
        assert_eq!(by_symbol("C").map(|e| e.number), Some(6));
        assert!(by_symbol("Xx").is_none());
    }

    #[test]
    fn test_lookup_by_number() {
        assert_eq!(by_number(8).map(|e| e.symbol), Some("O"));
        assert!(by_number(120).is_none());
    }

    #[test]
    fn test_aromatic_symbols() {
        assert_eq!(aromatic("c").map(|e| e.symbol), Some("C"));
        assert_eq!(aromatic("se").map(|e| e.symbol), Some("Se"));
        assert!(aromatic("f").is_none());
    }

    #[test]
    fn test_table_is_sorted_by_number() {
        assert!(TABLE.windows(2).all(|w| w[0].number < w[1].number));
    }
}
