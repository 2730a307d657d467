//! SMILES tokenizer
//!
//! Splits a SMILES string into lexemes. Each lexeme keeps its source text so
//! token-based backbones can map it onto a vocabulary.

use super::element::{self, Element};
use super::SmilesError;

/// Bond symbol between two atoms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BondOrder {
    /// `-`, `/`, `\` or implicit between aliphatic atoms
    Single,
    /// `=`
    Double,
    /// `#`
    Triple,
    /// `$`
    Quadruple,
    /// `:` or implicit between aromatic atoms
    Aromatic,
}

impl BondOrder {
    /// Valence contribution of the bond to each endpoint
    #[must_use]
    pub const fn valence(self) -> u8 {
        match self {
            Self::Single | Self::Aromatic => 1,
            Self::Double => 2,
            Self::Triple => 3,
            Self::Quadruple => 4,
        }
    }

    /// Stable index used for edge features
    #[must_use]
    pub const fn index(self) -> u32 {
        match self {
            Self::Single => 0,
            Self::Double => 1,
            Self::Triple => 2,
            Self::Aromatic => 3,
            Self::Quadruple => 4,
        }
    }
}

/// Tetrahedral chirality marker of a bracket atom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Chirality {
    /// No marker
    #[default]
    Unspecified,
    /// `@`
    CounterClockwise,
    /// `@@`
    Clockwise,
}

impl Chirality {
    /// Stable index used for atom features
    #[must_use]
    pub const fn index(self) -> u32 {
        match self {
            Self::Unspecified => 0,
            Self::Clockwise => 1,
            Self::CounterClockwise => 2,
        }
    }
}

/// Atom as written in the SMILES string
#[derive(Debug, Clone, PartialEq)]
pub struct AtomSpec {
    /// Resolved element
    pub element: &'static Element,
    /// Written in lowercase (aromatic)
    pub aromatic: bool,
    /// Written inside brackets
    pub bracket: bool,
    /// Mass number, bracket atoms only
    pub isotope: Option<u16>,
    /// Chirality marker
    pub chirality: Chirality,
    /// Explicit hydrogen count, bracket atoms only
    pub hydrogens: Option<u8>,
    /// Formal charge
    pub charge: i8,
}

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// An atom
    Atom(AtomSpec),
    /// An explicit bond symbol
    Bond(BondOrder),
    /// `(`
    BranchOpen,
    /// `)`
    BranchClose,
    /// Ring closure digit or `%nn`
    Ring(u16),
    /// `.` disconnection
    Dot,
}

/// A token plus the slice of input it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme<'a> {
    /// Source text of the token
    pub text: &'a str,
    /// Byte offset of the token in the input
    pub offset: usize,
    /// Parsed token
    pub token: Token,
}

/// Tokenize a SMILES string
///
/// # Errors
///
/// Returns [`SmilesError`] on characters outside the SMILES alphabet or on
/// malformed bracket atoms.
pub fn tokenize(smiles: &str) -> Result<Vec<Lexeme<'_>>, SmilesError> {
    let bytes = smiles.as_bytes();
    let mut lexemes = Vec::with_capacity(bytes.len());
    let mut pos = 0;

    while pos < bytes.len() {
        let start = pos;
        let token = match bytes[pos] {
            b'[' => {
                let end = smiles[pos..]
                    .find(']')
                    .map(|i| pos + i)
                    .ok_or(SmilesError::UnclosedBracket { offset: pos })?;
                let atom = parse_bracket(&smiles[pos + 1..end], pos)?;
                pos = end + 1;
                Token::Atom(atom)
            }
            b'-' | b'/' | b'\\' => {
                pos += 1;
                Token::Bond(BondOrder::Single)
            }
            b'=' => {
                pos += 1;
                Token::Bond(BondOrder::Double)
            }
            b'#' => {
                pos += 1;
                Token::Bond(BondOrder::Triple)
            }
            b'$' => {
                pos += 1;
                Token::Bond(BondOrder::Quadruple)
            }
            b':' => {
                pos += 1;
                Token::Bond(BondOrder::Aromatic)
            }
            b'(' => {
                pos += 1;
                Token::BranchOpen
            }
            b')' => {
                pos += 1;
                Token::BranchClose
            }
            b'.' => {
                pos += 1;
                Token::Dot
            }
            b'%' => {
                let digits = bytes.get(pos + 1..pos + 3).filter(|d| d.iter().all(u8::is_ascii_digit));
                let digits = digits.ok_or(SmilesError::UnexpectedChar { ch: '%', offset: pos })?;
                pos += 3;
                Token::Ring(u16::from(digits[0] - b'0') * 10 + u16::from(digits[1] - b'0'))
            }
            b @ b'0'..=b'9' => {
                pos += 1;
                Token::Ring(u16::from(b - b'0'))
            }
            _ => {
                let (atom, len) = parse_organic(&smiles[pos..], pos)?;
                pos += len;
                Token::Atom(atom)
            }
        };
        lexemes.push(Lexeme {
            text: &smiles[start..pos],
            offset: start,
            token,
        });
    }

    Ok(lexemes)
}

fn organic_atom(element: &'static Element, aromatic: bool) -> AtomSpec {
    AtomSpec {
        element,
        aromatic,
        bracket: false,
        isotope: None,
        chirality: Chirality::Unspecified,
        hydrogens: None,
        charge: 0,
    }
}

/// Parse an organic-subset atom at the start of `rest`, returning its length
fn parse_organic(rest: &str, offset: usize) -> Result<(AtomSpec, usize), SmilesError> {
    let two = rest.get(..2);
    if let Some(sym @ ("Cl" | "Br")) = two {
        let element = element::by_symbol(sym).ok_or(SmilesError::UnknownElement {
            symbol: sym.to_string(),
            offset,
        })?;
        return Ok((organic_atom(element, false), 2));
    }

    let ch = rest.chars().next().unwrap_or('\0');
    let (element, aromatic) = match ch {
        'B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I' | '*' => {
            (element::by_symbol(&rest[..1]), false)
        }
        'b' | 'c' | 'n' | 'o' | 'p' | 's' => (element::aromatic(&rest[..1]), true),
        _ => return Err(SmilesError::UnexpectedChar { ch, offset }),
    };
    let element = element.ok_or(SmilesError::UnexpectedChar { ch, offset })?;
    Ok((organic_atom(element, aromatic), 1))
}

/// Parse the inside of `[...]`: isotope? symbol chirality? hcount? charge? class?
fn parse_bracket(body: &str, offset: usize) -> Result<AtomSpec, SmilesError> {
    let bytes = body.as_bytes();
    let mut i = 0;
    let malformed = || SmilesError::MalformedBracket {
        text: body.to_string(),
        offset,
    };

    let isotope_end = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    let isotope = if isotope_end > 0 {
        Some(body[..isotope_end].parse::<u16>().map_err(|_| malformed())?)
    } else {
        None
    };
    i += isotope_end;

    // Symbol: prefer the two-letter reading when it names an element.
    let (element, aromatic, len) = match bytes.get(i) {
        Some(b) if b.is_ascii_uppercase() || *b == b'*' => {
            let two = body.get(i..i + 2).and_then(|s| {
                let second = s.as_bytes()[1];
                if second.is_ascii_lowercase() {
                    element::by_symbol(s)
                } else {
                    None
                }
            });
            match two {
                Some(e) => (e, false, 2),
                None => {
                    let one = &body[i..i + 1];
                    let e = element::by_symbol(one).ok_or_else(|| SmilesError::UnknownElement {
                        symbol: one.to_string(),
                        offset,
                    })?;
                    (e, false, 1)
                }
            }
        }
        Some(b) if b.is_ascii_lowercase() => {
            match body.get(i..i + 2).and_then(element::aromatic) {
                Some(e) => (e, true, 2),
                None => {
                    let one = body.get(i..i + 1).ok_or_else(malformed)?;
                    let e = element::aromatic(one).ok_or_else(|| SmilesError::UnknownElement {
                        symbol: one.to_string(),
                        offset,
                    })?;
                    (e, true, 1)
                }
            }
        }
        _ => return Err(malformed()),
    };
    i += len;

    let mut chirality = Chirality::Unspecified;
    if bytes.get(i) == Some(&b'@') {
        i += 1;
        chirality = Chirality::CounterClockwise;
        if bytes.get(i) == Some(&b'@') {
            i += 1;
            chirality = Chirality::Clockwise;
        }
    }

    let mut hydrogens = Some(0);
    if bytes.get(i) == Some(&b'H') {
        i += 1;
        let count = match bytes.get(i) {
            Some(d) if d.is_ascii_digit() => {
                i += 1;
                d - b'0'
            }
            _ => 1,
        };
        hydrogens = Some(count);
    }

    let mut charge: i8 = 0;
    if let Some(&sign @ (b'+' | b'-')) = bytes.get(i) {
        i += 1;
        let unit: i8 = if sign == b'+' { 1 } else { -1 };
        let digits = bytes[i..].iter().take_while(|b| b.is_ascii_digit()).count();
        if digits > 0 {
            let magnitude: i8 = body[i..i + digits].parse().map_err(|_| malformed())?;
            charge = unit * magnitude;
            i += digits;
        } else {
            charge = unit;
            while bytes.get(i) == Some(&sign) {
                charge = charge.checked_add(unit).ok_or_else(malformed)?;
                i += 1;
            }
        }
    }

    if bytes.get(i) == Some(&b':') {
        i += 1;
        let digits = bytes[i..].iter().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 {
            return Err(malformed());
        }
        i += digits;
    }

    if i != bytes.len() {
        return Err(malformed());
    }

    Ok(AtomSpec {
        element,
        aromatic,
        bracket: true,
        isotope,
        chirality,
        hydrogens,
        charge,
    })
}
