//! The answer-term tagged value tree (spec §3 `Term`, §4.B normalization).

use num_bigint::BigInt;
use std::fmt;

/// A structured value returned by the engine as part of an answer.
///
/// The empty list is always normalized to `List(vec![])`, never
/// `Atom("[]")` — see [`crate::decode::decode_term`].
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Atom(String),
    Integer(BigInt),
    Float(f64),
    String(String),
    List(Vec<Term>),
    Compound { functor: String, args: Vec<Term> },
    Variable(String),
}

impl Term {
    pub fn atom(s: impl Into<String>) -> Term {
        Term::Atom(s.into())
    }

    pub fn integer(n: i64) -> Term {
        Term::Integer(BigInt::from(n))
    }

    pub fn compound(functor: impl Into<String>, args: Vec<Term>) -> Term {
        Term::Compound {
            functor: functor.into(),
            args,
        }
    }

    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Term::Atom(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<&BigInt> {
        match self {
            Term::Integer(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Term::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The text payload of an `Atom` or `String` term — the two shapes
    /// a caller usually wants to treat interchangeably as "some text".
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Term::Atom(s) | Term::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Term]> {
        match self {
            Term::List(items) => Some(items),
            _ => None,
        }
    }

    /// A compound with the given functor and arity, or `None` — including
    /// when `self` is a compound but the functor/arity don't match.
    pub fn as_compound(&self, functor: &str, arity: usize) -> Option<&[Term]> {
        match self {
            Term::Compound { functor: f, args } if f == functor && args.len() == arity => {
                Some(args)
            }
            _ => None,
        }
    }

    pub fn is_empty_list(&self) -> bool {
        matches!(self, Term::List(items) if items.is_empty())
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Atom(a) => write!(f, "{}", quote_atom_if_needed(a)),
            Term::Integer(n) => write!(f, "{n}"),
            Term::Float(x) => write!(f, "{x}"),
            Term::String(s) => write!(f, "{s:?}"),
            Term::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Term::Compound { functor, args } => {
                write!(f, "{}(", quote_atom_if_needed(functor))?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Term::Variable(name) => write!(f, "{name}"),
        }
    }
}

fn quote_atom_if_needed(atom: &str) -> String {
    let needs_quotes = atom.is_empty()
        || !atom.chars().next().unwrap().is_ascii_lowercase()
        || !atom
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    let is_symbolic = !atom.is_empty()
        && atom
            .chars()
            .all(|c| "+-*/\\^<>=~:.?@#&$".contains(c));
    if needs_quotes && !is_symbolic && atom != "[]" && atom != "!" && atom != ";" {
        format!("'{}'", atom.replace('\'', "\\'"))
    } else {
        atom.to_owned()
    }
}
