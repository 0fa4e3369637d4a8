//! Minimal RDF term type used by the evaluation pipeline
//!
//! The full term/node system (language-tag normalization, datatype
//! promotion, value-space comparison) lives outside this crate; the engine
//! only needs structural equality for join keys and a total ordering for
//! ORDER BY. Join-key equality is deliberately *structural*: two
//! syntactically different literals never unify even if numerically equal.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

/// An RDF term: IRI, blank node, or literal
///
/// Cheap to clone (`Arc`-backed strings). Equality and hashing are
/// structural over (lexical form, datatype, language tag).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Term {
    /// IRI reference
    Iri(Arc<str>),
    /// Blank node with its label
    BlankNode(Arc<str>),
    /// Typed literal, optionally language-tagged
    Literal {
        lexical: Arc<str>,
        datatype: Arc<str>,
        lang: Option<Arc<str>>,
    },
}

impl Term {
    pub fn iri(value: impl Into<Arc<str>>) -> Self {
        Term::Iri(value.into())
    }

    pub fn blank(label: impl Into<Arc<str>>) -> Self {
        Term::BlankNode(label.into())
    }

    pub fn literal(lexical: impl Into<Arc<str>>, datatype: impl Into<Arc<str>>) -> Self {
        Term::Literal {
            lexical: lexical.into(),
            datatype: datatype.into(),
            lang: None,
        }
    }

    pub fn string(value: impl Into<Arc<str>>) -> Self {
        Term::literal(value, XSD_STRING)
    }

    pub fn lang_string(value: impl Into<Arc<str>>, lang: impl Into<Arc<str>>) -> Self {
        Term::Literal {
            lexical: value.into(),
            datatype: Arc::from(RDF_LANG_STRING),
            lang: Some(lang.into()),
        }
    }

    pub fn integer(value: i64) -> Self {
        Term::literal(value.to_string(), XSD_INTEGER)
    }

    pub fn double(value: f64) -> Self {
        Term::literal(value.to_string(), XSD_DOUBLE)
    }

    pub fn boolean(value: bool) -> Self {
        Term::literal(if value { "true" } else { "false" }, XSD_BOOLEAN)
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal { .. })
    }

    /// Numeric interpretation of a literal, if it has a numeric datatype
    /// and a parseable lexical form.
    pub fn numeric(&self) -> Option<Numeric> {
        match self {
            Term::Literal {
                lexical, datatype, ..
            } => match datatype.as_ref() {
                XSD_INTEGER => lexical.parse::<i64>().ok().map(Numeric::Int),
                XSD_DECIMAL | XSD_DOUBLE => lexical.parse::<f64>().ok().map(Numeric::Double),
                _ => None,
            },
            _ => None,
        }
    }

    /// SPARQL effective boolean value, where defined.
    ///
    /// Returns `None` for terms with no EBV (IRIs, blank nodes, unparseable
    /// booleans/numerics) - callers treat that as a type error.
    pub fn effective_boolean(&self) -> Option<bool> {
        match self {
            Term::Literal {
                lexical, datatype, ..
            } => match datatype.as_ref() {
                XSD_BOOLEAN => match lexical.as_ref() {
                    "true" | "1" => Some(true),
                    "false" | "0" => Some(false),
                    _ => None,
                },
                XSD_STRING | RDF_LANG_STRING => Some(!lexical.is_empty()),
                XSD_INTEGER | XSD_DECIMAL | XSD_DOUBLE => {
                    self.numeric().map(|n| match n {
                        Numeric::Int(i) => i != 0,
                        Numeric::Double(d) => d != 0.0 && !d.is_nan(),
                    })
                }
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{iri}>"),
            Term::BlankNode(label) => write!(f, "_:{label}"),
            Term::Literal {
                lexical,
                datatype,
                lang,
            } => match lang {
                Some(lang) => write!(f, "\"{lexical}\"@{lang}"),
                None => write!(f, "\"{lexical}\"^^<{datatype}>"),
            },
        }
    }
}

/// Numeric value extracted from a literal for aggregate arithmetic
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Numeric {
    Int(i64),
    Double(f64),
}

impl Numeric {
    pub fn add(self, other: Numeric) -> Numeric {
        match (self, other) {
            (Numeric::Int(a), Numeric::Int(b)) => match a.checked_add(b) {
                Some(sum) => Numeric::Int(sum),
                // i64 overflow promotes to double rather than wrapping
                None => Numeric::Double(a as f64 + b as f64),
            },
            (a, b) => Numeric::Double(a.as_f64() + b.as_f64()),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Numeric::Int(i) => i as f64,
            Numeric::Double(d) => d,
        }
    }

    pub fn into_term(self) -> Term {
        match self {
            Numeric::Int(i) => Term::integer(i),
            Numeric::Double(d) => Term::double(d),
        }
    }
}

/// Default total ordering over terms for ORDER BY
///
/// Type-class ordering first (blank nodes < IRIs < literals), then within a
/// class:
/// - blank nodes and IRIs order by their string form
/// - numeric literals order by value (integer/double comparable; NaN last)
/// - other literals order by (lexical, datatype, lang)
///
/// Unbound ranks below everything; that case is handled by the caller
/// ([`crate::sort`]), which compares `Option<Term>` keys.
pub fn compare_terms(a: &Term, b: &Term) -> Ordering {
    match (a, b) {
        (Term::BlankNode(a), Term::BlankNode(b)) => a.cmp(b),
        (Term::BlankNode(_), _) => Ordering::Less,
        (_, Term::BlankNode(_)) => Ordering::Greater,

        (Term::Iri(a), Term::Iri(b)) => a.cmp(b),
        (Term::Iri(_), _) => Ordering::Less,
        (_, Term::Iri(_)) => Ordering::Greater,

        (
            Term::Literal {
                lexical: la,
                datatype: da,
                lang: ga,
            },
            Term::Literal {
                lexical: lb,
                datatype: db,
                lang: gb,
            },
        ) => match (a.numeric(), b.numeric()) {
            (Some(na), Some(nb)) => compare_numeric(na, nb),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => la.cmp(lb).then_with(|| da.cmp(db)).then_with(|| ga.cmp(gb)),
        },
    }
}

fn compare_numeric(a: Numeric, b: Numeric) -> Ordering {
    if let (Numeric::Int(a), Numeric::Int(b)) = (a, b) {
        return a.cmp(&b);
    }
    let (a, b) = (a.as_f64(), b.as_f64());
    // NaN sorts last
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}
