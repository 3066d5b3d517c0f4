//! SPF record assembly and serialization.

use std::fmt;

use super::term::{ModifierKind, Term};

/// The SPF version tag every record opens with.
pub(crate) const VERSION_TAG: &str = "v=spf1";

/// Failures from record assembly. Parsing is atomic: one bad token fails
/// the whole record and no partial record is produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpfParseError {
    #[error("record does not start with 'v=spf1' and a separator")]
    MissingVersion,
    #[error("unparseable term: {0}")]
    InvalidTerm(String),
}

/// Parsed instance of the textual representation of an SPF record
/// (RFC 7208 Section 3).
///
/// Term order is significant: it is both evaluation order and
/// serialization order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpfRecord {
    pub terms: Vec<Term>,
    /// The text this record was parsed from.
    pub raw: String,
}

impl SpfRecord {
    /// Parse an SPF TXT record.
    ///
    /// The text must begin with the literal `v=spf1` followed by a
    /// whitespace separator, so a bare `v=spf1` carrying no terms is
    /// rejected.
    pub fn parse(text: &str) -> Result<Self, SpfParseError> {
        let rest = text
            .strip_prefix(VERSION_TAG)
            .ok_or(SpfParseError::MissingVersion)?;
        if !rest.starts_with(|c: char| c.is_whitespace()) {
            return Err(SpfParseError::MissingVersion);
        }

        let mut terms = Vec::new();
        for token in rest.split_whitespace() {
            match Term::parse(token) {
                Some(term) => terms.push(term),
                None => return Err(SpfParseError::InvalidTerm(token.to_string())),
            }
        }

        Ok(SpfRecord {
            terms,
            raw: text.to_string(),
        })
    }
}

impl fmt::Display for SpfRecord {
    /// Canonical text: the version tag, then each term separated by a
    /// single space. Modifiers of unknown type are dropped (documented
    /// lossy behavior); mechanisms are always written.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(VERSION_TAG)?;
        for term in &self.terms {
            if let Term::Modifier(m) = term {
                if m.kind == ModifierKind::Unknown {
                    continue;
                }
            }
            write!(f, " {term}")?;
        }
        Ok(())
    }
}
