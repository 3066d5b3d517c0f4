//! SPF record analysis (RFC 7208): term grammar, record model, and the
//! resource-limit analyser.

mod analyser;
mod record;
mod result;
mod term;

pub use analyser::{determine_failure_mode, validate_structure, SpfAnalyser, StructuralCheck};
pub use record::{SpfParseError, SpfRecord};
pub use result::{AnalysisResult, ErrorDetail, Severity};
pub use term::{Mechanism, MechanismKind, Modifier, ModifierKind, Qualifier, Term};

use thiserror::Error;

use crate::common::dns::DnsError;

/// Hard limit on lookup-consuming terms per evaluation (RFC 7208
/// Section 4.6.4).
pub const MAX_DNS_LOOKUPS: u32 = 10;
/// Limit on lookups that return no usable answer (RFC 7208 Section 4.6.4).
pub const MAX_VOID_LOOKUPS: u32 = 2;

/// Failures that prevent an analysis from producing a result at all.
/// Everything recoverable is collected into [`AnalysisResult::errors`]
/// instead.
#[derive(Debug, Error)]
pub enum SpfError {
    #[error("DNS error: {0}")]
    Dns(#[from] DnsError),
    #[error("no SPF record found for {0}")]
    NoRecord(String),
    #[error(transparent)]
    Parse(#[from] SpfParseError),
}
