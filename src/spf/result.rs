//! Analysis output: aggregated errors and resource counts.

use super::record::SpfRecord;
use super::term::Qualifier;
use super::{MAX_DNS_LOOKUPS, MAX_VOID_LOOKUPS};

/// Classification of a collected error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// One recoverable condition met during analysis. Collected into the
/// result, never raised as a fault; the traversal continues with a zero
/// contribution from the affected branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    /// Short symbolic code, e.g. `DNS_LOOKUP_FAILED`.
    pub code: &'static str,
    pub message: String,
    pub severity: Severity,
    /// Index of the term that caused the error, when known.
    pub term_index: Option<usize>,
    /// The raw term or record text involved, when known.
    pub term_value: Option<String>,
}

impl ErrorDetail {
    /// An Error-severity detail with no term attribution.
    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            severity: Severity::Error,
            term_index: None,
            term_value: None,
        }
    }

    pub fn with_term_index(mut self, index: usize) -> Self {
        self.term_index = Some(index);
        self
    }

    pub fn with_term_value(mut self, value: impl Into<String>) -> Self {
        self.term_value = Some(value.into());
        self
    }
}

/// Outcome of one [`SpfAnalyser::analyse`](super::SpfAnalyser::analyse)
/// call. Built incrementally during the call and frozen at return.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// Canonical serialization of the analysed record.
    pub record_text: String,
    pub record: SpfRecord,
    /// True iff no Error-severity entry was collected.
    pub record_is_valid: bool,
    /// Qualifier of the first top-level `all` mechanism; `Pass` when the
    /// record has none.
    pub failure_mode: Qualifier,
    pub dns_lookup_count: u32,
    pub void_lookup_count: u32,
    /// Every collected error, in the order it was encountered.
    pub errors: Vec<ErrorDetail>,
}

impl AnalysisResult {
    /// RFC 7208 caps lookup-consuming terms at 10; a count of exactly 10
    /// is already non-compliant.
    pub fn dns_lookups_below_limit(&self) -> bool {
        self.dns_lookup_count < MAX_DNS_LOOKUPS
    }

    /// RFC 7208 tolerates at most 2 void lookups; a count of exactly 2 is
    /// already non-compliant.
    pub fn void_lookups_below_limit(&self) -> bool {
        self.void_lookup_count < MAX_VOID_LOOKUPS
    }
}
