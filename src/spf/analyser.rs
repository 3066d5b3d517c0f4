//! The SPF analysis engine: structural validation, recursive DNS-lookup
//! counting, void-lookup counting, and failure-mode resolution.
//!
//! Every recoverable condition lands in the error sink and contributes 0
//! to whichever count was being computed; the traversal always continues
//! with the remaining sibling terms.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::common::dns::{DnsError, DnsResolver};
use crate::common::domain::normalize;

use super::record::{SpfParseError, SpfRecord, VERSION_TAG};
use super::result::{AnalysisResult, ErrorDetail, Severity};
use super::term::{MechanismKind, ModifierKind, Qualifier, Term};
use super::SpfError;

/// A structural rule over a parsed record. Rules append to the error sink
/// and never abort the run.
pub type StructuralCheck = fn(&SpfRecord, &mut Vec<ErrorDetail>);

/// Ordered, open-ended rule list; extend by appending further checks
/// (ordering of `all`, duplicate modifiers, ...).
const STRUCTURAL_CHECKS: &[StructuralCheck] = &[check_version_tag];

/// E100: the serialized record must start with the `v=spf1` tag. A record
/// that came out of [`SpfRecord::parse`] always satisfies this; the check
/// is the seam future rules plug into.
fn check_version_tag(record: &SpfRecord, errors: &mut Vec<ErrorDetail>) {
    if !is_spf_text(&record.to_string()) {
        errors.push(ErrorDetail::error(
            "E100",
            "SPF record does not start with 'v=spf1'",
        ));
    }
}

/// Run every structural rule, in order.
pub fn validate_structure(record: &SpfRecord, errors: &mut Vec<ErrorDetail>) {
    for check in STRUCTURAL_CHECKS {
        check(record, errors);
    }
}

/// Qualifier of the first top-level `all` mechanism (no recursion). A
/// record with no `all` resolves to `Pass` — the analyser's historical
/// default, kept even though RFC convention reads an absent `all` as an
/// implicit neutral.
pub fn determine_failure_mode(record: &SpfRecord) -> Qualifier {
    record
        .terms
        .iter()
        .find_map(|term| match term {
            Term::Mechanism(m) if m.kind == MechanismKind::All => Some(m.qualifier),
            _ => None,
        })
        .unwrap_or(Qualifier::Pass)
}

/// A TXT string is SPF text when it begins with `v=spf1`,
/// case-insensitively.
fn is_spf_text(txt: &str) -> bool {
    txt.get(..VERSION_TAG.len())
        .is_some_and(|tag| tag.eq_ignore_ascii_case(VERSION_TAG))
}

fn nonblank(host: Option<&str>) -> Option<&str> {
    host.filter(|h| !h.trim().is_empty())
}

/// SPF policy analyser, generic over the resolver.
///
/// Holds no mutable state; one instance may serve concurrent analyses of
/// independent records. The traversal state of a single analysis (visited
/// sets, error sink) is local to that call.
pub struct SpfAnalyser<R: DnsResolver> {
    resolver: R,
}

impl<R: DnsResolver> SpfAnalyser<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    /// Analyse a parsed record: structural validation, both recursive
    /// counting passes, and failure-mode resolution.
    ///
    /// The two counting passes run from independent visited sets, so a
    /// domain visited while counting lookups is visited again while
    /// counting voids. Nothing mutates the input record.
    pub async fn analyse(&self, record: &SpfRecord) -> AnalysisResult {
        let mut errors = Vec::new();

        validate_structure(record, &mut errors);
        let dns_lookup_count = self.count_dns_lookups(record, &mut errors).await;
        let void_lookup_count = self.count_void_lookups(record, &mut errors).await;

        let record_is_valid = !errors.iter().any(|e| e.severity == Severity::Error);

        AnalysisResult {
            record_text: record.to_string(),
            record: record.clone(),
            record_is_valid,
            failure_mode: determine_failure_mode(record),
            dns_lookup_count,
            void_lookup_count,
            errors,
        }
    }

    /// Parse `text` and analyse the result. Unparseable top-level input is
    /// the one fatal outcome in the system — there is nothing to analyse —
    /// and is kept distinct from an [`AnalysisResult`].
    pub async fn analyse_text(&self, text: &str) -> Result<AnalysisResult, SpfParseError> {
        let record = SpfRecord::parse(text)?;
        Ok(self.analyse(&record).await)
    }

    /// Fetch `domain`'s SPF text, parse it, and analyse it.
    pub async fn analyse_domain(&self, domain: &str) -> Result<AnalysisResult, SpfError> {
        let text = self
            .fetch_spf_text(domain)
            .await?
            .ok_or_else(|| SpfError::NoRecord(domain.to_string()))?;
        let record = SpfRecord::parse(&text)?;
        Ok(self.analyse(&record).await)
    }

    /// Count lookup-consuming terms, recursing through `include` targets
    /// and `redirect` modifiers. Each occurrence of `a`, `mx`, `ptr` and
    /// `exists` contributes 1 whether or not a host is given; `include`
    /// and `redirect` contribute 1 plus their nested record's count.
    pub async fn count_dns_lookups(
        &self,
        record: &SpfRecord,
        errors: &mut Vec<ErrorDetail>,
    ) -> u32 {
        let mut visited = HashSet::new();
        self.count_dns_lookups_in(record, errors, &mut visited).await
    }

    async fn count_dns_lookups_in(
        &self,
        record: &SpfRecord,
        errors: &mut Vec<ErrorDetail>,
        visited: &mut HashSet<String>,
    ) -> u32 {
        let mut count = 0;
        for term in &record.terms {
            match term {
                Term::Mechanism(m) => match m.kind {
                    MechanismKind::A
                    | MechanismKind::Mx
                    | MechanismKind::Ptr
                    | MechanismKind::Exists => count += 1,
                    MechanismKind::Include => {
                        count += 1;
                        if let Some(host) = nonblank(m.host.as_deref()) {
                            count += self.process_nested(host, visited, errors).await;
                        }
                    }
                    _ => {}
                },
                Term::Modifier(m) if m.kind == ModifierKind::Redirect => {
                    count += 1;
                    if let Some(host) = nonblank(Some(m.host.as_str())) {
                        count += self.process_nested(host, visited, errors).await;
                    }
                }
                Term::Modifier(_) => {}
            }
        }
        count
    }

    /// Fetch and recurse into `domain`'s record for lookup counting.
    ///
    /// `visited` spans the whole traversal rooted at one
    /// [`count_dns_lookups`](Self::count_dns_lookups) call — not one
    /// branch — and the domain is recorded before the fetch, so a cycle
    /// reached mid-fetch stays guarded.
    async fn process_nested(
        &self,
        domain: &str,
        visited: &mut HashSet<String>,
        errors: &mut Vec<ErrorDetail>,
    ) -> u32 {
        if !visited.insert(normalize(domain)) {
            return 0;
        }

        debug!(domain, "resolving nested SPF record");
        let text = match self.fetch_spf_text(domain).await {
            Ok(Some(text)) => text,
            Ok(None) => return 0,
            Err(e) => {
                warn!(domain, error = %e, "nested SPF fetch failed");
                errors.push(
                    ErrorDetail::error(
                        "DNS_LOOKUP_FAILED",
                        format!("failed to fetch SPF record for '{domain}': {e}"),
                    )
                    .with_term_value(domain),
                );
                return 0;
            }
        };

        match SpfRecord::parse(&text) {
            Ok(nested) => Box::pin(self.count_dns_lookups_in(&nested, errors, visited)).await,
            Err(_) => {
                errors.push(
                    ErrorDetail::error(
                        "SPF_PARSE_FAILED",
                        format!("failed to parse nested SPF record for '{domain}'"),
                    )
                    .with_term_value(text),
                );
                0
            }
        }
    }

    /// Count void lookups: lookup-consuming terms whose query yields no
    /// SPF-tagged answer.
    ///
    /// Void detection deliberately mirrors the record fetch — an SPF TXT
    /// query at the host — even for `a`/`mx`/`ptr`/`exists`, rather than
    /// querying the record type the mechanism names. A resolver fault
    /// counts as void and is additionally recorded as `DNS_LOOKUP_FAILED`;
    /// the count does not distinguish it from a legitimately empty answer.
    pub async fn count_void_lookups(
        &self,
        record: &SpfRecord,
        errors: &mut Vec<ErrorDetail>,
    ) -> u32 {
        let mut visited = HashSet::new();
        self.count_void_lookups_in(record, errors, &mut visited).await
    }

    async fn count_void_lookups_in(
        &self,
        record: &SpfRecord,
        errors: &mut Vec<ErrorDetail>,
        visited: &mut HashSet<String>,
    ) -> u32 {
        let mut count = 0;
        for term in &record.terms {
            match term {
                Term::Mechanism(m) => match m.kind {
                    MechanismKind::A
                    | MechanismKind::Mx
                    | MechanismKind::Ptr
                    | MechanismKind::Exists => {
                        // Only probed when a host is spelled out; these
                        // terms carry no nested record to recurse into.
                        if let Some(host) = nonblank(m.host.as_deref()) {
                            if self.is_void_lookup(host, errors).await {
                                count += 1;
                            }
                        }
                    }
                    MechanismKind::Include => {
                        if let Some(host) = nonblank(m.host.as_deref()) {
                            if self.is_void_lookup(host, errors).await {
                                count += 1;
                            } else {
                                count += self.process_nested_void(host, visited, errors).await;
                            }
                        }
                    }
                    _ => {}
                },
                Term::Modifier(m) if m.kind == ModifierKind::Redirect => {
                    if let Some(host) = nonblank(Some(m.host.as_str())) {
                        if self.is_void_lookup(host, errors).await {
                            count += 1;
                        } else {
                            count += self.process_nested_void(host, visited, errors).await;
                        }
                    }
                }
                Term::Modifier(_) => {}
            }
        }
        count
    }

    /// Does an SPF TXT query at `domain` come back empty?
    async fn is_void_lookup(&self, domain: &str, errors: &mut Vec<ErrorDetail>) -> bool {
        match self.resolver.query_txt(domain).await {
            Ok(records) => !records.iter().any(|txt| is_spf_text(txt)),
            Err(e) => {
                warn!(domain, error = %e, "void probe failed");
                errors.push(
                    ErrorDetail::error(
                        "DNS_LOOKUP_FAILED",
                        format!("DNS lookup for '{domain}' failed: {e}"),
                    )
                    .with_term_value(domain),
                );
                true
            }
        }
    }

    /// Recurse into a non-void `include`/`redirect` target for void
    /// counting. Same cycle guard and error handling as
    /// [`process_nested`](Self::process_nested), against this pass's own
    /// visited set.
    async fn process_nested_void(
        &self,
        domain: &str,
        visited: &mut HashSet<String>,
        errors: &mut Vec<ErrorDetail>,
    ) -> u32 {
        if !visited.insert(normalize(domain)) {
            return 0;
        }

        let text = match self.fetch_spf_text(domain).await {
            Ok(Some(text)) => text,
            Ok(None) => return 0,
            Err(e) => {
                errors.push(
                    ErrorDetail::error(
                        "DNS_LOOKUP_FAILED",
                        format!("failed to fetch SPF record for '{domain}': {e}"),
                    )
                    .with_term_value(domain),
                );
                return 0;
            }
        };

        match SpfRecord::parse(&text) {
            Ok(nested) => Box::pin(self.count_void_lookups_in(&nested, errors, visited)).await,
            Err(_) => {
                errors.push(
                    ErrorDetail::error(
                        "SPF_PARSE_FAILED",
                        format!("failed to parse SPF record for '{domain}'"),
                    )
                    .with_term_value(text),
                );
                0
            }
        }
    }

    /// First `v=spf1`-prefixed TXT string at `domain`, if any. When several
    /// exist — itself a real-world misconfiguration — only the first is
    /// used.
    async fn fetch_spf_text(&self, domain: &str) -> Result<Option<String>, DnsError> {
        let records = self.resolver.query_txt(domain).await?;
        Ok(records.into_iter().find(|txt| is_spf_text(txt)))
    }
}
