//! The resolver port: the one external collaborator of the analysis
//! engine. The engine only ever consumes TXT answers; transport, retry,
//! and timeout policy belong to the implementation behind the trait.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DnsError {
    #[error("NXDOMAIN: domain does not exist")]
    NxDomain,
    #[error("SERVFAIL: server failure")]
    ServFail,
    #[error("timeout")]
    Timeout,
    #[error("DNS error: {0}")]
    Other(String),
}

/// DNS resolver trait for abstracting TXT lookups.
pub trait DnsResolver: Clone + Send + Sync + 'static {
    fn query_txt(&self, domain: &str)
        -> impl Future<Output = Result<Vec<String>, DnsError>> + Send;
}

/// Hickory DNS resolver implementation.
#[derive(Clone)]
pub struct HickoryResolver {
    resolver: TokioResolver,
}

impl HickoryResolver {
    pub fn new() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let resolver = TokioResolver::builder_with_config(
            ResolverConfig::default(),
            TokioConnectionProvider::default(),
        )
        .build();
        Ok(Self { resolver })
    }

    pub fn with_config(
        config: ResolverConfig,
        opts: ResolverOpts,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let resolver =
            TokioResolver::builder_with_config(config, TokioConnectionProvider::default())
                .with_options(opts)
                .build();
        Ok(Self { resolver })
    }

    fn classify_error(e: &hickory_resolver::ResolveError) -> DnsError {
        let msg = e.to_string().to_lowercase();
        if msg.contains("nxdomain") || msg.contains("no records") {
            DnsError::NxDomain
        } else if msg.contains("timeout") {
            DnsError::Timeout
        } else if msg.contains("servfail") {
            DnsError::ServFail
        } else {
            DnsError::Other(e.to_string())
        }
    }
}

impl Default for HickoryResolver {
    fn default() -> Self {
        Self::new().expect("Failed to create default HickoryResolver")
    }
}

impl DnsResolver for HickoryResolver {
    async fn query_txt(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        match self.resolver.txt_lookup(domain).await {
            Ok(lookup) => {
                let records: Vec<String> = lookup.iter().map(|txt| txt.to_string()).collect();
                Ok(records)
            }
            Err(e) => Err(Self::classify_error(&e)),
        }
    }
}

/// Mock DNS resolver for testing. Unknown domains resolve to an empty
/// record set; failures are injected per domain.
#[derive(Clone, Default)]
pub struct MockResolver {
    txt_records: Arc<Mutex<HashMap<String, Vec<String>>>>,
    txt_errors: Arc<Mutex<HashMap<String, DnsError>>>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_txt(&self, domain: &str, records: Vec<String>) {
        self.txt_records
            .lock()
            .unwrap()
            .insert(domain.to_lowercase(), records);
    }

    pub fn add_txt_err(&self, domain: &str, err: DnsError) {
        self.txt_errors
            .lock()
            .unwrap()
            .insert(domain.to_lowercase(), err);
    }

    pub fn set_nxdomain(&self, domain: &str) {
        self.add_txt_err(domain, DnsError::NxDomain);
    }
}

impl DnsResolver for MockResolver {
    async fn query_txt(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        let domain_lower = domain.to_lowercase();
        if let Some(err) = self.txt_errors.lock().unwrap().get(&domain_lower) {
            return Err(err.clone());
        }
        Ok(self
            .txt_records
            .lock()
            .unwrap()
            .get(&domain_lower)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_resolver_txt() {
        let resolver = MockResolver::new();
        resolver.add_txt("example.com", vec!["v=spf1 -all".to_string()]);

        let result = resolver.query_txt("example.com").await.unwrap();
        assert_eq!(result, vec!["v=spf1 -all"]);
    }

    #[tokio::test]
    async fn mock_resolver_is_case_insensitive() {
        let resolver = MockResolver::new();
        resolver.add_txt("Example.COM", vec!["v=spf1 -all".to_string()]);

        let result = resolver.query_txt("EXAMPLE.com").await.unwrap();
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn mock_resolver_unknown_domain_is_empty() {
        let resolver = MockResolver::new();
        let result = resolver.query_txt("unknown.example.com").await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn mock_resolver_injected_errors() {
        let resolver = MockResolver::new();
        resolver.set_nxdomain("nonexistent.com");
        resolver.add_txt_err("flaky.com", DnsError::Timeout);

        assert_eq!(
            resolver.query_txt("nonexistent.com").await,
            Err(DnsError::NxDomain)
        );
        assert_eq!(resolver.query_txt("flaky.com").await, Err(DnsError::Timeout));
    }
}
