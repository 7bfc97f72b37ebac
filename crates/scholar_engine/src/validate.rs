use std::sync::{Arc, LazyLock};
use std::time::Duration;

use engine_logging::{engine_debug, engine_trace};
use regex::Regex;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// The one format rule: dot-separated atoms, `@`, dot-separated labels, alphabetic TLD.
static EMAIL_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9_%+-]+(?:\.[A-Za-z0-9_%+-]+)*@(?:[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?\.)+[A-Za-z]{2,}$",
    )
    .expect("valid email format pattern")
});

/// Role and robot mailboxes; matched case-insensitively as substrings of the address.
pub const EXCLUDED_PATTERNS: &[&str] = &[
    "noreply",
    "no-reply",
    "donotreply",
    "support@",
    "admin@",
    "info@",
    "webmaster@",
];

/// Synchronous checks that decide whether a candidate is emitted at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmailValidator;

impl EmailValidator {
    pub fn validate_format(&self, email: &str) -> bool {
        EMAIL_FORMAT.is_match(email)
    }

    pub fn is_excluded(&self, email: &str) -> bool {
        let lowered = email.to_ascii_lowercase();
        EXCLUDED_PATTERNS
            .iter()
            .any(|pattern| lowered.contains(pattern))
    }

    pub fn accepts(&self, email: &str) -> bool {
        self.validate_format(email) && !self.is_excluded(email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainCheckError {
    #[error("address has no domain part")]
    NoDomain,
    #[error("mx lookup timed out")]
    Timeout,
    #[error("mx lookup failed: {0}")]
    Resolve(String),
}

/// Source of mail-exchange records.
#[async_trait::async_trait]
pub trait MxResolver: Send + Sync {
    async fn mx_records(&self, domain: &str) -> Result<Vec<String>, DomainCheckError>;
}

pub struct DnsMxResolver {
    resolver: TokioAsyncResolver,
}

impl DnsMxResolver {
    /// Resolver on the default upstream configuration with a single attempt per query.
    pub fn new(timeout: Duration) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 1;
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), opts),
        }
    }
}

#[async_trait::async_trait]
impl MxResolver for DnsMxResolver {
    async fn mx_records(&self, domain: &str) -> Result<Vec<String>, DomainCheckError> {
        let lookup = self
            .resolver
            .mx_lookup(domain)
            .await
            .map_err(|err| DomainCheckError::Resolve(err.to_string()))?;
        Ok(lookup
            .iter()
            .map(|mx| mx.exchange().to_utf8())
            .collect())
    }
}

/// Advisory MX check. Never fails: every error reads as "not verified".
#[derive(Clone)]
pub struct DomainValidator {
    resolver: Arc<dyn MxResolver>,
    timeout: Duration,
}

impl DomainValidator {
    pub fn new(resolver: Arc<dyn MxResolver>, timeout: Duration) -> Self {
        Self { resolver, timeout }
    }

    pub async fn validate_domain(&self, email: &str) -> bool {
        match self.check(email).await {
            Ok(verified) => verified,
            Err(err) => {
                engine_debug!("domain check for {} degraded to unverified: {}", email, err);
                false
            }
        }
    }

    /// `Ok(true)` iff the domain publishes at least one MX record.
    pub async fn check(&self, email: &str) -> Result<bool, DomainCheckError> {
        let domain = email_domain(email).ok_or(DomainCheckError::NoDomain)?;
        let records = tokio::time::timeout(self.timeout, self.resolver.mx_records(domain))
            .await
            .map_err(|_| DomainCheckError::Timeout)??;
        engine_trace!("{} mx records for {}", records.len(), domain);
        Ok(!records.is_empty())
    }
}

/// Domain part of an address, if it has a non-empty one.
pub fn email_domain(email: &str) -> Option<&str> {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim())
        .filter(|domain| !domain.is_empty())
}
