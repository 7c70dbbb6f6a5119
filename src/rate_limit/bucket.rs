//! Bucket configuration and client attribution.

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::time::Duration;

use thiserror::Error;

const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Identity used when a request carries no usable origin address.
///
/// Every request counts against some key; a missing header must not bypass the limiter.
pub const FALLBACK_CLIENT_IDENTITY: &str = "127.0.0.1";

/// Longest sub-key kept in a counter key.
const MAX_SUB_KEY_LEN: usize = 64;

/// What to do when the counter store cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Let the request through. Suits forms where availability matters more than abuse risk.
    #[default]
    FailOpen,
    /// Refuse the request.
    FailClosed,
}

/// Errors produced when validating bucket configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BucketError {
    #[error("bucket name must not be empty")]
    EmptyName,
    #[error("quota must be > 0 (got {0})")]
    InvalidQuota(u32),
    #[error("window must be > 0")]
    InvalidWindow,
}

/// Validated quota configuration for one kind of write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitBucket {
    name: String,
    quota: u32,
    window: Duration,
    key_prefix: String,
    on_store_failure: FailurePolicy,
}

impl RateLimitBucket {
    /// Create a bucket with validation. The key prefix defaults to `ratelimit:<name>`.
    pub fn new(name: impl Into<String>, quota: u32, window: Duration) -> Result<Self, BucketError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(BucketError::EmptyName);
        }
        if quota == 0 {
            return Err(BucketError::InvalidQuota(quota));
        }
        if window.is_zero() {
            return Err(BucketError::InvalidWindow);
        }
        Ok(Self::fixed(name, quota, window))
    }

    fn fixed(name: impl Into<String>, quota: u32, window: Duration) -> Self {
        let name = name.into();
        Self {
            key_prefix: format!("ratelimit:{name}"),
            name,
            quota,
            window,
            on_store_failure: FailurePolicy::FailOpen,
        }
    }

    /// Contact form: 5 per hour.
    pub fn contact() -> Self {
        Self::fixed("contact", 5, HOUR)
    }

    /// Newsletter sign-up: 3 per day.
    pub fn newsletter() -> Self {
        Self::fixed("newsletter", 3, DAY)
    }

    /// Any other form: 10 per hour, usually narrowed by a sub-key.
    pub fn general() -> Self {
        Self::fixed("general", 10, HOUR)
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_store_failure = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quota(&self) -> u32 {
        self.quota
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn on_store_failure(&self) -> FailurePolicy {
        self.on_store_failure
    }

    /// Counter key: `prefix:identity[:sub_key]`.
    ///
    /// Sub-keys are reduced to `[A-Za-z0-9_-]` and truncated so callers cannot smuggle
    /// separators into the key space.
    pub fn key(&self, client: &ClientIdentity, sub_key: Option<&str>) -> String {
        match sub_key.map(sanitize_sub_key).filter(|s| !s.is_empty()) {
            Some(sub) => format!("{}:{}:{}", self.key_prefix, client.as_str(), sub),
            None => format!("{}:{}", self.key_prefix, client.as_str()),
        }
    }
}

fn sanitize_sub_key(raw: &str) -> String {
    raw.chars()
        .take(MAX_SUB_KEY_LEN)
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Generic forms accepted under `/forms/{form}` unless configured otherwise.
pub const DEFAULT_GENERAL_FORMS: &[&str] = &["finance", "part-exchange", "test-drive", "valuation"];

/// Process-wide bucket catalogue. Built once at startup and shared by reference.
///
/// Also holds the names of the generic forms sharing the `general` bucket. Each name is
/// counted under its own sub-key, so only listed names are accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buckets {
    contact: RateLimitBucket,
    newsletter: RateLimitBucket,
    general: RateLimitBucket,
    general_forms: BTreeSet<String>,
}

impl Default for Buckets {
    fn default() -> Self {
        Self {
            contact: RateLimitBucket::contact(),
            newsletter: RateLimitBucket::newsletter(),
            general: RateLimitBucket::general(),
            general_forms: DEFAULT_GENERAL_FORMS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Buckets {
    /// Apply one store-failure policy to every bucket.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.contact = self.contact.with_failure_policy(policy);
        self.newsletter = self.newsletter.with_failure_policy(policy);
        self.general = self.general.with_failure_policy(policy);
        self
    }

    /// Replace the set of generic form names. Blank names are skipped.
    pub fn with_general_forms<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.general_forms = names
            .into_iter()
            .map(|name| {
                let name: String = name.into();
                name.trim().to_string()
            })
            .filter(|name| !name.is_empty())
            .collect();
        self
    }

    pub fn contact(&self) -> &RateLimitBucket {
        &self.contact
    }

    pub fn newsletter(&self) -> &RateLimitBucket {
        &self.newsletter
    }

    pub fn general(&self) -> &RateLimitBucket {
        &self.general
    }

    pub fn is_general_form(&self, name: &str) -> bool {
        self.general_forms.contains(name)
    }

    pub fn general_forms(&self) -> impl Iterator<Item = &str> {
        self.general_forms.iter().map(String::as_str)
    }
}

/// Who a request is attributed to for counting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    /// The shared fallback identity.
    pub fn fallback() -> Self {
        Self(FALLBACK_CLIENT_IDENTITY.to_string())
    }

    /// Derive the identity from proxy headers.
    ///
    /// Takes the first address of `X-Forwarded-For`, then `X-Real-IP`, and otherwise the
    /// fixed fallback. Values that are not IP addresses are ignored.
    pub fn from_forwarded(forwarded_for: Option<&str>, real_ip: Option<&str>) -> Self {
        let first_forwarded = forwarded_for.and_then(|v| v.split(',').next());
        [first_forwarded, real_ip]
            .into_iter()
            .flatten()
            .find_map(|candidate| candidate.trim().parse::<IpAddr>().ok())
            .map(|ip| Self(ip.to_string()))
            .unwrap_or_else(Self::fallback)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_buckets_match_published_quotas() {
        let buckets = Buckets::default();
        assert_eq!((buckets.contact().quota(), buckets.contact().window()), (5, HOUR));
        assert_eq!((buckets.newsletter().quota(), buckets.newsletter().window()), (3, DAY));
        assert_eq!((buckets.general().quota(), buckets.general().window()), (10, HOUR));
        assert_eq!(buckets.general().on_store_failure(), FailurePolicy::FailOpen);
    }

    #[test]
    fn new_validates() {
        assert_eq!(RateLimitBucket::new("", 1, HOUR), Err(BucketError::EmptyName));
        assert_eq!(RateLimitBucket::new("x", 0, HOUR), Err(BucketError::InvalidQuota(0)));
        assert_eq!(RateLimitBucket::new("x", 1, Duration::ZERO), Err(BucketError::InvalidWindow));
        let b = RateLimitBucket::new("quote", 2, HOUR).unwrap();
        assert_eq!(b.key_prefix(), "ratelimit:quote");
    }

    #[test]
    fn key_layout() {
        let bucket = RateLimitBucket::general();
        let client = ClientIdentity::new("203.0.113.9");
        assert_eq!(bucket.key(&client, None), "ratelimit:general:203.0.113.9");
        assert_eq!(bucket.key(&client, Some("trade-in")), "ratelimit:general:203.0.113.9:trade-in");
        assert_eq!(bucket.key(&client, Some("a:b/c")), "ratelimit:general:203.0.113.9:a_b_c");
        assert_eq!(bucket.key(&client, Some("")), "ratelimit:general:203.0.113.9");
    }

    #[test]
    fn identity_prefers_first_forwarded_address() {
        let id = ClientIdentity::from_forwarded(Some(" 198.51.100.7 , 10.0.0.1"), Some("10.0.0.2"));
        assert_eq!(id.as_str(), "198.51.100.7");
    }

    #[test]
    fn identity_falls_back_through_real_ip_to_constant() {
        let id = ClientIdentity::from_forwarded(Some("not-an-ip"), Some("2001:db8::1"));
        assert_eq!(id.as_str(), "2001:db8::1");
        assert_eq!(ClientIdentity::from_forwarded(None, None), ClientIdentity::fallback());
        assert_eq!(ClientIdentity::from_forwarded(Some(""), None).as_str(), FALLBACK_CLIENT_IDENTITY);
    }

    #[test]
    fn failure_policy_applies_to_every_bucket() {
        let buckets = Buckets::default().with_failure_policy(FailurePolicy::FailClosed);
        assert_eq!(buckets.contact().on_store_failure(), FailurePolicy::FailClosed);
        assert_eq!(buckets.newsletter().on_store_failure(), FailurePolicy::FailClosed);
        assert_eq!(buckets.general().on_store_failure(), FailurePolicy::FailClosed);
    }

    #[test]
    fn general_forms_are_a_closed_set() {
        let defaults = Buckets::default();
        assert!(defaults.is_general_form("finance"));
        assert!(!defaults.is_general_form("f0"));

        let custom = Buckets::default().with_general_forms(["trade-in", " ", "service "]);
        assert_eq!(custom.general_forms().collect::<Vec<_>>(), vec!["service", "trade-in"]);
        assert!(!custom.is_general_form("finance"));
    }
}
