use tracing::warn;
use url::{Host, Url};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Reasons an outbound target is rejected before any network call is made.
#[derive(Debug, thiserror::Error)]
pub enum UnsafeTargetError {
    #[error("invalid url: {0}")]
    Invalid(String),

    #[error("scheme `{0}` is not allowed – only https targets are permitted")]
    SchemeNotAllowed(String),

    #[error("target `{0}` is a loopback address")]
    Loopback(String),

    #[error("target `{0}` is in a private address range")]
    PrivateRange(String),

    #[error("target `{0}` is in a link-local or metadata range")]
    LinkLocal(String),

    #[error("host `{0}` is not on the domain allow-list")]
    NotAllowListed(String),
}

// ---------------------------------------------------------------------------
// UrlGuard
// ---------------------------------------------------------------------------

/// Validates user-supplied URLs before they are used as outbound targets.
///
/// Pure parse + classification: no DNS resolution, no I/O. Rules are
/// applied in order: scheme first, then loopback, private, link-local and
/// metadata ranges, then the optional domain allow-list.
#[derive(Debug, Clone, Default)]
pub struct UrlGuard {
    allow_local: bool,
    allowed_domains: Vec<String>,
}

impl UrlGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Permit loopback targets (local development only).
    pub fn with_allow_local(mut self, allow_local: bool) -> Self {
        self.allow_local = allow_local;
        self
    }

    /// Restrict hostnames to an allow-list. Empty = any public host.
    pub fn with_allowed_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_domains = domains;
        self
    }

    /// Validate `target`, rejecting anything that could reach internal
    /// infrastructure.
    pub fn validate(&self, target: &str) -> Result<(), UnsafeTargetError> {
        let url = Url::parse(target).map_err(|e| UnsafeTargetError::Invalid(e.to_string()))?;

        if url.scheme() != "https" {
            self.reject(target, UnsafeTargetError::SchemeNotAllowed(url.scheme().into()))?;
        }

        let host = url
            .host()
            .ok_or_else(|| UnsafeTargetError::Invalid(format!("`{target}` has no host")))?;

        match host {
            Host::Ipv4(addr) => {
                let o = addr.octets();
                if o[0] == 127 {
                    if !self.allow_local {
                        self.reject(target, UnsafeTargetError::Loopback(addr.to_string()))?;
                    }
                } else if o[0] == 10
                    || (o[0] == 172 && (16..=31).contains(&o[1]))
                    || (o[0] == 192 && o[1] == 168)
                {
                    self.reject(target, UnsafeTargetError::PrivateRange(addr.to_string()))?;
                } else if o[0] == 169 && o[1] == 254 {
                    self.reject(target, UnsafeTargetError::LinkLocal(addr.to_string()))?;
                }
            }
            Host::Ipv6(addr) => {
                let seg = addr.segments();
                if addr.is_loopback() {
                    if !self.allow_local {
                        self.reject(target, UnsafeTargetError::Loopback(addr.to_string()))?;
                    }
                } else if (seg[0] & 0xfe00) == 0xfc00 {
                    // fc00::/7 unique-local
                    self.reject(target, UnsafeTargetError::PrivateRange(addr.to_string()))?;
                } else if (seg[0] & 0xffc0) == 0xfe80 {
                    // fe80::/10 link-local
                    self.reject(target, UnsafeTargetError::LinkLocal(addr.to_string()))?;
                }
            }
            Host::Domain(domain) => {
                let domain = domain.to_ascii_lowercase();
                if domain == "localhost" || domain.ends_with(".localhost") {
                    if !self.allow_local {
                        self.reject(target, UnsafeTargetError::Loopback(domain))?;
                    }
                } else if !self.allowed_domains.is_empty()
                    && !self
                        .allowed_domains
                        .iter()
                        .any(|allowed| allowed.eq_ignore_ascii_case(&domain))
                {
                    self.reject(target, UnsafeTargetError::NotAllowListed(domain))?;
                }
            }
        }

        Ok(())
    }

    fn reject(&self, target: &str, err: UnsafeTargetError) -> Result<(), UnsafeTargetError> {
        warn!(target, reason = %err, "rejected unsafe outbound target");
        Err(err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_https_target_is_valid() {
        let guard = UrlGuard::new();
        assert!(guard.validate("https://example.com").is_ok());
        assert!(guard.validate("https://api.lodge.social/healthz").is_ok());
    }

    #[test]
    fn http_scheme_rejected() {
        let err = UrlGuard::new().validate("http://example.com").unwrap_err();
        assert!(matches!(err, UnsafeTargetError::SchemeNotAllowed(_)));
    }

    #[test]
    fn loopback_rejected_unless_allowed() {
        let guard = UrlGuard::new();
        assert!(matches!(
            guard.validate("https://127.0.0.1"),
            Err(UnsafeTargetError::Loopback(_))
        ));
        assert!(matches!(
            guard.validate("https://127.8.9.10"),
            Err(UnsafeTargetError::Loopback(_))
        ));
        assert!(matches!(
            guard.validate("https://localhost:8443"),
            Err(UnsafeTargetError::Loopback(_))
        ));

        let local = UrlGuard::new().with_allow_local(true);
        assert!(local.validate("https://127.0.0.1").is_ok());
        assert!(local.validate("https://localhost:8443").is_ok());
    }

    #[test]
    fn private_ranges_rejected() {
        let guard = UrlGuard::new();
        for target in [
            "https://10.1.2.3",
            "https://172.16.0.1",
            "https://172.31.255.255",
            "https://192.168.1.1",
        ] {
            assert!(
                matches!(guard.validate(target), Err(UnsafeTargetError::PrivateRange(_))),
                "{target} should be rejected as private"
            );
        }
        // 172.32.x is outside 172.16/12
        assert!(guard.validate("https://172.32.0.1").is_ok());
    }

    #[test]
    fn metadata_range_rejected_even_with_allow_local() {
        let guard = UrlGuard::new().with_allow_local(true);
        assert!(matches!(
            guard.validate("https://169.254.169.254"),
            Err(UnsafeTargetError::LinkLocal(_))
        ));
    }

    #[test]
    fn ipv6_loopback_and_local_ranges_rejected() {
        let guard = UrlGuard::new();
        assert!(matches!(
            guard.validate("https://[::1]"),
            Err(UnsafeTargetError::Loopback(_))
        ));
        assert!(matches!(
            guard.validate("https://[fd00::1]"),
            Err(UnsafeTargetError::PrivateRange(_))
        ));
        assert!(matches!(
            guard.validate("https://[fe80::1]"),
            Err(UnsafeTargetError::LinkLocal(_))
        ));
    }

    #[test]
    fn allow_list_restricts_domains() {
        let guard = UrlGuard::new().with_allowed_domains(vec!["api.lodge.social".into()]);
        assert!(guard.validate("https://api.lodge.social/health").is_ok());
        assert!(matches!(
            guard.validate("https://evil.example.com"),
            Err(UnsafeTargetError::NotAllowListed(_))
        ));
    }

    #[test]
    fn malformed_urls_rejected() {
        let guard = UrlGuard::new();
        assert!(matches!(
            guard.validate("not a url"),
            Err(UnsafeTargetError::Invalid(_))
        ));
    }
}
