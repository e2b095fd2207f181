//! SSRF-safe URL validation.
//!
//! A URL is only fetched on a caller's behalf if every address its host
//! resolves to is publicly routable. Operators can relax the policy for
//! internal test environments with the `ALLOW_NON_PUBLIC_IP` flag.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use url::{Host, Url};

/// Classifies target URLs as safe or unsafe to fetch.
pub struct SafeUrlValidator {
    resolver: TokioAsyncResolver,
    allow_non_public_ip: bool,
}

fn is_non_public_v4(ip: &Ipv4Addr) -> bool {
    ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        // 100.64.0.0/10 carrier-grade NAT
        || (ip.octets()[0] == 100 && (ip.octets()[1] & 0b1100_0000) == 64)
        // 198.18.0.0/15 benchmarking
        || (ip.octets()[0] == 198 && (ip.octets()[1] & 0b1111_1110) == 18)
        // 240.0.0.0/4 reserved
        || ip.octets()[0] >= 240
}

fn is_non_public_v6(ip: &Ipv6Addr) -> bool {
    ip.is_loopback()
        || ip.is_unspecified()
        // fc00::/7 unique local
        || (ip.segments()[0] & 0xfe00) == 0xfc00
        // fe80::/10 link local
        || (ip.segments()[0] & 0xffc0) == 0xfe80
        // 2001:db8::/32 documentation
        || (ip.segments()[0] == 0x2001 && ip.segments()[1] == 0xdb8)
}

fn is_non_public(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_non_public_v4(v4),
        IpAddr::V6(v6) => is_non_public_v6(v6),
    }
}

/// Whether the host string looks like a dotted-decimal IP literal.
fn is_numeric_literal(domain: &str) -> bool {
    let stripped = domain.replace('.', "");
    !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit())
}

impl SafeUrlValidator {
    pub fn new(allow_non_public_ip: bool) -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
            allow_non_public_ip,
        }
    }

    /// True iff the URL parses, carries a scheme and host, and every address
    /// the host resolves to passes the public-IP policy.
    pub async fn is_safe_url(&self, url: &str) -> bool {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };
        if parsed.scheme().is_empty() {
            return false;
        }

        match parsed.host() {
            Some(Host::Ipv4(ip)) => self.validate_record(IpAddr::V4(ip), url, ""),
            Some(Host::Ipv6(ip)) => self.validate_record(IpAddr::V6(ip), url, ""),
            Some(Host::Domain(domain)) => self.is_safe_domain(domain).await,
            None => false,
        }
    }

    async fn is_safe_domain(&self, domain: &str) -> bool {
        let v4_records = self.lookup_v4(domain).await;
        let v6_records = self.lookup_v6(domain).await;

        let mut result = self.validate_records(domain, &v4_records, "A")
            && self.validate_records(domain, &v6_records, "AAAA");

        // A dotted-decimal literal is classified directly as well.
        if is_numeric_literal(domain) {
            result = result
                && match domain.parse::<IpAddr>() {
                    Ok(ip) => self.validate_record(ip, domain, ""),
                    Err(_) => {
                        log::info!("'{}' is not valid IP address", domain);
                        false
                    }
                };
        }

        result
    }

    /// Resolver failures yield no records rather than a violation; only
    /// addresses that actually resolve are classified.
    async fn lookup_v4(&self, domain: &str) -> Vec<IpAddr> {
        match self.resolver.ipv4_lookup(domain).await {
            Ok(lookup) => lookup.iter().map(|a| IpAddr::V4(a.0)).collect(),
            Err(e) => {
                log::info!("Cannot get A record for domain {}: {}", domain, e);
                Vec::new()
            }
        }
    }

    async fn lookup_v6(&self, domain: &str) -> Vec<IpAddr> {
        match self.resolver.ipv6_lookup(domain).await {
            Ok(lookup) => lookup.iter().map(|aaaa| IpAddr::V6(aaaa.0)).collect(),
            Err(e) => {
                log::info!("Cannot get AAAA record for domain {}: {}", domain, e);
                Vec::new()
            }
        }
    }

    fn validate_records(&self, domain: &str, records: &[IpAddr], record_type: &str) -> bool {
        records
            .iter()
            .all(|ip| self.validate_record(*ip, domain, record_type))
    }

    fn validate_record(&self, ip: IpAddr, domain: &str, record_type: &str) -> bool {
        if !is_non_public(&ip) {
            return true;
        }

        if self.allow_non_public_ip {
            log::warn!(
                "DNS record type {} for domain name {} resolves to a non public IP address {}, but allowed by config",
                record_type,
                domain,
                ip
            );
            true
        } else {
            log::error!(
                "DNS record type {} for domain name {} resolves to a non public IP address {}",
                record_type,
                domain,
                ip
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_loopback_literal_is_unsafe() {
        let validator = SafeUrlValidator::new(false);
        assert!(!validator.is_safe_url("http://127.0.0.1/data").await);
        assert!(!validator.is_safe_url("http://[::1]/data").await);
    }

    #[tokio::test]
    async fn test_loopback_literal_allowed_by_override() {
        let validator = SafeUrlValidator::new(true);
        assert!(validator.is_safe_url("http://127.0.0.1/data").await);
        assert!(validator.is_safe_url("http://[::1]/data").await);
    }

    #[tokio::test]
    async fn test_private_ranges_are_unsafe() {
        let validator = SafeUrlValidator::new(false);
        assert!(!validator.is_safe_url("http://10.0.0.5/x").await);
        assert!(!validator.is_safe_url("http://192.168.1.1/x").await);
        assert!(!validator.is_safe_url("http://172.16.0.1/x").await);
        assert!(!validator.is_safe_url("http://169.254.1.1/x").await);
        assert!(!validator.is_safe_url("http://[fd00::1]/x").await);
        assert!(!validator.is_safe_url("http://[fe80::1]/x").await);
    }

    #[tokio::test]
    async fn test_malformed_urls_are_unsafe() {
        let validator = SafeUrlValidator::new(false);
        assert!(!validator.is_safe_url("not a url").await);
        assert!(!validator.is_safe_url("").await);
        assert!(!validator.is_safe_url("mailto:someone@example.com").await);
    }

    #[test]
    fn test_numeric_literal_detection() {
        assert!(is_numeric_literal("127.0.0.1"));
        assert!(is_numeric_literal("1234567"));
        assert!(!is_numeric_literal("example.com"));
        assert!(!is_numeric_literal(""));
    }

    #[test]
    fn test_classification_boundaries() {
        assert!(is_non_public(&"192.168.0.1".parse().unwrap()));
        assert!(is_non_public(&"100.64.0.1".parse().unwrap()));
        assert!(is_non_public(&"240.0.0.1".parse().unwrap()));
        assert!(is_non_public(&"198.18.0.1".parse().unwrap()));
        assert!(!is_non_public(&"8.8.8.8".parse().unwrap()));
        assert!(!is_non_public(&"2001:4860:4860::8888".parse().unwrap()));
        assert!(is_non_public(&"2001:db8::1".parse().unwrap()));
    }
}
