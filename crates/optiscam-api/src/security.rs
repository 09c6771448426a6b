//! Security utilities for input validation and sanitization.
//!
//! This module provides:
//! - Remote video URL validation (SSRF protection)
//! - Form text sanitization

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;
use url::{Host, Url};

/// Maximum URL length to prevent DoS attacks.
const MAX_URL_LENGTH: usize = 2048;

/// Maximum description length.
pub const MAX_DESCRIPTION_LENGTH: usize = 5000;

/// Maximum title length.
pub const MAX_TITLE_LENGTH: usize = 500;

/// Video platforms yt-dlp is allowed to fetch from.
static ALLOWED_DOMAINS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    HashSet::from([
        // YouTube
        "youtube.com",
        "www.youtube.com",
        "youtu.be",
        "m.youtube.com",
        // Vimeo
        "vimeo.com",
        "www.vimeo.com",
        "player.vimeo.com",
        // Dailymotion
        "dailymotion.com",
        "www.dailymotion.com",
        // TikTok
        "tiktok.com",
        "www.tiktok.com",
        "vm.tiktok.com",
        // Twitter/X
        "twitter.com",
        "www.twitter.com",
        "x.com",
        "www.x.com",
        // Instagram
        "instagram.com",
        "www.instagram.com",
        // Facebook
        "facebook.com",
        "www.facebook.com",
        "fb.watch",
        // Twitch
        "twitch.tv",
        "www.twitch.tv",
        "clips.twitch.tv",
        // Streamable
        "streamable.com",
        "www.streamable.com",
    ])
});

/// Host names that resolve to internal services.
static BLOCKED_HOSTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^localhost$",
        r"\.localhost$",
        r"^metadata\.",
        r"\.internal$",
        r"\.local$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid blocked-host pattern"))
    .collect()
});

/// Result of URL validation.
#[derive(Debug)]
pub enum UrlValidationResult {
    /// URL is valid and allowed.
    Valid(String),
    /// URL is malformed or uses an unsupported protocol.
    Invalid(String),
    /// URL domain is not in the allow-list.
    DomainNotAllowed(String),
    /// URL targets an internal address.
    Blocked(String),
    /// URL exceeds maximum length.
    TooLong,
}

impl UrlValidationResult {
    /// Convert to Result for easy error handling.
    pub fn into_result(self) -> Result<String, String> {
        match self {
            Self::Valid(url) => Ok(url),
            Self::Invalid(msg) => Err(msg),
            Self::DomainNotAllowed(domain) => Err(format!(
                "Domain '{}' is not allowed. Please use a supported video platform (YouTube, Vimeo, TikTok, etc.)",
                domain
            )),
            Self::Blocked(reason) => Err(reason),
            Self::TooLong => Err(format!("URL exceeds maximum length of {} characters", MAX_URL_LENGTH)),
        }
    }
}

/// Validate a remote video URL.
///
/// Only http/https is accepted, internal addresses and metadata hosts are
/// rejected, and the host must be on the platform allow-list.
pub fn validate_video_url(url: &str) -> UrlValidationResult {
    if url.len() > MAX_URL_LENGTH {
        return UrlValidationResult::TooLong;
    }

    let url = url.trim();
    if url.is_empty() {
        return UrlValidationResult::Invalid("URL cannot be empty".to_string());
    }

    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(e) => return UrlValidationResult::Invalid(format!("Invalid URL format: {}", e)),
    };

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return UrlValidationResult::Invalid(format!(
                "Invalid protocol '{}'. Only HTTP and HTTPS are allowed.",
                scheme
            ))
        }
    }

    let domain = match parsed.host() {
        Some(Host::Domain(d)) => d.to_lowercase(),
        Some(Host::Ipv4(ip)) => return blocked_or_not_allowed(url, IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => return blocked_or_not_allowed(url, IpAddr::V6(ip)),
        None => return UrlValidationResult::Invalid("URL must have a valid domain".to_string()),
    };

    if BLOCKED_HOSTS.iter().any(|p| p.is_match(&domain)) {
        warn!(url = %url, "Blocked internal host");
        return UrlValidationResult::Blocked(
            "URL appears to target an internal or restricted endpoint".to_string(),
        );
    }

    if !is_domain_allowed(&domain) {
        return UrlValidationResult::DomainNotAllowed(domain);
    }

    UrlValidationResult::Valid(url.to_string())
}

/// Literal IP hosts are never on the allow-list; internal ones are
/// reported as blocked.
fn blocked_or_not_allowed(url: &str, ip: IpAddr) -> UrlValidationResult {
    if is_internal_ip(ip) {
        warn!(url = %url, "Blocked internal address");
        UrlValidationResult::Blocked("URL appears to target an internal or restricted endpoint".to_string())
    } else {
        UrlValidationResult::DomainNotAllowed(ip.to_string())
    }
}

fn is_internal_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_internal_v4(v4),
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_internal_v4(v4);
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00 // unique local
                || (first & 0xffc0) == 0xfe80 // link local
        }
    }
}

fn is_internal_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified() || ip.is_broadcast()
}

/// Check if a domain or its registrable parent is allow-listed.
fn is_domain_allowed(domain: &str) -> bool {
    if ALLOWED_DOMAINS.contains(domain) {
        return true;
    }

    // Allow "music.youtube.com" because "youtube.com" is allowed
    let parts: Vec<&str> = domain.split('.').collect();
    if parts.len() >= 2 {
        let parent = format!("{}.{}", parts[parts.len() - 2], parts[parts.len() - 1]);
        if ALLOWED_DOMAINS.contains(parent.as_str()) {
            return true;
        }
    }

    false
}

/// Strip control characters and cap the length of free text.
pub fn sanitize_string(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .take(MAX_DESCRIPTION_LENGTH)
        .collect()
}

/// Trim and cap a title.
pub fn sanitize_title(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_TITLE_LENGTH)
        .collect()
}
