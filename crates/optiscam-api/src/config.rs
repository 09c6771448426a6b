//! API configuration.

use std::path::PathBuf;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Submission rate limit, requests per second per client IP
    pub rate_limit_rps: u32,
    /// Max request body size, which bounds uploaded videos
    pub max_upload_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Serve `/metrics`
    pub metrics_enabled: bool,
    /// Netscape cookies file handed to yt-dlp
    pub ytdlp_cookies: Option<PathBuf>,
    /// Per-download timeout for remote fetches
    pub download_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            max_upload_size: 500 * 1024 * 1024, // 500MB
            environment: "development".to_string(),
            metrics_enabled: true,
            ytdlp_cookies: None,
            download_timeout_secs: 600,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(d.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(d.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(d.cors_origins),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(d.rate_limit_rps),
            max_upload_size: std::env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(d.max_upload_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(d.environment),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(d.metrics_enabled),
            ytdlp_cookies: std::env::var("YTDLP_COOKIES_PATH")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            download_timeout_secs: std::env::var("DOWNLOAD_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(d.download_timeout_secs),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 8000);
        assert!(config.metrics_enabled);
        assert!(!config.is_production());
    }

    #[test]
    fn test_production_is_case_insensitive() {
        let config = ApiConfig {
            environment: "Production".into(),
            ..ApiConfig::default()
        };
        assert!(config.is_production());
    }
}
