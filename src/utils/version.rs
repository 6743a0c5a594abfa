use serde::Serialize;

/// Build information printed by `gcp-kafka-auth version`.
#[derive(Debug, Serialize)]
pub struct VersionInfo {
    pub version: &'static str,
    pub os: &'static str,
    pub arch: &'static str,
    pub sha: &'static str,
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            sha: option_env!("GIT_SHA").unwrap_or("unknown"),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
