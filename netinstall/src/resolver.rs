//! Release resolution: deciding which URL to download the setup from.
//!
//! Three sources are known:
//!
//! ```text
//! primary   GET {version_url}            → { appVer, status: "OK" } → templated asset URL
//! fallback  {mirror_url}[?update=1]      (fixed URL, signed by the orchestrator)
//!           GET {releases_api}/latest    → first asset ending in the platform suffix
//! ```
//!
//! All failures are returned as values; the orchestrator decides whether a
//! failure means "try the next source" or "give up".

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::{InstallerConfig, SourceConfig, VERSION_PLACEHOLDER};
use crate::error::{InstallError, InstallResult};
use crate::http::{HttpClient, ReqwestClient};

/// Where a resolved URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOrigin {
    /// Templated from the version-info endpoint.
    VersionEndpoint,
    /// The authenticated distribution mirror.
    Mirror,
    /// Picked from the public release listing.
    ReleaseListing,
}

impl SourceOrigin {
    /// Whether requests to this source must carry auth headers.
    pub fn requires_auth(&self) -> bool {
        matches!(self, Self::Mirror)
    }
}

/// A download URL and its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub url: String,
    pub origin: SourceOrigin,
}

impl ResolvedSource {
    pub fn new(url: impl Into<String>, origin: SourceOrigin) -> Self {
        Self {
            url: url.into(),
            origin,
        }
    }
}

/// Determines download URLs.
pub trait SourceResolver: Send + Sync {
    /// Resolve the primary (unauthenticated) source.
    fn resolve_primary(&self) -> InstallResult<ResolvedSource>;

    /// Resolve the backup source used after the primary failed.
    ///
    /// There is a single fallback: the mirror when one is configured,
    /// otherwise the release listing.
    fn resolve_fallback(&self) -> InstallResult<ResolvedSource>;
}

/// Payload of the version-info endpoint.
#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "appVer")]
    app_ver: Option<String>,
    status: Option<String>,
}

/// Payload of the release listing endpoint.
#[derive(Debug, Deserialize)]
struct ReleaseListing {
    assets: Vec<ReleaseAsset>,
}

/// One downloadable file of a release.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

/// Append `update=1` to `url` when update mode is on.
pub fn with_update_flag(url: &str, update_mode: bool) -> String {
    if !update_mode {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}update=1", url, separator)
}

/// Pick the first asset whose name ends with `suffix`, ignoring case.
pub fn select_asset<'a>(assets: &'a [ReleaseAsset], suffix: &str) -> Option<&'a ReleaseAsset> {
    let suffix = suffix.to_lowercase();
    assets
        .iter()
        .find(|asset| asset.name.to_lowercase().ends_with(&suffix))
}

/// Resolver backed by the configured HTTP endpoints.
pub struct ReleaseResolver<C: HttpClient> {
    client: C,
    sources: SourceConfig,
    update_mode: bool,
}

impl ReleaseResolver<ReqwestClient> {
    /// Build a resolver with a real HTTP client using the configured
    /// resolve timeout.
    pub fn from_config(config: &InstallerConfig) -> InstallResult<Self> {
        let client = ReqwestClient::with_timeout(config.resolve_timeout)?;
        Ok(Self::new(client, config.sources.clone(), config.update_mode))
    }
}

impl<C: HttpClient> ReleaseResolver<C> {
    pub fn new(client: C, sources: SourceConfig, update_mode: bool) -> Self {
        Self {
            client,
            sources,
            update_mode,
        }
    }

    /// Query the version-info endpoint for the latest version tag.
    pub fn latest_version(&self) -> InstallResult<String> {
        let url = self.sources.version_url.as_str();
        let response = self.client.get_json(url)?;
        if response.status != 200 {
            return Err(InstallError::Server {
                url: url.to_string(),
                status: response.status,
            });
        }

        let info: VersionInfo =
            serde_json::from_slice(&response.body).map_err(|e| InstallError::MalformedResponse {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        match info.status.as_deref() {
            Some("OK") => {}
            other => {
                return Err(InstallError::MalformedResponse {
                    url: url.to_string(),
                    reason: format!("status marker is {:?}, expected \"OK\"", other),
                })
            }
        }

        match info.app_ver {
            Some(version) if !version.trim().is_empty() => Ok(version.trim().to_string()),
            _ => Err(InstallError::MalformedResponse {
                url: url.to_string(),
                reason: "missing appVer".to_string(),
            }),
        }
    }

    /// Build the direct asset URL for the latest version.
    pub fn resolve_version_endpoint(&self) -> InstallResult<ResolvedSource> {
        let version = self.latest_version()?;
        let url = self
            .sources
            .asset_url_template
            .replace(VERSION_PLACEHOLDER, &version);
        debug!(version = %version, url = %url, "Resolved asset URL from version endpoint");
        Ok(ResolvedSource::new(url, SourceOrigin::VersionEndpoint))
    }

    /// The mirror URL, if one is configured.
    pub fn mirror(&self) -> Option<ResolvedSource> {
        self.sources.mirror_url.as_deref().map(|url| {
            ResolvedSource::new(with_update_flag(url, self.update_mode), SourceOrigin::Mirror)
        })
    }

    /// Pick the platform asset from the latest release listing.
    pub fn resolve_release_listing(&self) -> InstallResult<ResolvedSource> {
        let url = format!("{}/latest", self.sources.releases_api.trim_end_matches('/'));
        let response = self.client.get_json(&url)?;
        if !response.is_success() {
            return Err(InstallError::Server {
                url,
                status: response.status,
            });
        }

        let listing: ReleaseListing = serde_json::from_slice(&response.body).map_err(|e| {
            InstallError::MalformedResponse {
                url: url.clone(),
                reason: e.to_string(),
            }
        })?;

        let asset = select_asset(&listing.assets, &self.sources.platform_suffix).ok_or_else(|| {
            InstallError::MalformedResponse {
                url: url.clone(),
                reason: format!(
                    "no asset ending in {} among {} assets",
                    self.sources.platform_suffix,
                    listing.assets.len()
                ),
            }
        })?;

        debug!(asset = %asset.name, "Selected release asset");
        Ok(ResolvedSource::new(
            asset.browser_download_url.clone(),
            SourceOrigin::ReleaseListing,
        ))
    }
}

impl<C: HttpClient> SourceResolver for ReleaseResolver<C> {
    fn resolve_primary(&self) -> InstallResult<ResolvedSource> {
        let source = self.resolve_version_endpoint();
        if let Err(ref e) = source {
            warn!(error = %e, "Primary resolution failed");
        }
        source
    }

    fn resolve_fallback(&self) -> InstallResult<ResolvedSource> {
        if let Some(mirror) = self.mirror() {
            info!(url = %mirror.url, "Using distribution mirror");
            return Ok(mirror);
        }
        let source = self.resolve_release_listing();
        match source {
            Ok(ref s) => info!(url = %s.url, "Using release listing"),
            Err(ref e) => warn!(error = %e, "Release listing resolution failed"),
        }
        source
    }
}
