//! Where a manifest comes from.
//!
//! A manifest location is one of:
//!
//! | Form                                   | Fetched by                                  |
//! |----------------------------------------|---------------------------------------------|
//! | `stacks/web.yaml`, `~/web.yaml`        | reading the file (`~` and `$VAR` expanded)  |
//! | `https://host/web.yaml`                | HTTP GET, retried on transient failures     |
//! | `git+<repo-url>//<path>[?ref=<rev>]`   | shallow clone into a temporary directory    |
//!
//! For git sources `<rev>` is a branch or tag. The `//` separating the repository
//! from the path inside it is the first one after the URL scheme.

use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::ExponentialBackoff;

use crate::constants::{
    FETCH_RETRY_ATTEMPTS, GIT_CLONE_TIMEOUT, HTTP_FETCH_TIMEOUT, MAX_BACKOFF_DELAY_MS,
    STARTING_BACKOFF_DELAY_MS,
};
use crate::core::StackyardError;
use crate::git;
use crate::manifest::Manifest;
use crate::utils::resolve_path;

/// A parsed manifest location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    Local(PathBuf),
    Http(String),
    Git {
        url: String,
        path: String,
        reference: Option<String>,
    },
}

/// Timeouts applied while fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSettings {
    pub http_timeout: Duration,
    pub git_timeout: Duration,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            http_timeout: HTTP_FETCH_TIMEOUT,
            git_timeout: GIT_CLONE_TIMEOUT,
        }
    }
}

impl FromStr for ManifestSource {
    type Err = anyhow::Error;

    fn from_str(location: &str) -> Result<Self> {
        let location = location.trim();
        if location.is_empty() {
            anyhow::bail!("Manifest location is empty");
        }

        if let Some(rest) = location.strip_prefix("git+") {
            return parse_git(rest).with_context(|| format!("Invalid git source: {location}"));
        }

        if location.starts_with("http://") || location.starts_with("https://") {
            return Ok(Self::Http(location.to_string()));
        }

        Ok(Self::Local(resolve_path(location)?))
    }
}

fn parse_git(rest: &str) -> Result<ManifestSource> {
    let (repository, reference) = match rest.rsplit_once("?ref=") {
        Some((repository, reference)) if !reference.is_empty() => {
            (repository, Some(reference.to_string()))
        }
        Some(_) => anyhow::bail!("'?ref=' needs a branch or tag"),
        None => (rest, None),
    };

    let scheme_end = repository.find("://").map_or(0, |i| i + 3);
    let Some(separator) = repository[scheme_end..].find("//").map(|i| i + scheme_end) else {
        anyhow::bail!("expected git+<repository>//<path>");
    };

    let url = &repository[..separator];
    let path = repository[separator + 2..].trim_start_matches('/');
    if url.is_empty() || path.is_empty() {
        anyhow::bail!("expected git+<repository>//<path>");
    }

    Ok(ManifestSource::Git {
        url: url.to_string(),
        path: path.to_string(),
        reference,
    })
}

impl fmt::Display for ManifestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Http(url) => f.write_str(url),
            Self::Git {
                url,
                path,
                reference,
            } => {
                write!(f, "git+{url}//{path}")?;
                if let Some(reference) = reference {
                    write!(f, "?ref={reference}")?;
                }
                Ok(())
            }
        }
    }
}

impl ManifestSource {
    /// Fetch the raw manifest text.
    pub async fn fetch(&self, settings: &SourceSettings) -> Result<String> {
        tracing::debug!(target: "source", "Fetching manifest from {}", self);
        match self {
            Self::Local(path) => fetch_local(path).await,
            Self::Http(url) => fetch_http(url, settings.http_timeout).await,
            Self::Git {
                url,
                path,
                reference,
            } => fetch_git(url, path, reference.as_deref(), settings.git_timeout).await,
        }
    }

    /// Fetch and parse the manifest.
    pub async fn load(&self, settings: &SourceSettings) -> Result<Manifest> {
        let content = self.fetch(settings).await?;
        Ok(Manifest::from_yaml(&content, &self.to_string())?)
    }
}

async fn fetch_local(path: &Path) -> Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(StackyardError::ManifestNotFound {
                location: path.display().to_string(),
            }
            .into())
        }
        Err(err) => {
            Err(err).with_context(|| format!("Failed to read manifest: {}", path.display()))
        }
    }
}

async fn fetch_http(url: &str, timeout: Duration) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("stackyard/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")?;

    let strategy = ExponentialBackoff::from_millis(STARTING_BACKOFF_DELAY_MS)
        .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS))
        .factor(2)
        .take(FETCH_RETRY_ATTEMPTS);

    let result = RetryIf::spawn(
        strategy,
        || {
            let client = client.clone();
            async move {
                let response = client.get(url).send().await?.error_for_status()?;
                response.text().await
            }
        },
        |err: &reqwest::Error| {
            let transient = err.is_timeout()
                || err.is_connect()
                || err.status().is_some_and(|status| status.is_server_error());
            if transient {
                tracing::debug!(target: "source", "Retrying {} after: {}", url, err);
            }
            transient
        },
    )
    .await;

    match result {
        Ok(content) => Ok(content),
        Err(err) if err.status() == Some(reqwest::StatusCode::NOT_FOUND) => {
            Err(StackyardError::ManifestNotFound {
                location: url.to_string(),
            }
            .into())
        }
        Err(err) => Err(StackyardError::SourceFetchFailed {
            location: url.to_string(),
            reason: err.to_string(),
        }
        .into()),
    }
}

async fn fetch_git(
    url: &str,
    path: &str,
    reference: Option<&str>,
    timeout: Duration,
) -> Result<String> {
    let staging = tempfile::Builder::new()
        .prefix("stackyard-")
        .tempdir()
        .context("Failed to create staging directory")?;
    let checkout = staging.path().join("repo");

    git::shallow_clone(url, reference, &checkout, Some(timeout)).await?;

    let file = checkout.join(path);
    match tokio::fs::read_to_string(&file).await {
        Ok(content) => Ok(content),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(StackyardError::ManifestNotFound {
                location: format!("{path} in {url}"),
            }
            .into())
        }
        Err(err) => Err(err).with_context(|| format!("Failed to read {path} from {url}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestGit;

    fn git(url: &str, path: &str, reference: Option<&str>) -> ManifestSource {
        ManifestSource::Git {
            url: url.to_string(),
            path: path.to_string(),
            reference: reference.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_local_and_http() {
        assert_eq!(
            "stacks/web.yaml".parse::<ManifestSource>().unwrap(),
            ManifestSource::Local(PathBuf::from("stacks/web.yaml"))
        );
        assert_eq!(
            "https://example.com/web.yaml".parse::<ManifestSource>().unwrap(),
            ManifestSource::Http("https://example.com/web.yaml".into())
        );
        assert!("  ".parse::<ManifestSource>().is_err());
    }

    #[test]
    fn test_parse_git_sources() {
        assert_eq!(
            "git+https://github.com/acme/stacks.git//envs/web.yaml?ref=v2".parse::<ManifestSource>().unwrap(),
            git("https://github.com/acme/stacks.git", "envs/web.yaml", Some("v2"))
        );
        assert_eq!(
            "git+git@github.com:acme/stacks.git//web.yaml".parse::<ManifestSource>().unwrap(),
            git("git@github.com:acme/stacks.git", "web.yaml", None)
        );
        assert_eq!(
            "git+file:///srv/repos/stacks//web.yaml".parse::<ManifestSource>().unwrap(),
            git("file:///srv/repos/stacks", "web.yaml", None)
        );
    }

    #[test]
    fn test_parse_git_rejects_missing_path() {
        assert!("git+https://github.com/acme/stacks.git".parse::<ManifestSource>().is_err());
        assert!("git+https://github.com/acme/stacks.git//".parse::<ManifestSource>().is_err());
        assert!("git+https://github.com/acme/stacks.git//web.yaml?ref=".parse::<ManifestSource>().is_err());
    }

    #[test]
    fn test_display_round_trips_git() {
        let location = "git+https://github.com/acme/stacks.git//web.yaml?ref=main";
        assert_eq!(location.parse::<ManifestSource>().unwrap().to_string(), location);
    }

    #[tokio::test]
    async fn test_fetch_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.yaml");
        tokio::fs::write(&path, "environments: [dev]\n").await.unwrap();

        let source = ManifestSource::Local(path);
        let manifest = source.load(&SourceSettings::default()).await.unwrap();
        assert_eq!(manifest.environments, vec!["dev"]);
    }

    #[tokio::test]
    async fn test_fetch_missing_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = ManifestSource::Local(dir.path().join("missing.yaml"));
        let err = source.fetch(&SourceSettings::default()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StackyardError>(),
            Some(StackyardError::ManifestNotFound { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_from_local_git_repository() {
        if !git::is_git_installed() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let repo = TestGit::new(dir.path().join("stacks"));
        repo.init().unwrap();
        repo.write_file("envs/web.yaml", "environments: [qa]\n").unwrap();
        repo.commit_all("init").unwrap();
        repo.tag("v1").unwrap();
        repo.write_file("envs/web.yaml", "environments: [prod]\n").unwrap();
        repo.commit_all("promote").unwrap();

        let head: ManifestSource = repo.source_location("envs/web.yaml", None).parse().unwrap();
        let manifest = head.load(&SourceSettings::default()).await.unwrap();
        assert_eq!(manifest.environments, vec!["prod"]);

        let tagged: ManifestSource =
            repo.source_location("envs/web.yaml", Some("v1")).parse().unwrap();
        let manifest = tagged.load(&SourceSettings::default()).await.unwrap();
        assert_eq!(manifest.environments, vec!["qa"]);

        let missing: ManifestSource = repo.source_location("nope.yaml", None).parse().unwrap();
        let err = missing.fetch(&SourceSettings::default()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StackyardError>(),
            Some(StackyardError::ManifestNotFound { .. })
        ));
    }
}
