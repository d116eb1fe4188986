use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use foundry_compilers::artifacts::{Source, Sources};
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::error::{DeployError, Result};

/// Single import-statement pattern applied left-to-right, non-overlapping.
static IMPORT_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r#"import\s+['"]([^'"]+)['"];"#).expect("import pattern is valid"));

/// Seam over the remote package mirror. Production uses [`MirrorFetcher`];
/// tests substitute an in-memory map.
#[async_trait]
pub trait ModuleFetcher: Send + Sync {
  /// Fetch raw source text for a registry-absolute logical path.
  async fn fetch_module(&self, logical_path: &str) -> Result<String>;
}

/// HTTP fetcher against `<mirror-base>/<logical-path>`. The response body
/// is treated as raw source text; no caching, no integrity check.
pub struct MirrorFetcher {
  base: Url,
  client: reqwest::Client,
}

impl MirrorFetcher {
  pub fn new(base: Url, timeout: Duration) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|err| DeployError::import_fetch(base.as_str(), err))?;
    Ok(Self { base, client })
  }
}

#[async_trait]
impl ModuleFetcher for MirrorFetcher {
  async fn fetch_module(&self, logical_path: &str) -> Result<String> {
    let url = self
      .base
      .join(logical_path)
      .map_err(|err| DeployError::import_fetch(logical_path, err))?;
    tracing::debug!(%url, "fetching imported module");
    let response = self
      .client
      .get(url)
      .send()
      .await
      .map_err(|err| DeployError::import_fetch(logical_path, err))?
      .error_for_status()
      .map_err(|err| DeployError::import_fetch(logical_path, err))?;
    response
      .text()
      .await
      .map_err(|err| DeployError::import_fetch(logical_path, err))
  }
}

/// Closed set of named sources for one compilation, keyed by logical path.
/// The resolver is the sole mutator; once handed to the compiler driver the
/// set is consumed and never shared across deployment attempts.
#[derive(Debug, Default)]
pub struct SourceSet {
  units: BTreeMap<String, String>,
}

impl SourceSet {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn contains(&self, logical_path: &str) -> bool {
    self.units.contains_key(logical_path)
  }

  pub fn get(&self, logical_path: &str) -> Option<&str> {
    self.units.get(logical_path).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.units.len()
  }

  pub fn is_empty(&self) -> bool {
    self.units.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self
      .units
      .iter()
      .map(|(path, content)| (path.as_str(), content.as_str()))
  }

  /// Convert into the compiler's path-keyed source map.
  pub fn into_sources(self) -> Sources {
    let mut sources = Sources::new();
    for (path, content) in self.units {
      sources.insert(PathBuf::from(path), Source::new(content));
    }
    sources
  }

  fn insert(&mut self, logical_path: impl Into<String>, content: String) {
    self.units.insert(logical_path.into(), content);
  }
}

/// Recursive import resolver over a remote package mirror.
///
/// Relative import paths are resolved with URL semantics against the fetch
/// URL of the importing file, and every relative import statement is
/// rewritten to the resolved registry-absolute path, so the compiler later
/// sees only resolver-absolute imports.
pub struct ImportResolver<'f> {
  fetcher: &'f dyn ModuleFetcher,
  mirror_base: Url,
  max_fetches: usize,
  max_depth: usize,
}

struct ResolveState {
  sources: SourceSet,
  visited: HashSet<String>,
  fetched: usize,
}

impl<'f> ImportResolver<'f> {
  pub fn new(
    fetcher: &'f dyn ModuleFetcher,
    mirror_base: Url,
    max_fetches: usize,
    max_depth: usize,
  ) -> Self {
    Self {
      fetcher,
      mirror_base,
      max_fetches,
      max_depth,
    }
  }

  /// Resolve the import closure of `root_source`, returning a SourceSet
  /// containing the (rewritten) root unit plus every transitively imported
  /// module. Any fetch failure aborts the whole resolution.
  pub async fn resolve(&self, root_source: &str, root_logical_path: &str) -> Result<SourceSet> {
    let mut state = ResolveState {
      sources: SourceSet::new(),
      visited: HashSet::new(),
      fetched: 0,
    };
    state.visited.insert(root_logical_path.to_string());

    let root_url = self
      .mirror_base
      .join(root_logical_path)
      .map_err(|err| DeployError::import_fetch(root_logical_path, err))?;
    let rewritten = self
      .resolve_unit(root_source.to_string(), root_url, 0, &mut state)
      .await?;
    state.sources.insert(root_logical_path, rewritten);

    tracing::debug!(
      units = state.sources.len(),
      fetched = state.fetched,
      "import resolution complete"
    );
    Ok(state.sources)
  }

  /// Scan one unit for import statements, fetching unresolved modules
  /// depth-first and rewriting relative statements in place. Returns the
  /// rewritten text; the caller inserts it under its logical path.
  fn resolve_unit<'a>(
    &'a self,
    text: String,
    fetch_url: Url,
    depth: usize,
    state: &'a mut ResolveState,
  ) -> BoxFuture<'a, Result<String>> {
    Box::pin(async move {
      if depth > self.max_depth {
        return Err(DeployError::import_fetch(
          fetch_url.as_str(),
          format!("import graph exceeds maximum depth of {}", self.max_depth),
        ));
      }

      let statements: Vec<(String, String)> = IMPORT_RE
        .captures_iter(&text)
        .map(|captures| (captures[0].to_string(), captures[1].to_string()))
        .collect();

      let mut text = text;
      for (statement, import_path) in statements {
        let logical = self.absolute_logical_path(&import_path, &fetch_url)?;

        // Check-and-mark before fetching: cyclic and diamond graphs skip
        // paths that are already resolved or currently in flight, so each
        // distinct module is fetched at most once.
        if state.visited.insert(logical.clone()) {
          if state.fetched >= self.max_fetches {
            return Err(DeployError::import_fetch(
              &logical,
              format!("import fetch budget of {} exceeded", self.max_fetches),
            ));
          }
          state.fetched += 1;

          let fetched = self.fetcher.fetch_module(&logical).await?;
          let module_url = self
            .mirror_base
            .join(&logical)
            .map_err(|err| DeployError::import_fetch(&logical, err))?;
          let rewritten = self
            .resolve_unit(fetched, module_url, depth + 1, state)
            .await?;
          state.sources.insert(logical.clone(), rewritten);
        }

        if logical != import_path {
          let replacement = format!("import \"{logical}\";");
          text = text.replace(&statement, &replacement);
        }
      }

      Ok(text)
    })
  }

  /// Rewrite a relative import path (`./`, `../`) into a registry-absolute
  /// logical path by resolving it against the importing file's fetch URL.
  /// Absolute paths pass through untouched.
  fn absolute_logical_path(&self, import_path: &str, importer_url: &Url) -> Result<String> {
    if !import_path.starts_with("./") && !import_path.starts_with("../") {
      return Ok(import_path.to_string());
    }

    let resolved = importer_url
      .join(import_path)
      .map_err(|err| DeployError::import_fetch(import_path, err))?;
    resolved
      .as_str()
      .strip_prefix(self.mirror_base.as_str())
      .map(str::to_string)
      .ok_or_else(|| {
        DeployError::import_fetch(import_path, "relative import resolves outside the mirror")
      })
  }
}
