//! Resource-to-file mappings
//!
//! A [`FileMapping`] is built once per configured resource when the
//! configuration loads. Loading validates the declaration and scans the project
//! tree for translations that already exist; afterwards the mapping is
//! read-only for the rest of the run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::ResourceConfig;
use crate::error::{Error, Result};
use crate::language::{self, LANG_PLACEHOLDER};
use crate::types::ResourceId;

/// Declared correspondence between one remote resource and local files
#[derive(Clone, Debug)]
pub struct FileMapping {
    id: ResourceId,
    file_filter: String,
    source_file: Option<PathBuf>,
    source_language: String,
    language_overrides: BTreeMap<String, String>,
    path_overrides: BTreeMap<String, String>,
    project_root: PathBuf,
    discovered: BTreeMap<String, PathBuf>,
}

impl FileMapping {
    /// Validate a resource declaration and discover its existing translations
    ///
    /// # Errors
    ///
    /// - the resource id does not parse
    /// - the file filter does not contain exactly one `<lang>` placeholder
    /// - two remote languages are mapped onto the same local code, which would
    ///   make [`language::to_remote`] ambiguous
    pub fn load(config: &ResourceConfig, project_root: &Path) -> Result<Self> {
        let id: ResourceId = config.resource_id.parse()?;
        validate_filter(&config.file_filter)?;
        validate_injective(&id, &config.language_overrides)?;

        let mut mapping = Self {
            id,
            file_filter: config.file_filter.clone(),
            source_file: config.source_file.as_ref().map(|f| project_root.join(f)),
            source_language: config.source_lang.clone(),
            language_overrides: config.language_overrides.clone(),
            path_overrides: config.path_overrides.clone(),
            project_root: project_root.to_path_buf(),
            discovered: BTreeMap::new(),
        };
        mapping.discovered = language::discover_existing(&mapping, project_root)?;

        tracing::debug!(
            resource = %mapping.id,
            languages = ?mapping.discovered.keys().collect::<Vec<_>>(),
            "loaded file mapping"
        );
        Ok(mapping)
    }

    /// Remote resource identifier
    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    /// Path template with its `<lang>` placeholder
    pub fn file_filter(&self) -> &str {
        &self.file_filter
    }

    /// Absolute path of the source file, if declared
    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }

    /// Language code of the source file
    pub fn source_language(&self) -> &str {
        &self.source_language
    }

    /// Remote -> local language code overrides
    pub fn language_overrides(&self) -> &BTreeMap<String, String> {
        &self.language_overrides
    }

    /// Local language code -> root-relative path overrides
    pub fn path_overrides(&self) -> &BTreeMap<String, String> {
        &self.path_overrides
    }

    /// Root the filter and overrides are relative to
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Translations found on disk at load time (local code -> absolute path)
    pub fn discovered(&self) -> &BTreeMap<String, PathBuf> {
        &self.discovered
    }

    /// Existing local file for a local language code, if one was discovered
    pub fn existing_path(&self, local_code: &str) -> Option<&Path> {
        self.discovered.get(local_code).map(PathBuf::as_path)
    }
}

fn validate_filter(filter: &str) -> Result<()> {
    match filter.matches(LANG_PLACEHOLDER).count() {
        1 => Ok(()),
        0 => Err(Error::config(
            format!("file filter '{filter}' has no {LANG_PLACEHOLDER} placeholder"),
            Some("file_filter"),
        )),
        n => Err(Error::config(
            format!("file filter '{filter}' has {n} {LANG_PLACEHOLDER} placeholders, expected one"),
            Some("file_filter"),
        )),
    }
}

fn validate_injective(id: &ResourceId, overrides: &BTreeMap<String, String>) -> Result<()> {
    let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
    for (remote, local) in overrides {
        if let Some(previous) = seen.insert(local.as_str(), remote.as_str()) {
            return Err(Error::config(
                format!(
                    "{id}: remote languages '{previous}' and '{remote}' both map to local '{local}'"
                ),
                Some("language_overrides"),
            ));
        }
    }
    Ok(())
}
