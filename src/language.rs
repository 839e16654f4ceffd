//! Language code and file path resolution
//!
//! Maps between remote language codes, local language codes and file paths
//! using a mapping's file filter (a path template with one `<lang>`
//! placeholder) and its explicit overrides.
//!
//! Absence is never an error here: an unknown language resolves to the
//! identity code, and a missing file is simply a missing map entry.

use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::mapping::FileMapping;

/// Placeholder marking the language segment of a file filter
pub const LANG_PLACEHOLDER: &str = "<lang>";

/// Build the anchored matcher for a file filter
///
/// The literal parts of the filter are escaped; the placeholder becomes a
/// capture group of non-separator characters. Matching happens against the
/// root-relative path with `/` separators.
pub fn filter_regex(file_filter: &str) -> Result<Regex> {
    let relative = root_relative(file_filter);
    let (prefix, suffix) = relative.split_once(LANG_PLACEHOLDER).ok_or_else(|| {
        Error::config(
            format!("file filter '{file_filter}' has no {LANG_PLACEHOLDER} placeholder"),
            Some("file_filter"),
        )
    })?;
    let pattern = format!(
        "^{}(?P<lang>[^/\\\\]+){}$",
        regex::escape(prefix),
        regex::escape(suffix),
    );
    Regex::new(&pattern).map_err(|e| Error::config(e.to_string(), Some("file_filter")))
}

/// Find translations that already exist under `project_root`
///
/// Every regular file whose root-relative path matches the mapping's filter
/// contributes `captured code -> path`. Path overrides are applied last: an
/// override whose file exists replaces the discovered entry, and an override
/// whose file is missing removes the entry altogether.
pub fn discover_existing(
    mapping: &FileMapping,
    project_root: &Path,
) -> Result<BTreeMap<String, PathBuf>> {
    let matcher = filter_regex(mapping.file_filter())?;
    let mut found = BTreeMap::new();

    for entry in WalkDir::new(project_root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable entry during language scan");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(project_root) else {
            continue;
        };
        let relative = normalize_separators(&relative.to_string_lossy());
        if let Some(captures) = matcher.captures(&relative) {
            found.insert(captures["lang"].to_string(), entry.path().to_path_buf());
        }
    }

    for (local_code, relative) in mapping.path_overrides() {
        let path = project_root.join(root_relative(relative));
        if path.is_file() {
            found.insert(local_code.clone(), path);
        } else {
            found.remove(local_code);
        }
    }

    Ok(found)
}

/// Path where the translation for `local_code` lives (or would live)
pub fn path_for_language(mapping: &FileMapping, local_code: &str, project_root: &Path) -> PathBuf {
    match mapping.path_overrides().get(local_code) {
        Some(relative) => project_root.join(root_relative(relative)),
        None => project_root.join(root_relative(
            &mapping.file_filter().replace(LANG_PLACEHOLDER, local_code),
        )),
    }
}

/// Local language code for a remote one
pub fn to_local(mapping: &FileMapping, remote_code: &str) -> String {
    mapping
        .language_overrides()
        .get(remote_code)
        .cloned()
        .unwrap_or_else(|| remote_code.to_string())
}

/// Remote language code for a local one
///
/// Inverts the override map at call time. Mappings are checked for
/// injectivity when they load, so at most one remote code can match.
pub fn to_remote(mapping: &FileMapping, local_code: &str) -> String {
    mapping
        .language_overrides()
        .iter()
        .find(|(_, local)| local.as_str() == local_code)
        .map(|(remote, _)| remote.clone())
        .unwrap_or_else(|| local_code.to_string())
}

fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Configured path with `/` separators and any leading `./` removed
fn root_relative(path: &str) -> String {
    let normalized = normalize_separators(path);
    let mut relative = normalized.as_str();
    while let Some(rest) = relative.strip_prefix("./") {
        relative = rest.trim_start_matches('/');
    }
    relative.to_string()
}
