use std::path::Path;

use crate::config::TestVocabulary;

/// Derive a stable test name from a result file name.
///
/// Result files are named `<test-type>[-<disambiguator>].json`. The `.json`
/// suffix and everything after the first `-` are dropped. If what remains is
/// not itself a known keyword but contains one (`nightlysmoke_v2`), the
/// keyword is used instead.
pub fn test_name_from_path(path: &Path, vocabulary: &TestVocabulary) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    test_name_from_file_name(&file_name, vocabulary)
}

pub fn test_name_from_file_name(file_name: &str, vocabulary: &TestVocabulary) -> String {
    let stem = file_name.strip_suffix(".json").unwrap_or(file_name);
    let base = stem.split('-').next().unwrap_or(stem);
    if base.is_empty() {
        return stem.to_string();
    }
    if vocabulary.contains(base) {
        return base.to_string();
    }
    match vocabulary.keyword_in(base) {
        Some(keyword) => keyword.to_string(),
        None => base.to_string(),
    }
}
