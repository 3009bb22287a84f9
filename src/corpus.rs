//! Corpus loading.
//!
//! The corpus is a UTF-8 text file with one rule per line, typically
//! `"Label. Description..."`. It is read eagerly; line handling (trimming,
//! labels, ids) is the indexer's job.

use std::path::Path;

use anyhow::Context;
use tsa_rag_core::error::{RagError, RagResult};

/// Read every line of the corpus file at `path`.
///
/// A missing, unreadable, or non-UTF-8 file is [`RagError::CorpusUnavailable`].
pub fn load_corpus(path: &Path) -> RagResult<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))
        .map_err(|e| RagError::corpus(format!("cannot read {}", path.display()), e))?;

    let lines: Vec<String> = content.lines().map(str::to_string).collect();
    tracing::debug!(path = %path.display(), lines = lines.len(), "loaded corpus");
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_corpus_lines() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rules.txt");
        std::fs::write(
            &path,
            "Firearms. No loaded firearms.\r\n\nLiquids. Max 3.4oz containers.\n",
        )
        .unwrap();

        let lines = load_corpus(&path).unwrap();
        assert_eq!(
            lines,
            vec![
                "Firearms. No loaded firearms.",
                "",
                "Liquids. Max 3.4oz containers."
            ]
        );
    }

    #[test]
    fn test_missing_corpus_is_corpus_unavailable() {
        let tmp = TempDir::new().unwrap();
        let err = load_corpus(&tmp.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, RagError::CorpusUnavailable { .. }));
        assert!(err.to_string().starts_with("corpus unavailable"));
    }

    #[test]
    fn test_non_utf8_corpus_is_corpus_unavailable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("latin1.txt");
        std::fs::write(&path, [0x47u8, 0x72, 0xf6, 0xdf, 0x65, b'\n']).unwrap();
        assert!(matches!(
            load_corpus(&path),
            Err(RagError::CorpusUnavailable { .. })
        ));
    }
}
