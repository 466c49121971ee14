//! Property-based tests for inlinetest
//!
//! These tests use proptest to check the path grammar, artifact naming and
//! artifact content across many generated inputs.

use inlinetest::synthesis::{NAME_ENTROPY_BYTES, artifact_content};
use inlinetest::{ArtifactName, HarnessError, RootPath};
use proptest::prelude::*;

// =============================================================================
// Path Grammar
// =============================================================================

#[cfg(test)]
mod path_grammar {
    use super::*;

    fn segment_strategy() -> impl Strategy<Value = String> {
        "[A-Za-z0-9.]{1,12}".prop_filter("parent segment", |s| s != "..")
    }

    fn path_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec(segment_strategy(), 1..6).prop_map(|segments| segments.join("/"))
    }

    proptest! {
        /// Property: Every path built from the grammar is accepted unchanged
        #[test]
        fn grammar_paths_are_accepted(path in path_strategy()) {
            let parsed = RootPath::parse(&path).unwrap();
            prop_assert_eq!(parsed.as_str(), path.as_str());
        }

        /// Property: Any `..` segment is rejected wherever it appears
        #[test]
        fn parent_segments_are_rejected(
            before in prop::collection::vec(segment_strategy(), 0..3),
            after in prop::collection::vec(segment_strategy(), 0..3),
        ) {
            let mut segments = before;
            segments.push("..".to_string());
            segments.extend(after);
            let err = RootPath::parse(segments.join("/")).unwrap_err();
            let is_invalid = matches!(err, HarnessError::InvalidPath { .. });
            prop_assert!(is_invalid);
        }

        /// Property: A single character outside the alphabet poisons the path
        #[test]
        fn foreign_characters_are_rejected(
            path in path_strategy(),
            bad in "[^A-Za-z0-9./]",
            at in any::<prop::sample::Index>(),
        ) {
            let mut chars: Vec<char> = path.chars().collect();
            let idx = at.index(chars.len() + 1);
            chars.splice(idx..idx, bad.chars());
            let candidate: String = chars.into_iter().collect();
            prop_assert!(RootPath::parse(candidate).is_err());
        }

        /// Property: Absolute paths and empty segments are rejected
        #[test]
        fn absolute_and_empty_segments_are_rejected(path in path_strategy()) {
            let absolute = format!("/{path}");
            let trailing = format!("{path}/");
            let doubled = format!("{path}//x");
            prop_assert!(RootPath::parse(absolute).is_err());
            prop_assert!(RootPath::parse(trailing).is_err());
            prop_assert!(RootPath::parse(doubled).is_err());
        }
    }

    #[test]
    fn empty_path_is_rejected() {
        assert!(RootPath::parse("").is_err());
    }
}

// =============================================================================
// Artifact Names
// =============================================================================

#[cfg(test)]
mod artifact_names {
    use std::collections::HashSet;

    use super::*;

    proptest! {
        /// Property: A name built from any entropy bytes parses back to itself
        #[test]
        fn names_parse_back(bytes in any::<[u8; NAME_ENTROPY_BYTES]>(), ext in "[a-z]{1,4}") {
            let name = ArtifactName::from_bytes(bytes, "test", &ext);
            let file_name = name.file_name();
            prop_assert_eq!(ArtifactName::parse(&file_name, "test"), Some(name));
            let suffix = format!(".test.{ext}");
            prop_assert!(file_name.ends_with(&suffix));
        }

        /// Property: Ordinary source names are never mistaken for artifacts
        #[test]
        fn source_names_are_not_artifacts(stem in "[a-zA-Z_]{1,20}", ext in "(js|ts)") {
            let file_name = format!("{stem}.test.{ext}");
            prop_assert_eq!(ArtifactName::parse(&file_name, "test"), None);
        }
    }

    #[test]
    fn random_names_do_not_collide() {
        const N: usize = 10_000;
        let ids: HashSet<String> = (0..N)
            .map(|_| ArtifactName::random("test", "ts").id().to_string())
            .collect();
        assert_eq!(ids.len(), N);
    }
}

// =============================================================================
// Artifact Content
// =============================================================================

#[cfg(test)]
mod content {
    use super::*;

    proptest! {
        /// Property: Content is the original source, a newline, then the hook call
        #[test]
        fn content_is_source_then_invocation(source in any::<String>()) {
            let content = artifact_content(&source);
            prop_assert!(content.starts_with(&source));
            prop_assert_eq!(&content[source.len()..], "\nunitTests();");
        }
    }
}
