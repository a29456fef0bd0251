//! Directory walk properties over generated trees.

use std::collections::BTreeSet;
use std::fs;

use bindery::RelativePath;
use bindery::source::{WalkOptions, detect_cover, walk};
use proptest::prelude::*;

/// Relative file paths up to three levels deep, some under `.git`.
fn file_paths() -> impl Strategy<Value = BTreeSet<String>> {
    let segment = prop_oneof![
        4 => "[a-z]{1,6}",
        1 => Just(".git".to_string()),
    ];
    let dirs = prop::collection::vec(segment, 0..3);
    let file = "[a-z]{1,6}\\.(md|html|txt|png)";
    prop::collection::btree_set(
        (dirs, file).prop_map(|(dirs, file)| {
            let mut parts = dirs;
            parts.push(file);
            parts.join("/")
        }),
        1..12,
    )
}

/// Drop paths that would need a directory where a file already is.
fn consistent(paths: BTreeSet<String>) -> BTreeSet<String> {
    let mut kept = BTreeSet::new();
    for path in paths {
        let conflicts = kept.iter().any(|k: &String| {
            path.starts_with(&format!("{k}/")) || k.starts_with(&format!("{path}/"))
        });
        if !conflicts {
            kept.insert(path);
        }
    }
    kept
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_every_file_once_and_excluded_dirs_skipped(paths in file_paths().prop_map(consistent)) {
        let dir = tempfile::tempdir().unwrap();
        for path in &paths {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(&full, path).unwrap();
        }

        let walked = walk(dir.path(), None, &WalkOptions::default()).unwrap();
        let walked: Vec<&str> = walked.iter().map(RelativePath::as_str).collect();

        let unique: BTreeSet<&str> = walked.iter().copied().collect();
        prop_assert_eq!(unique.len(), walked.len());

        let expected: BTreeSet<&str> = paths
            .iter()
            .map(String::as_str)
            .filter(|p| !p.split('/').any(|s| s == ".git"))
            .collect();
        prop_assert_eq!(unique, expected);
    }

    #[test]
    fn prop_files_precede_subdirectory_contents(paths in file_paths().prop_map(consistent)) {
        let dir = tempfile::tempdir().unwrap();
        for path in &paths {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(&full, path).unwrap();
        }

        let walked = walk(dir.path(), None, &WalkOptions::default()).unwrap();
        for (i, a) in walked.iter().enumerate() {
            for b in &walked[i + 1..] {
                // A file never follows a file nested below its own directory.
                let a_dir = a.parent();
                let b_dir = b.parent();
                let nested_below_b = !b_dir.is_root()
                    && a_dir.as_str().starts_with(&format!("{}/", b_dir.as_str()));
                let nested_below_root = b_dir.is_root() && !a_dir.is_root();
                prop_assert!(!(nested_below_b || nested_below_root), "{} before {}", a, b);
            }
        }
    }
}

#[test]
fn test_cover_excluded_from_walk_once() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("README.md"), "cover").unwrap();
    fs::write(dir.path().join("sub/README.md"), "nested").unwrap();

    let cover = detect_cover(dir.path()).unwrap().unwrap();
    let walked = walk(dir.path(), Some(&cover.path), &WalkOptions::default()).unwrap();
    let walked: Vec<&str> = walked.iter().map(RelativePath::as_str).collect();
    assert_eq!(walked, vec!["sub/README.md"]);
}
