//! File-set lifecycle scenarios: addition, modification, deletion,
//! exclusion, and idempotence across poll cycles.

mod common;

use common::TestBed;
use driftrec::fileset::process_file_set;
use driftrec::repo::VersionedRepository;
use std::fs;
use std::path::Path;

#[test]
fn test_first_run_commits_new_files_as_pure_additions() {
    let bed = TestBed::new();
    bed.write_source("a.txt", "alpha\n");
    bed.write_source("b.txt", "beta\n");
    let spec = bed.fileset("base", &["a.txt", "b.txt"], &[]);
    let mut repo = bed.repo();

    let diff = process_file_set(&spec, &mut repo).unwrap();

    assert_eq!(diff.matches("@@ -0 +1 @@").count(), 2);
    assert!(diff.contains("+ alpha"));
    assert!(diff.contains("+ beta"));
    assert!(diff.lines().all(|l| !l.starts_with("- ")));
    assert_eq!(repo.list_tracked_files().unwrap().len(), 2);
}

#[test]
fn test_second_run_without_changes_is_idempotent() {
    let bed = TestBed::new();
    bed.write_source("a.txt", "alpha\n");
    let spec = bed.fileset("base", &["a.txt"], &[]);
    let mut repo = bed.repo();

    let first = process_file_set(&spec, &mut repo).unwrap();
    assert!(!first.is_empty());

    let second = process_file_set(&spec, &mut repo).unwrap();
    let third = process_file_set(&spec, &mut repo).unwrap();
    assert_eq!(second, "");
    assert_eq!(third, "");
}

#[test]
fn test_modification_produces_single_change_hunk() {
    let bed = TestBed::new();
    bed.write_source("a.txt", "line1\nline2\n");
    let spec = bed.fileset("base", &["a.txt"], &[]);
    let mut repo = bed.repo();
    process_file_set(&spec, &mut repo).unwrap();

    bed.write_source("a.txt", "line1\nlineX\n");
    bed.touch_newer("a.txt", 120);
    let diff = process_file_set(&spec, &mut repo).unwrap();

    assert!(diff.contains("@@ -2 +2 @@"));
    assert!(diff.contains("- line2"));
    assert!(diff.contains("+ lineX"));
    assert_eq!(diff.matches("@@").count(), 2); // one hunk, two markers
}

#[test]
fn test_deleted_source_file_is_removed_from_tracking() {
    let bed = TestBed::new();
    bed.write_source("a.txt", "keep\n");
    let b_path = bed.write_source("b.txt", "drop\n");
    let spec = bed.fileset("base", &["a.txt", "b.txt"], &[]);
    let mut repo = bed.repo();
    process_file_set(&spec, &mut repo).unwrap();
    assert_eq!(repo.list_tracked_files().unwrap().len(), 2);

    fs::remove_file(b_path).unwrap();
    let diff = process_file_set(&spec, &mut repo).unwrap();

    assert!(diff.contains("- drop"));
    assert!(diff.lines().all(|l| !l.starts_with("+ ")));
    let tracked = repo.list_tracked_files().unwrap();
    assert_eq!(tracked.len(), 1);
    assert!(tracked.iter().all(|p| p.ends_with("a.txt")));
    // The working-tree copy is gone too.
    let data_files: Vec<_> = walk_files(&bed.data);
    assert!(data_files.iter().all(|p| !p.ends_with("b.txt")));
}

#[test]
fn test_excluding_a_tracked_file_removes_it() {
    let bed = TestBed::new();
    bed.write_source("a.conf", "a\n");
    bed.write_source("b.conf", "b\n");
    let all = bed.fileset("conf", &["*.conf"], &[]);
    let mut repo = bed.repo();
    process_file_set(&all, &mut repo).unwrap();
    assert_eq!(repo.list_tracked_files().unwrap().len(), 2);

    let minus_b = bed.fileset("conf", &["*.conf"], &["b.conf"]);
    let diff = process_file_set(&minus_b, &mut repo).unwrap();

    assert!(diff.contains("- b"));
    assert_eq!(repo.list_tracked_files().unwrap().len(), 1);
}

#[test]
fn test_include_and_exclude_of_same_file_excludes_it() {
    let bed = TestBed::new();
    bed.write_source("a.txt", "a\n");
    let spec = bed.fileset("base", &["a.txt"], &["a.txt"]);
    let mut repo = bed.repo();

    let diff = process_file_set(&spec, &mut repo).unwrap();
    assert_eq!(diff, "");
    assert!(repo.list_tracked_files().unwrap().is_empty());
}

#[test]
fn test_wildcard_over_missing_directory_is_not_an_error() {
    let bed = TestBed::new();
    let spec = bed.fileset("ghost", &["no-such-dir/*.conf"], &[]);
    let mut repo = bed.repo();
    assert_eq!(process_file_set(&spec, &mut repo).unwrap(), "");
}

#[test]
fn test_other_repository_content_is_left_alone() {
    let bed = TestBed::new();
    bed.write_source("a.txt", "mine\n");
    let spec = bed.fileset("base", &["a.txt"], &[]);
    let mut repo = bed.repo();

    // A parameter snapshot from some host shares the repository.
    let params = Path::new("freebsd/web01/GlobalVariables");
    fs::create_dir_all(bed.data.join(params).parent().unwrap()).unwrap();
    fs::write(bed.data.join(params), "kern.hostname : web01\n").unwrap();
    repo.stage(params).unwrap();
    repo.commit("record parameters").unwrap();

    process_file_set(&spec, &mut repo).unwrap();
    let tracked = repo.list_tracked_files().unwrap();
    assert!(tracked.contains(params));
}

fn walk_files(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let Ok(entries) = fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files
}
