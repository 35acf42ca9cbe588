//! Version-control layer over git2.
//!
//! [`ChangeWalker`] replays a branch's history oldest first and yields one
//! [`FileChange`] per modified file, with the line numbers deleted from the
//! old blob and added to the new one. Path filters run before any blob is
//! read.

use std::collections::HashSet;
use std::path::Path;

use git2::build::RepoBuilder;
use git2::{Commit, Delta, DiffFindOptions, DiffOptions, Oid, Patch, Repository, Sort};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, info};

use crate::core::errors::{BadcodeError, Result};
use crate::detectors::extraction::LineSet;
use crate::lang::registry::{language_key_for_path, normalize_language_key};

/// One side of a file change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    /// Blob id
    pub oid: Oid,
    /// Path of the file at that revision
    pub path: String,
}

/// A modified file in one commit.
#[derive(Debug, Clone)]
pub struct FileChange {
    /// Commit introducing the change
    pub commit: Oid,
    /// File in the first parent
    pub base: BlobRef,
    /// File in the commit
    pub head: BlobRef,
    /// Line numbers removed from `base`
    pub deleted_lines: LineSet,
    /// Line numbers added to `head`
    pub added_lines: LineSet,
}

/// Counters of one history walk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkSummary {
    /// Commits diffed
    pub commits: usize,
    /// Root or octopus commits skipped
    pub skipped_commits: usize,
    /// File changes reported
    pub changes: usize,
}

/// Upstream exclusion of paths from mining.
pub trait PathFilter: Send + Sync {
    /// Whether a path should be mined
    fn accepts(&self, path: &str) -> bool;
}

/// Rejects vendored and generated paths matching any glob.
#[derive(Debug, Clone)]
pub struct VendorFilter {
    globs: GlobSet,
}

impl VendorFilter {
    /// Build the filter from glob patterns
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern.as_ref()).map_err(|e| {
                BadcodeError::config_field(
                    format!("Invalid vendor pattern '{}': {}", pattern.as_ref(), e),
                    "mining.vendor_patterns",
                )
            })?;
            builder.add(glob);
        }
        let globs = builder.build().map_err(|e| {
            BadcodeError::config_field(
                format!("Invalid vendor patterns: {}", e),
                "mining.vendor_patterns",
            )
        })?;
        Ok(Self { globs })
    }
}

impl PathFilter for VendorFilter {
    fn accepts(&self, path: &str) -> bool {
        !self.globs.is_match(path)
    }
}

/// Accepts only files of the configured languages.
#[derive(Debug, Clone)]
pub struct LanguageFilter {
    keys: HashSet<&'static str>,
}

impl LanguageFilter {
    /// Build the filter from language names or keys
    pub fn new<S: AsRef<str>>(languages: &[S]) -> Result<Self> {
        let keys = languages
            .iter()
            .map(|language| {
                normalize_language_key(language.as_ref()).ok_or_else(|| {
                    BadcodeError::unsupported(format!(
                        "Unknown language: {}",
                        language.as_ref()
                    ))
                })
            })
            .collect::<Result<HashSet<_>>>()?;
        Ok(Self { keys })
    }
}

impl PathFilter for LanguageFilter {
    fn accepts(&self, path: &str) -> bool {
        language_key_for_path(Path::new(path)).is_some_and(|key| self.keys.contains(key))
    }
}

/// Walks a repository history into file changes.
pub struct ChangeWalker<'r> {
    repo: &'r Repository,
    filters: Vec<Box<dyn PathFilter>>,
}

impl<'r> ChangeWalker<'r> {
    /// Walker over `repo` applying `filters` to both paths of every change
    pub fn new(repo: &'r Repository, filters: Vec<Box<dyn PathFilter>>) -> Self {
        Self { repo, filters }
    }

    fn accepts(&self, path: &str) -> bool {
        self.filters.iter().all(|filter| filter.accepts(path))
    }

    /// Visit every change reachable from `reference`, oldest commit first.
    pub fn walk<F>(&self, reference: &str, mut on_change: F) -> Result<WalkSummary>
    where
        F: FnMut(FileChange) -> Result<()>,
    {
        let tip = self
            .repo
            .find_reference(reference)
            .and_then(|r| r.peel_to_commit())
            .map_err(|e| BadcodeError::Vcs {
                message: format!("Cannot resolve {}: {}", reference, e.message()),
                repository: self.repo.path().to_str().map(str::to_string),
                source: Some(e),
            })?;

        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
        revwalk.push(tip.id())?;

        let mut summary = WalkSummary::default();
        for oid in revwalk {
            let commit = self.repo.find_commit(oid?)?;
            let Some(changes) = self.commit_changes(&commit)? else {
                summary.skipped_commits += 1;
                continue;
            };
            summary.commits += 1;
            for change in changes {
                summary.changes += 1;
                on_change(change)?;
            }
        }
        Ok(summary)
    }

    /// Changes of one commit against its first parent.
    ///
    /// Returns `None` for root commits and commits with more than two parents.
    pub fn commit_changes(&self, commit: &Commit<'_>) -> Result<Option<Vec<FileChange>>> {
        let parents = commit.parent_count();
        if parents == 0 || parents > 2 {
            debug!("Skipping commit {} with {} parents", commit.id(), parents);
            return Ok(None);
        }

        let parent = commit.parent(0)?;
        let mut options = DiffOptions::new();
        options.context_lines(0).interhunk_lines(1);
        let mut diff = self.repo.diff_tree_to_tree(
            Some(&parent.tree()?),
            Some(&commit.tree()?),
            Some(&mut options),
        )?;
        diff.find_similar(Some(&mut DiffFindOptions::new()))?;

        let mut changes = Vec::new();
        for index in 0..diff.deltas().len() {
            let Some(delta) = diff.get_delta(index) else {
                continue;
            };
            if delta.status() != Delta::Modified {
                continue;
            }
            let (Some(old_path), Some(new_path)) = (
                delta.old_file().path().and_then(Path::to_str),
                delta.new_file().path().and_then(Path::to_str),
            ) else {
                continue;
            };
            if !self.accepts(old_path) || !self.accepts(new_path) {
                continue;
            }

            let base = BlobRef {
                oid: delta.old_file().id(),
                path: old_path.to_string(),
            };
            let head = BlobRef {
                oid: delta.new_file().id(),
                path: new_path.to_string(),
            };
            let Some(patch) = Patch::from_diff(&diff, index)? else {
                continue;
            };
            let (deleted_lines, added_lines) = changed_lines(&patch)?;
            changes.push(FileChange {
                commit: commit.id(),
                base,
                head,
                deleted_lines,
                added_lines,
            });
        }
        Ok(Some(changes))
    }
}

/// Deleted (old side) and added (new side) line numbers of a patch.
pub fn changed_lines(patch: &Patch<'_>) -> Result<(LineSet, LineSet)> {
    let mut deleted = LineSet::new();
    let mut added = LineSet::new();
    for hunk in 0..patch.num_hunks() {
        for line in 0..patch.num_lines_in_hunk(hunk)? {
            let line = patch.line_in_hunk(hunk, line)?;
            match line.origin() {
                '-' => deleted.extend(line.old_lineno()),
                '+' => added.extend(line.new_lineno()),
                _ => {}
            }
        }
    }
    Ok((deleted, added))
}

/// Line changes between two in-memory revisions of a file.
pub fn diff_buffers(old: &[u8], new: &[u8]) -> Result<(LineSet, LineSet)> {
    let mut options = DiffOptions::new();
    options.context_lines(0).interhunk_lines(1);
    let patch = Patch::from_buffers(old, None, new, None, Some(&mut options))?;
    changed_lines(&patch)
}

/// Blob contents, or `None` when larger than `max_size` bytes.
pub fn read_blob(repo: &Repository, oid: Oid, max_size: usize) -> Result<Option<Vec<u8>>> {
    let blob = repo.find_blob(oid)?;
    if blob.size() > max_size {
        return Ok(None);
    }
    Ok(Some(blob.content().to_vec()))
}

/// Open a local repository, cloning it bare from `url` when missing.
pub fn open_or_clone(path: &Path, url: &str) -> Result<Repository> {
    if path.exists() {
        if !path.is_dir() {
            return Err(BadcodeError::vcs(format!(
                "{} exists but is not a repository directory",
                path.display()
            )));
        }
        return Repository::open(path).map_err(|e| {
            BadcodeError::vcs_in_repo(
                format!("Failed to open repository at {}", path.display()),
                path.display().to_string(),
                e,
            )
        });
    }

    info!("Cloning {} into {}", url, path.display());
    RepoBuilder::new()
        .bare(true)
        .clone(url, path)
        .map_err(|e| BadcodeError::vcs_in_repo(format!("Failed to clone {}", url), url, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn commit_file(repo: &Repository, name: &str, content: &str, message: &str) -> Oid {
        let workdir = repo.workdir().expect("workdir");
        let path = workdir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = git2::Signature::now("Test", "test@example.com").unwrap();
        let parents: Vec<Commit> = repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
    }

    fn head_ref(repo: &Repository) -> String {
        repo.head().unwrap().name().unwrap().to_string()
    }

    #[test]
    fn test_walk_reports_modified_lines() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, "main.go", "a\nb\nc\nd\n", "initial");
        commit_file(&repo, "main.go", "a\nB\nc\nd\ne\n", "edit");

        let walker = ChangeWalker::new(&repo, Vec::new());
        let mut changes = Vec::new();
        let summary = walker
            .walk(&head_ref(&repo), |change| {
                changes.push(change);
                Ok(())
            })
            .unwrap();

        assert_eq!(summary.skipped_commits, 1);
        assert_eq!(summary.commits, 1);
        assert_eq!(changes.len(), 1);
        let change = &changes[0];
        assert_eq!(change.head.path, "main.go");
        assert_eq!(change.deleted_lines.iter().collect::<Vec<_>>(), vec![2]);
        assert_eq!(change.added_lines.iter().collect::<Vec<_>>(), vec![2, 5]);
        assert_ne!(change.base.oid, change.head.oid);
    }

    #[test]
    fn test_filters_skip_paths() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, "vendor/lib.go", "x\n", "vendor");
        commit_file(&repo, "notes.txt", "x\n", "notes");
        commit_file(&repo, "vendor/lib.go", "y\n", "vendor edit");
        commit_file(&repo, "notes.txt", "y\n", "notes edit");

        let filters: Vec<Box<dyn PathFilter>> = vec![
            Box::new(VendorFilter::new(&["vendor/**"]).unwrap()),
            Box::new(LanguageFilter::new(&["go"]).unwrap()),
        ];
        let walker = ChangeWalker::new(&repo, filters);
        let summary = walker.walk(&head_ref(&repo), |_| Ok(())).unwrap();
        assert_eq!(summary.changes, 0);
        assert_eq!(summary.commits, 3);
    }

    #[test]
    fn test_missing_branch_is_vcs_error() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, "main.go", "a\n", "initial");
        let walker = ChangeWalker::new(&repo, Vec::new());
        let err = walker.walk("refs/heads/nope", |_| Ok(())).unwrap_err();
        assert!(matches!(err, BadcodeError::Vcs { .. }));
    }

    #[test]
    fn test_open_rejects_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acme");
        fs::write(&path, "not a repository").unwrap();
        let result = open_or_clone(&path, "https://invalid.example/acme.git");
        assert!(matches!(
            result,
            Err(BadcodeError::Vcs {
                repository: None,
                ..
            })
        ));
    }

    #[test]
    fn test_diff_buffers() {
        let (deleted, added) = diff_buffers(b"one\ntwo\nthree\n", b"one\n2\nthree\nfour\n").unwrap();
        assert_eq!(deleted.iter().collect::<Vec<_>>(), vec![2]);
        assert_eq!(added.iter().collect::<Vec<_>>(), vec![2, 4]);

        let (deleted, added) = diff_buffers(b"", b"new\n").unwrap();
        assert!(deleted.is_empty());
        assert_eq!(added.iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_vendor_filter_patterns() {
        let filter = VendorFilter::new(&["**/vendor/**", "**/*.pb.go"]).unwrap();
        assert!(!filter.accepts("pkg/vendor/x/y.go"));
        assert!(!filter.accepts("api/service.pb.go"));
        assert!(filter.accepts("pkg/server/main.go"));
        assert!(VendorFilter::new(&["[unclosed"]).is_err());
    }

    #[test]
    fn test_read_blob_respects_size() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let oid = repo.blob(b"0123456789").unwrap();
        assert_eq!(read_blob(&repo, oid, 10).unwrap().unwrap().len(), 10);
        assert!(read_blob(&repo, oid, 9).unwrap().is_none());
    }
}
