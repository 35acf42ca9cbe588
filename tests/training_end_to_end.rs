use std::fs;
use std::path::Path;
use std::sync::Arc;

use badcode_rs::api::review::{ReviewFile, ReviewRequest, Reviewer};
use badcode_rs::core::pipeline::PipelineStage;
use badcode_rs::io::persistence::load_stats;
use badcode_rs::{BadcodeConfig, Trainer, TreeSitterParseService};
use git2::{Commit, Repository, Signature};

fn commit_file(repo: &Repository, name: &str, content: &str) {
    let path = repo.workdir().unwrap().join(name);
    fs::write(&path, content).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new(name)).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = Signature::now("Dev", "dev@example.com").unwrap();
    let parents: Vec<Commit> = repo
        .head()
        .ok()
        .and_then(|head| head.peel_to_commit().ok())
        .into_iter()
        .collect();
    let parent_refs: Vec<&Commit> = parents.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, "update", &tree, &parent_refs)
        .unwrap();
}

fn go_source(statement: &str) -> String {
    format!("package main\n\nfunc run(e error) {{\n\t{statement}\n}}\n")
}

/// Repository whose history replaces `panic(<arg>)` with a log call.
fn fixture_repository(path: &Path, arg: &str) -> String {
    fs::create_dir_all(path).unwrap();
    let repo = Repository::init(path).unwrap();
    commit_file(&repo, "main.go", &go_source(&format!("panic({arg})")));
    commit_file(&repo, "main.go", &go_source(&format!("log({arg})")));
    let head = repo.head().unwrap();
    head.name().unwrap().to_string()
}

#[test]
fn train_then_review_flags_deleted_pattern() {
    let data = tempfile::tempdir().unwrap();
    let mut config = BadcodeConfig::default();
    config.io.data_dir = data.path().to_path_buf();
    config.mining.repository_workers = 2;
    config.mining.change_workers = 2;
    config.postprocess.min_score = 0.0;

    let branch = fixture_repository(&config.io.repo_path("acme/one"), "errA");
    fixture_repository(&config.io.repo_path("acme/two"), "errB");
    config.mining.branch = branch;

    let repositories = vec!["acme/one".to_string(), "acme/two".to_string()];
    let trainer = Trainer::new(config.clone(), Arc::new(TreeSitterParseService::new()));
    let (patterns, report) = trainer.train(&repositories).unwrap();

    for name in &repositories {
        assert!(config.io.repo_stats_path(name).exists());
    }
    let global = config.io.global_stats_path();
    for stage in PipelineStage::ALL {
        assert!(stage.path_for(&global).exists(), "missing {stage} stage");
    }

    let generalization = report.generalization.expect("merged stage ran");
    assert!(generalization.patterns >= 1);
    assert!(patterns.totals().keys().any(|tree| tree.has_wildcards()));
    assert_eq!(load_stats(&global).unwrap().repository_count(), 2);

    let model = PipelineStage::Pruned.path_for(&global);
    let reviewer =
        Reviewer::load(&config, &model, Arc::new(TreeSitterParseService::new())).unwrap();
    let response = reviewer.review(&ReviewRequest {
        files: vec![ReviewFile {
            path: "service.go".to_string(),
            base: Some(go_source("log(cause)")),
            head: go_source("panic(cause)"),
        }],
    });

    assert!(
        response
            .comments
            .iter()
            .any(|comment| comment.file == "service.go" && comment.line == 4),
        "{:?}",
        response.comments
    );
}

#[test]
fn training_twice_reuses_every_stage() {
    let data = tempfile::tempdir().unwrap();
    let mut config = BadcodeConfig::default();
    config.io.data_dir = data.path().to_path_buf();
    config.mining.repository_workers = 1;
    config.mining.branch = fixture_repository(&config.io.repo_path("acme/one"), "err");

    let repositories = vec!["acme/one".to_string()];
    let parser = Arc::new(TreeSitterParseService::new());
    Trainer::new(config.clone(), parser.clone())
        .train(&repositories)
        .unwrap();
    let (_, report) = Trainer::new(config, parser).train(&repositories).unwrap();

    assert!(report.computed.is_empty());
    assert_eq!(report.skipped.len(), 3);
}
