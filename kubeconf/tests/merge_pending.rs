use std::fs;

use kubeconf::{
    ConfigDir, ContextExtension, Error, MergeOptions, MergeOutcome, NamedExtension, CANONICAL,
};

fn lke(id: u32, server: &str) -> String {
    format!(
        r#"apiVersion: v1
kind: Config
preferences: {{}}
clusters:
- name: lke{id}
  cluster:
    certificate-authority-data: Y2Et
    server: {server}
users:
- name: lke{id}-admin
  user:
    token: token-{id}
contexts:
- name: lke{id}-ctx
  context:
    cluster: lke{id}
    namespace: default
    user: lke{id}-admin
current-context: lke{id}-ctx
"#
    )
}

fn setup() -> (tempfile::TempDir, ConfigDir) {
    let tmp = tempfile::tempdir().unwrap();
    let dir = ConfigDir::open(tmp.path().join(".kube")).unwrap();
    (tmp, dir)
}

fn icon() -> ContextExtension {
    NamedExtension::icon("https://example.com/linode.png")
}

#[test]
fn merges_downloads_into_a_fresh_config() {
    let (_tmp, dir) = setup();
    dir.write_pending("staging", &lke(1, "https://1.example:443")).unwrap();
    dir.write_pending("production", &lke(2, "https://2.example:443")).unwrap();

    let summary = dir
        .merge_pending(&MergeOptions {
            extension: Some(icon()),
            backup: false,
        })
        .unwrap();

    let labels: Vec<_> = summary.merged.iter().map(|m| m.label.as_str()).collect();
    assert_eq!(labels, ["production", "staging"]);
    assert_eq!(summary.removed.len(), 2);
    assert!(summary.not_removed.is_empty());
    assert!(dir.pending().unwrap().is_empty());

    let config = dir.load(CANONICAL).unwrap();
    assert_eq!(config, summary.config);
    assert_eq!(config.clusters.len(), 2);
    assert_eq!(config.users.len(), 2);
    assert_eq!(config.contexts["staging"].cluster, "lke1");
    assert_eq!(config.contexts["production"].cluster, "lke2");
    assert_eq!(config.current_context, "staging");
    assert!(config
        .contexts
        .values()
        .all(|ctx| ctx.extension(NamedExtension::ICON) == Some(&icon())));

    let yaml = fs::read_to_string(dir.root().join(CANONICAL)).unwrap();
    assert!(yaml.contains("icon-url: https://example.com/linode.png"));
}

#[test]
fn rerun_with_the_same_downloads_changes_nothing() {
    let (_tmp, dir) = setup();
    let options = MergeOptions::default();
    dir.write_pending("staging", &lke(1, "https://1.example:443")).unwrap();
    dir.merge_pending(&options).unwrap();
    let first = dir.load(CANONICAL).unwrap();

    dir.write_pending("staging", &lke(1, "https://1.example:443")).unwrap();
    let summary = dir.merge_pending(&options).unwrap();

    assert_eq!(
        summary.merged[0].outcomes,
        [MergeOutcome::SkippedDuplicate {
            name: "staging".into()
        }]
    );
    assert_eq!(dir.load(CANONICAL).unwrap(), first);
}

#[test]
fn recreated_cluster_with_the_same_label_is_added_beside_it() {
    let (_tmp, dir) = setup();
    let options = MergeOptions::default();
    dir.write_pending("staging", &lke(1, "https://1.example:443")).unwrap();
    dir.merge_pending(&options).unwrap();

    dir.write_pending("staging", &lke(7, "https://7.example:443")).unwrap();
    dir.merge_pending(&options).unwrap();

    let config = dir.load(CANONICAL).unwrap();
    let names: Vec<_> = config.contexts.keys().map(String::as_str).collect();
    assert_eq!(names, ["staging", "staging-1"]);
    assert_eq!(config.contexts["staging-1"].cluster, "lke7");
    assert!(config.clusters.contains_key("lke1"));
    assert!(config.clusters.contains_key("lke7"));
}

#[test]
fn existing_contexts_are_kept() {
    let (_tmp, dir) = setup();
    fs::write(
        dir.root().join(CANONICAL),
        r#"apiVersion: v1
kind: Config
clusters:
- name: kind-kind
  cluster:
    server: https://127.0.0.1:6443
    insecure-skip-tls-verify: true
users:
- name: kind-kind
  user:
    exec:
      apiVersion: client.authentication.k8s.io/v1
      command: kind-auth
contexts:
- name: kind-kind
  context:
    cluster: kind-kind
    user: kind-kind
current-context: kind-kind
"#,
    )
    .unwrap();
    dir.write_pending("staging", &lke(1, "https://1.example:443")).unwrap();

    dir.merge_pending(&MergeOptions::default()).unwrap();

    let config = dir.load(CANONICAL).unwrap();
    assert_eq!(config.contexts.len(), 2);
    assert_eq!(config.clusters["kind-kind"].insecure_skip_tls_verify, Some(true));
    assert!(config.users["kind-kind"].exec.is_some());
    assert_eq!(config.current_context, "staging");
}

#[test]
fn malformed_download_stops_before_writing() {
    let (_tmp, dir) = setup();
    fs::write(dir.root().join(CANONICAL), "kind: Config\n").unwrap();
    dir.write_pending("a-good", &lke(1, "https://1.example:443")).unwrap();
    dir.write_pending("b-bad", "clusters: [").unwrap();

    let err = dir.merge_pending(&MergeOptions::default()).unwrap_err();

    assert!(matches!(err, Error::Parse { .. }));
    assert_eq!(
        fs::read_to_string(dir.root().join(CANONICAL)).unwrap(),
        "kind: Config\n"
    );
    assert_eq!(dir.pending().unwrap().len(), 2);
}

#[test]
fn malformed_canonical_config_is_not_replaced() {
    let (_tmp, dir) = setup();
    fs::write(dir.root().join(CANONICAL), "contexts: {broken").unwrap();
    dir.write_pending("staging", &lke(1, "https://1.example:443")).unwrap();

    let err = dir.merge_pending(&MergeOptions::default()).unwrap_err();

    assert!(matches!(err, Error::Parse { .. }));
    assert_eq!(
        fs::read_to_string(dir.root().join(CANONICAL)).unwrap(),
        "contexts: {broken"
    );
}

#[test]
fn nothing_pending_leaves_the_directory_alone() {
    let (_tmp, dir) = setup();

    let summary = dir.merge_pending(&MergeOptions::default()).unwrap();

    assert!(summary.merged.is_empty());
    assert!(!dir.root().join(CANONICAL).exists());
}

#[test]
fn backup_keeps_the_previous_config() {
    let (_tmp, dir) = setup();
    fs::write(dir.root().join(CANONICAL), "kind: Config\n").unwrap();
    dir.write_pending("staging", &lke(1, "https://1.example:443")).unwrap();

    let summary = dir
        .merge_pending(&MergeOptions {
            extension: None,
            backup: true,
        })
        .unwrap();

    let backup = summary.backup.expect("backup path");
    assert_eq!(fs::read_to_string(backup).unwrap(), "kind: Config\n");
    assert_eq!(dir.load(CANONICAL).unwrap().contexts.len(), 1);
}

#[test]
fn top_level_extensions_of_the_existing_config_are_kept() {
    let (_tmp, dir) = setup();
    fs::write(
        dir.root().join(CANONICAL),
        r#"apiVersion: v1
kind: Config
extensions:
- name: my-tool
  extension:
    keep: me
contexts: []
"#,
    )
    .unwrap();
    dir.write_pending("staging", &lke(1, "https://1.example:443")).unwrap();

    dir.merge_pending(&MergeOptions::default()).unwrap();

    let yaml = fs::read_to_string(dir.root().join(CANONICAL)).unwrap();
    assert!(yaml.contains("my-tool"), "{yaml}");
    assert!(yaml.contains("keep: me"), "{yaml}");
    assert!(dir.load(CANONICAL).unwrap().contexts.contains_key("staging"));
}
