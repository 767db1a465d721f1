use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use git2::{CredentialType, Repository};
use pipeline::{
    BranchName, DispatchError, ErrorCategory, FetchCredentials, FetchLocation, SecretString,
};

use super::*;

fn credentials() -> FetchCredentials {
    FetchCredentials {
        username: pipeline::TOKEN_USERNAME.to_owned(),
        token: SecretString::new("ghs_s3cr3t").unwrap(),
    }
}

fn missing_repo_url(root: &Path) -> String {
    format!("file://{}", root.join("does-not-exist").display())
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap().trim().to_owned()
}

fn commit_file(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
    git(dir, &["add", name]);
    git(dir, &["commit", "-q", "-m", name]);
}

/// A `git daemon` serving one fixture repository named `fixture`.
///
/// libgit2's local transport cannot do shallow fetches, so clones go over
/// `git://`.
struct ServedRepo {
    daemon: Child,
    port: u16,
    feature_tip: String,
    _root: tempfile::TempDir,
}

impl ServedRepo {
    /// Branches: `main` (one commit), `other` (off main), `feature-x` (two
    /// commits ahead of main).
    fn start() -> Self {
        let root = tempfile::tempdir().unwrap();
        let repo = root.path().join("fixture");
        std::fs::create_dir(&repo).unwrap();
        git(&repo, &["init", "-q"]);
        git(&repo, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(&repo, &["config", "user.email", "test@example.com"]);
        git(&repo, &["config", "user.name", "Test User"]);
        commit_file(&repo, "README.md", "fixture");
        git(&repo, &["checkout", "-q", "-b", "other"]);
        commit_file(&repo, "other.txt", "other");
        git(&repo, &["checkout", "-q", "main"]);
        git(&repo, &["checkout", "-q", "-b", "feature-x"]);
        commit_file(&repo, "feature.txt", "feature");
        commit_file(&repo, "cloudbuild.yaml", "steps: [{name: alpine}]\n");
        let feature_tip = git(&repo, &["rev-parse", "HEAD"]);
        git(&repo, &["checkout", "-q", "main"]);

        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let daemon = Command::new("git")
            .arg("daemon")
            .arg("--reuseaddr")
            .arg("--export-all")
            .arg("--listen=127.0.0.1")
            .arg(format!("--port={port}"))
            .arg(format!("--base-path={}", root.path().display()))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to start git daemon");

        for _ in 0..50 {
            if TcpStream::connect(("127.0.0.1", port)).is_ok() {
                break;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        Self {
            daemon,
            port,
            feature_tip,
            _root: root,
        }
    }

    fn url(&self) -> String {
        format!("git://127.0.0.1:{}/fixture", self.port)
    }
}

impl Drop for ServedRepo {
    fn drop(&mut self) {
        let _ = self.daemon.kill();
        let _ = self.daemon.wait();
    }
}

fn reference_names(repo: &Repository) -> Vec<String> {
    repo.references()
        .unwrap()
        .filter_map(|r| r.ok().and_then(|r| r.name().map(str::to_owned)))
        .collect()
}

#[test]
fn token_credentials_are_offered_for_plaintext_auth() {
    let cred = token_credentials(&credentials(), CredentialType::USER_PASS_PLAINTEXT).unwrap();
    assert!(cred.has_username());
}

#[test]
fn token_credentials_refuse_other_auth_schemes() {
    assert!(token_credentials(&credentials(), CredentialType::SSH_KEY).is_err());
}

#[test]
fn cloning_a_missing_repository_is_a_fetch_error() {
    let root = tempfile::tempdir().unwrap();
    let dest = root.path().join("checkout");
    let location = FetchLocation::public(
        missing_repo_url(root.path()),
        BranchName::new("feature-x").unwrap(),
    );

    let err = shallow_clone(&location, &dest).unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Transport);
    match err {
        DispatchError::Fetch { url, reference, .. } => {
            assert_eq!(url, location.url());
            assert_eq!(reference.as_str(), "feature-x");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn fetch_failure_does_not_leak_the_token() {
    let root = tempfile::tempdir().unwrap();
    let dest = root.path().join("checkout");
    let location = FetchLocation::authenticated(
        missing_repo_url(root.path()),
        BranchName::new("main").unwrap(),
        credentials(),
    );

    let err = GitFetcher::new().fetch(&location, &dest).await.unwrap_err();

    assert!(matches!(err, DispatchError::Fetch { .. }));
    assert!(!err.to_string().contains("ghs_s3cr3t"));
    assert!(!format!("{err:?}").contains("ghs_s3cr3t"));
}

#[test]
fn refspec_maps_only_the_named_branch() {
    let branch = BranchName::new("feature-x").unwrap();
    assert_eq!(
        single_branch_refspec(&branch, "origin"),
        "+refs/heads/feature-x:refs/remotes/origin/feature-x"
    );
}

#[tokio::test]
async fn clone_is_shallow_and_limited_to_the_head_branch() {
    let served = ServedRepo::start();
    let dest = tempfile::tempdir().unwrap();
    let location = FetchLocation::public(served.url(), BranchName::new("feature-x").unwrap());

    GitFetcher::new().fetch(&location, dest.path()).await.unwrap();

    let repo = Repository::open(dest.path()).unwrap();
    assert!(repo.is_shallow());
    let head = repo.head().unwrap();
    assert_eq!(head.shorthand(), Some("feature-x"));
    assert_eq!(head.target().unwrap().to_string(), served.feature_tip);
    assert!(dest.path().join("cloudbuild.yaml").exists());
    assert!(!dest.path().join("other.txt").exists());

    let names = reference_names(&repo);
    assert!(names.contains(&"refs/remotes/origin/feature-x".to_owned()));
    assert!(
        !names
            .iter()
            .any(|n| n.ends_with("/main") || n.ends_with("/other")),
        "unexpected refs: {names:?}"
    );
}

#[tokio::test]
async fn cloning_an_unknown_branch_is_a_fetch_error() {
    let served = ServedRepo::start();
    let dest = tempfile::tempdir().unwrap();
    let location = FetchLocation::public(served.url(), BranchName::new("gone").unwrap());

    let err = GitFetcher::new().fetch(&location, dest.path()).await.unwrap_err();

    assert_eq!(err.stage(), pipeline::Stage::Fetch);
    match err {
        DispatchError::Fetch { reference, .. } => assert_eq!(reference.as_str(), "gone"),
        other => panic!("unexpected error: {other:?}"),
    }
}
