use clap::Parser;
use machtiani::app::App;
use machtiani::cli::Cli;
use machtiani::config::Config;
use machtiani::terminal::{Console, SharedBuffer};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GREETING_PATCH: &str = "diff --git a/greeting.txt b/greeting.txt
--- a/greeting.txt
+++ b/greeting.txt
@@ -1,2 +1,2 @@
 hello
-world
+there
";

fn run_git(path: &Path, args: &[&str]) {
    let output = Command::new("git")
        .current_dir(path)
        .args(args)
        .output()
        .expect("run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// A working tree whose `origin` is a bare repository next to it, with the
/// seed commit already pushed.
struct Project {
    _temp: TempDir,
    dir: PathBuf,
    remote: String,
}

impl Project {
    fn path(&self) -> &Path {
        &self.dir
    }
}

fn init_project() -> Project {
    let temp = TempDir::new().expect("temp dir");
    let bare = temp.path().join("widgets.git");
    let dir = temp.path().join("work");
    fs::create_dir(&dir).expect("work dir");
    let remote = bare.to_str().expect("utf-8 temp path").to_string();

    run_git(temp.path(), &["init", "--bare", remote.as_str()]);
    run_git(&dir, &["init"]);
    run_git(&dir, &["config", "user.email", "mct@example.com"]);
    run_git(&dir, &["config", "user.name", "mct test"]);
    run_git(&dir, &["remote", "add", "origin", remote.as_str()]);
    fs::write(dir.join("greeting.txt"), "hello\nworld\n").expect("seed file");
    run_git(&dir, &["add", "greeting.txt"]);
    run_git(&dir, &["commit", "-m", "seed"]);
    run_git(&dir, &["push", "origin", "HEAD:refs/heads/main"]);
    Project {
        _temp: temp,
        dir,
        remote,
    }
}

fn commit_local_only(project: &Project) {
    fs::write(project.path().join("local.txt"), "unpushed\n").expect("write");
    run_git(project.path(), &["add", "local.txt"]);
    run_git(project.path(), &["commit", "-m", "not pushed"]);
}

fn app_for(server: &MockServer, project: &Path) -> (App, SharedBuffer) {
    let config = Config {
        model_api_key: "sk-test".to_string(),
        model_api_key_other: String::new(),
        model_base_url: "https://api.openai.com/v1".to_string(),
        model_base_url_other: String::new(),
        machtiani_url: server.uri(),
        repo_manager_url: server.uri(),
        code_host_url: String::new(),
        code_host_api_key: None,
        api_gateway_host_key: "X-RapidAPI-Key".to_string(),
        api_gateway_host_value: None,
        working_dir: project.to_path_buf(),
    };
    let (console, output) = Console::capture();
    (App::new(config, console).expect("app"), output)
}

fn stream_body() -> String {
    [
        json!({"token": "Changing the greeting.\n\n"}),
        json!({"retrieved_file_paths": ["greeting.txt"]}),
        json!({"event": "file_edit_start"}),
        json!({"updated_file_contents": {
            "greeting.txt": {"updated_content": GREETING_PATCH, "errors": []}
        }}),
        json!({"new_files": {"new_content": {"docs/notes.md": "# Notes\n"}}}),
    ]
    .iter()
    .map(|value| value.to_string())
    .collect()
}

#[tokio::test]
async fn test_default_mode_applies_patches_and_saves_chat() {
    let project = init_project();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate-response/"))
        .and(body_partial_json(json!({
            "prompt": "update greeting",
            "project": project.remote,
            "mode": "default",
            "match_strength": "mid"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(stream_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/generate-filename"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"{"filename":"greeting-change"}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let (app, output) = app_for(&server, project.path());
    let cli = Cli::try_parse_from(["mct", "update", "greeting"]).expect("parse");
    app.run(cli).await.expect("prompt workflow");

    let dir = project.path();
    assert_eq!(
        fs::read_to_string(dir.join("greeting.txt")).unwrap(),
        "hello\nthere\n"
    );
    assert_eq!(
        fs::read_to_string(dir.join("docs/notes.md")).unwrap(),
        "# Notes\n"
    );

    let saved = fs::read_to_string(dir.join(".machtiani/chat/greeting-change.md")).unwrap();
    assert!(saved.starts_with("# User\n\nupdate greeting\n\n# Assistant\n\nChanging the greeting."));
    assert!(saved.ends_with("# Retrieved File Paths\n\n- greeting.txt\n"));

    let printed = output.contents();
    let order = [
        "Using remote URL: ",
        project.remote.as_str(),
        "Changing the greeting.",
        "→ waiting on file‑edits …",
        "Suggested new files:\n- docs/notes.md",
        "Writing & Applying File Patches",
        "Wrote patch for greeting.txt to ",
        "Applied 1 patch file(s), 0 failed",
        "Writing New Files",
        "- Created docs/notes.md",
        "Saving Chat Response",
        "Response saved to ",
        "Total response handling took",
    ];
    let mut cursor = 0;
    for needle in order {
        let found = printed[cursor..]
            .find(needle)
            .unwrap_or_else(|| panic!("{needle:?} missing or out of order in {printed:?}"));
        cursor += found + needle.len();
    }
}

#[tokio::test]
async fn test_answer_only_prints_bare_transcript_and_touches_nothing() {
    let project = init_project();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate-response/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(stream_body()))
        .mount(&server)
        .await;

    let (app, output) = app_for(&server, project.path());
    let cli = Cli::try_parse_from(["mct", "update", "greeting", "--mode", "answer-only"])
        .expect("parse");
    app.run(cli).await.expect("prompt workflow");

    assert_eq!(
        output.contents(),
        "update greetingChanging the greeting.\n\n\n\n---\n\n# Retrieved File Paths\n\n- greeting.txt\n\n"
    );
    let dir = project.path();
    assert_eq!(
        fs::read_to_string(dir.join("greeting.txt")).unwrap(),
        "hello\nworld\n"
    );
    assert!(!dir.join("docs/notes.md").exists());
    assert!(!dir.join(".machtiani").exists());
}

#[tokio::test]
async fn test_chat_mode_saves_without_materializing() {
    let project = init_project();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate-response/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(stream_body()))
        .mount(&server)
        .await;

    let prompt_file = project.path().join("question.draft.md");
    fs::write(&prompt_file, "# User\n\nupdate greeting").unwrap();
    let (app, output) = app_for(&server, project.path());
    let cli = Cli::try_parse_from([
        "mct",
        "--mode",
        "chat",
        "--file",
        prompt_file.to_str().unwrap(),
    ])
    .expect("parse");
    app.run(cli).await.expect("prompt workflow");

    let dir = project.path();
    assert!(dir.join(".machtiani/chat/question.md").exists());
    assert!(!dir.join(".machtiani/patches").exists());
    assert!(!dir.join("docs/notes.md").exists());
    assert!(!output.contents().contains("Writing & Applying File Patches"));
}

#[tokio::test]
async fn test_status_reports_ready() {
    let project = init_project();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"lock_file_present":false,"lock_time_duration":0,"error_logs":""}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let (app, output) = app_for(&server, project.path());
    let cli = Cli::try_parse_from(["mct", "status"]).expect("parse");
    app.run(cli).await.expect("status");
    assert_eq!(output.contents(), "Project is ready for chat!\n");
}

#[tokio::test]
async fn test_forced_sync_of_known_repository() {
    let project = init_project();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"lock_file_present":false,"lock_time_duration":0,"error_logs":""}"#,
            "application/json",
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/fetch-and-checkout/"))
        .and(body_partial_json(json!({
            "project_name": project.remote,
            "vcs_type": "git",
            "amplification_level": "mid",
            "depth_level": 25
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"message":"synced","branch_name":"main","project_name":"https://github.com/acme/widgets"}"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let (app, output) = app_for(&server, project.path());
    let cli = Cli::try_parse_from(["mct", "sync", "--force", "--amplify", "mid", "--depth", "25"])
        .expect("parse");
    app.run(cli).await.expect("sync");

    assert!(output
        .contents()
        .contains("Successfully synced 'main' branch of widgets to the chat service\n - service message: synced"));
}

#[tokio::test]
async fn test_sync_cost_only_for_new_repository() {
    let project = init_project();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(404).set_body_string(
            r#"{"detail":"repository does not exist"}"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/add-repository/token-count"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"embedding_tokens":10,"inference_tokens":1234567}"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let (app, output) = app_for(&server, project.path());
    let cli = Cli::try_parse_from(["mct", "sync", "--cost-only"]).expect("parse");
    app.run(cli).await.expect("sync");

    let printed = output.contents();
    assert!(printed.contains("Repository not found on Machtiani. Preparing for initial sync."));
    assert!(printed.contains("No files to ignore."));
    assert!(printed.contains("Estimated tokens: 1,234,567"));
    assert!(printed.ends_with("Cost estimation complete. Exiting as requested by --cost-only.\n"));
}

#[tokio::test]
async fn test_sync_refuses_head_missing_from_remote() {
    let project = init_project();
    commit_local_only(&project);
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (app, _output) = app_for(&server, project.path());
    let cli = Cli::try_parse_from(["mct", "sync", "--cost-only"]).expect("parse");
    let error = app.run(cli).await.unwrap_err();

    let message = error.to_string();
    assert!(message.starts_with("Validation failed: local commit "));
    assert!(message.ends_with(
        "does not exist on any origin branch. Use --force to bypass this validation."
    ));
}

#[tokio::test]
async fn test_forced_sync_warns_about_head_missing_from_remote() {
    let project = init_project();
    commit_local_only(&project);
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"lock_file_present":false,"lock_time_duration":0,"error_logs":""}"#,
            "application/json",
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/fetch-and-checkout/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"message":"synced","branch_name":"main","project_name":"widgets"}"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let (app, output) = app_for(&server, project.path());
    let cli = Cli::try_parse_from(["mct", "sync", "--force"]).expect("parse");
    app.run(cli).await.expect("sync");

    let printed = output.contents();
    assert!(printed.contains(
        "does not exist on any origin branch. Proceeding anyway due to --force flag.\n"
    ));
    assert!(printed.contains("Successfully synced 'main' branch of widgets"));
}
