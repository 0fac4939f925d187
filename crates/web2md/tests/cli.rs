use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = r#"<html><head><title>Example Title</title></head>
<body><article>
<p>Readers often ask how the example works, so this paragraph explains it in plain words.</p>
<p>It also shows <b>bold text</b> and a closing remark, which keeps the article long enough.</p>
</article></body></html>"#;

async fn serve(status: u16, body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(
            ResponseTemplate::new(status).set_body_raw(body.to_string(), "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;
    server
}

async fn web2md(args: Vec<String>) -> Output {
    tokio::task::spawn_blocking(move || {
        Command::new(env!("CARGO_BIN_EXE_web2md"))
            .args(&args)
            .output()
            .expect("binary runs")
    })
    .await
    .expect("join")
}

fn args(url: String, out: &Path) -> Vec<String> {
    vec![
        "-u".to_string(),
        url,
        "-o".to_string(),
        out.display().to_string(),
        "-q".to_string(),
    ]
}

#[tokio::test]
async fn successful_run_exits_zero_and_writes_markdown() {
    let server = serve(200, PAGE).await;
    let temp = tempfile::TempDir::new().unwrap();
    let out = temp.path().join("notes");

    let output = web2md(args(format!("{}/article", server.uri()), &out)).await;

    assert_eq!(output.status.code(), Some(0));
    let written = fs::read_to_string(out.join("Example_Title.md")).unwrap();
    assert!(written.starts_with("# Example Title\n\n"));
    assert!(written.contains("**bold text**"));
}

#[tokio::test]
async fn http_failure_exits_one_with_diagnostic() {
    let server = serve(404, "<html><body>Not here</body></html>").await;
    let temp = tempfile::TempDir::new().unwrap();
    let out = temp.path().join("notes");

    let output = web2md(args(format!("{}/article", server.uri()), &out)).await;

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("An error occurred:"));
    assert!(stderr.contains("HTTP Error: 404"));
    assert!(!out.exists());
}

#[tokio::test]
async fn missing_arguments_are_a_usage_error() {
    let output = web2md(vec!["-u".to_string(), "https://example.com".to_string()]).await;

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--output-dir"));
}
