//! Integration tests for the curl executor against a live local server.
//!
//! Each test binds a localhost listener on an ephemeral port, answers one
//! canned HTTP response, and runs a real curl command through the
//! executor. They require `curl` on PATH.
//!
//! Run with: `cargo test --test http_executor_test -- --ignored`

use std::io::{Read, Write};
use std::net::TcpListener;
use std::time::Duration;

use testit_grader::executor::{CurlExecutor, TestExecutor};
use testit_grader::testcase::{CommandSpec, ExpectedResponse, ResponseType, TestCase, CURL_TEST};

/// Serves exactly one canned response and returns the URL to hit.
fn serve_once(status_line: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind listener");
    let addr = listener.local_addr().expect("listener has no address");

    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            // Drain the request before answering so curl sees a clean close.
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });

    format!("http://{}/", addr)
}

fn live_case(name: &str, url: &str, response_type: ResponseType) -> TestCase {
    TestCase {
        name: name.to_string(),
        description: None,
        kind: CURL_TEST.to_string(),
        test: CommandSpec {
            command: format!("curl -s {}", url),
            response_type,
            response: ExpectedResponse {
                status: 200,
                body: None,
                json: None,
            },
        },
        public: None,
    }
}

#[tokio::test]
#[ignore] // Requires curl on PATH
async fn text_test_passes_against_a_live_server() {
    let url = serve_once("200 OK", "hello");
    let executor = CurlExecutor::new(Duration::from_secs(10));

    let mut test = live_case("hello", &url, ResponseType::Text);
    test.test.response.body = Some("hello".to_string());

    let result = executor.execute(&test).await.expect("executor failed");
    assert!(result.success, "unexpected failure: {}", result.reason);
    assert_eq!(result.reason, "Test 'hello' Passed");
}

#[tokio::test]
#[ignore] // Requires curl on PATH
async fn json_test_compares_structurally_against_a_live_server() {
    let url = serve_once("200 OK", r#"{"ok": true, "count": 3}"#);
    let executor = CurlExecutor::new(Duration::from_secs(10));

    let mut test = live_case("json", &url, ResponseType::Json);
    test.test.response.json = Some(serde_json::json!({"count": 3, "ok": true}));

    let result = executor.execute(&test).await.expect("executor failed");
    assert!(result.success, "unexpected failure: {}", result.reason);
}

#[tokio::test]
#[ignore] // Requires curl on PATH
async fn status_mismatch_is_reported_from_a_live_server() {
    let url = serve_once("404 Not Found", "missing");
    let executor = CurlExecutor::new(Duration::from_secs(10));

    let mut test = live_case("status", &url, ResponseType::Text);
    test.test.response.body = Some("missing".to_string());

    let result = executor.execute(&test).await.expect("executor failed");
    assert!(!result.success);
    assert_eq!(
        result.reason,
        "Test 'status' failed: Expected status 200, got 404"
    );
}

#[tokio::test]
#[ignore] // Requires curl on PATH
async fn invalid_json_from_a_live_server_is_reported() {
    let url = serve_once("200 OK", "this is not json");
    let executor = CurlExecutor::new(Duration::from_secs(10));

    let mut test = live_case("badjson", &url, ResponseType::Json);
    test.test.response.json = Some(serde_json::json!({}));

    let result = executor.execute(&test).await.expect("executor failed");
    assert!(!result.success);
    assert_eq!(
        result.reason,
        "Test 'badjson' failed: Response body is not valid JSON"
    );
}

#[tokio::test]
#[ignore] // Requires curl on PATH
async fn unreachable_server_is_a_verdict_not_a_crash() {
    // Nothing listens on this port.
    let executor = CurlExecutor::new(Duration::from_secs(10));
    let test = live_case("down", "http://127.0.0.1:1/", ResponseType::Text);

    let result = executor.execute(&test).await.expect("executor failed");
    assert!(!result.success);
    assert!(result.reason.starts_with("Error executing test 'down':"));
}
