//! Purpose: End-to-end tests for the HTTP record service and its client.
//! Exports: None (integration test module).
//! Role: Validate create/list/update/delete and error envelopes across TCP.
//! Invariants: Uses a loopback-only server process per test.
//! Invariants: Bounded waits avoid test flakiness.
//! Invariants: Server processes are cleaned up on drop.
//! Invariants: Server stderr is drained once ready so logging never blocks it.

use msgboard::api::{ApiClient, ErrorKind, RecordUpdate};
use serde_json::{Value, json};
use std::io::Read;
use std::net::TcpListener;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard};
use std::thread::sleep;
use std::time::{Duration, Instant};

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

static SERVER_LOCK: Mutex<()> = Mutex::new(());

struct TestServer {
    child: Child,
    base_url: String,
    _server_guard: MutexGuard<'static, ()>,
}

impl TestServer {
    fn start_memory() -> TestResult<Self> {
        Self::start_with_options("memory", &[])
    }

    fn start_file(path: &Path) -> TestResult<Self> {
        Self::start_with_options(&format!("file:{}", path.display()), &[])
    }

    fn start_with_options(route: &str, extra_args: &[&str]) -> TestResult<Self> {
        let guard = SERVER_LOCK
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let mut last_err: Option<Box<dyn std::error::Error>> = None;
        for _attempt in 0..3 {
            let port = pick_port()?;
            let bind = format!("127.0.0.1:{port}");
            let base_url = format!("http://{bind}");

            let mut child = Command::new(env!("CARGO_BIN_EXE_msgboard"))
                .arg("serve")
                .arg("--bind")
                .arg(&bind)
                .arg("--db")
                .arg(route)
                .args(extra_args)
                .env_remove("MSGBOARD_DB")
                .env_remove("RUST_LOG")
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .spawn()?;

            match wait_for_server(&mut child, &base_url) {
                Ok(()) => {
                    if let Some(mut pipe) = child.stderr.take() {
                        std::thread::spawn(move || {
                            let _ = std::io::copy(&mut pipe, &mut std::io::sink());
                        });
                    }
                    return Ok(Self {
                        child,
                        base_url,
                        _server_guard: guard,
                    });
                }
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    last_err = Some(err);
                    sleep(Duration::from_millis(30));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| "server failed to start".into()))
    }

    fn client(&self) -> TestResult<ApiClient> {
        Ok(ApiClient::new(self.base_url.clone())?)
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }

    /// Sends a raw request and returns the status plus the decoded JSON body.
    fn send(
        &self,
        method: &str,
        endpoint: &str,
        content_type: &str,
        body: &str,
    ) -> TestResult<(u16, Value)> {
        let response = ureq::request(method, &self.url(endpoint))
            .set("Content-Type", content_type)
            .send_string(body);
        let response = match response {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(err) => return Err(err.into()),
        };
        let status = response.status();
        let text = response.into_string()?;
        Ok((status, serde_json::from_str(&text)?))
    }

    fn send_json(&self, method: &str, endpoint: &str, body: Value) -> TestResult<(u16, Value)> {
        self.send(method, endpoint, "application/json", &body.to_string())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[test]
fn write_list_update_delete_flow() -> TestResult<()> {
    let server = TestServer::start_memory()?;
    let client = server.client()?;

    assert!(client.list_records()?.is_empty());

    client.write_record("first")?;
    client.write_record("second")?;
    let records = client.list_records()?;
    let messages: Vec<_> = records.iter().map(|r| r.message.as_str()).collect();
    assert_eq!(messages, ["first", "second"]);
    assert_eq!(records[0].created_at, records[0].updated_at);

    let target = records[0].id.to_string();
    client.update_record(&target, &RecordUpdate::message("edited"))?;
    let records = client.list_records()?;
    assert_eq!(records[0].message, "edited");
    assert_eq!(records[0].created_at.unix_timestamp(), records[0].id.timestamp_seconds() as i64);
    assert!(records[0].updated_at >= records[0].created_at);
    assert_eq!(records[1].message, "second");

    client.delete_record(&target)?;
    let records = client.list_records()?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].message, "second");
    Ok(())
}

#[test]
fn get_data_wraps_records_in_envelope() -> TestResult<()> {
    let server = TestServer::start_memory()?;
    let (status, body) = server.send_json("POST", "write_data", json!({"message": "hi"}))?;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"success": true}));

    let response = ureq::get(&server.url("get_data")).call()?;
    let body: Value = serde_json::from_str(&response.into_string()?)?;
    assert_eq!(body["success"], json!(true));
    let record = &body["data"][0];
    assert_eq!(record["message"], json!("hi"));
    assert_eq!(record["_id"].as_str().map(str::len), Some(24));
    assert!(record["createdAt"].is_string());
    assert_eq!(record["createdAt"], record["updatedAt"]);
    Ok(())
}

#[test]
fn write_rejects_missing_or_empty_message() -> TestResult<()> {
    let server = TestServer::start_memory()?;
    let expected = json!({"success": false, "error": "Invalid input."});

    for body in [json!({}), json!({"message": ""}), json!({"message": null})] {
        let (status, response) = server.send_json("POST", "write_data", body)?;
        assert_eq!(status, 200);
        assert_eq!(response, expected);
    }
    let (status, response) = server.send("POST", "write_data", "application/json", "{not json")?;
    assert_eq!(status, 200);
    assert_eq!(response, expected);

    let err = server.client()?.write_record("").expect_err("empty message");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(server.client()?.list_records()?.is_empty());
    Ok(())
}

#[test]
fn write_accepts_form_bodies() -> TestResult<()> {
    let server = TestServer::start_memory()?;
    let (status, body) = server.send(
        "POST",
        "write_data",
        "application/x-www-form-urlencoded",
        "message=from+a+form",
    )?;
    assert_eq!(status, 200);
    assert_eq!(body["success"], json!(true));
    let records = server.client()?.list_records()?;
    assert_eq!(records[0].message, "from a form");
    Ok(())
}

#[test]
fn delete_is_idempotent_and_reports_bad_ids_raw() -> TestResult<()> {
    let server = TestServer::start_memory()?;
    let client = server.client()?;
    client.write_record("keep")?;

    let (status, body) =
        server.send_json("DELETE", "delete_data", json!({"id": "0123456789abcdef01234567"}))?;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"success": true}));
    assert_eq!(client.list_records()?.len(), 1);

    for id in [json!("nope"), json!("+f".repeat(12))] {
        let (status, body) = server.send_json("DELETE", "delete_data", json!({"id": id}))?;
        assert_eq!(status, 200);
        assert_eq!(body["kind"], json!("Validation"));
        assert_eq!(body["message"], json!("Invalid input."));
        assert!(body.get("success").is_none());
    }

    let (status, body) = server.send_json("DELETE", "delete_data", json!({}))?;
    assert_eq!(status, 200);
    assert_eq!(body["message"], json!("Invalid input."));

    let err = client.delete_record("nope").expect_err("bad id");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(client.list_records()?.len(), 1);
    Ok(())
}

#[test]
fn update_edge_cases() -> TestResult<()> {
    let server = TestServer::start_memory()?;
    let client = server.client()?;
    client.write_record("original")?;
    let before = client.list_records()?.remove(0);
    let id = before.id.to_string();

    // Unknown id matches nothing and still succeeds.
    let (status, body) = server.send_json(
        "POST",
        "update_data",
        json!({"id": "ffffffffffffffffffffffff", "update": {"message": "x"}}),
    )?;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"success": true}));

    // Empty update leaves the record untouched.
    let (status, _) =
        server.send_json("POST", "update_data", json!({"_id": id, "update": {}}))?;
    assert_eq!(status, 200);
    let after = client.list_records()?.remove(0);
    assert_eq!(after, before);

    for body in [
        json!({"update": {"message": "x"}}),
        json!({"id": "42", "update": {"message": "x"}}),
        json!({"id": "+f".repeat(12), "update": {"message": "x"}}),
    ] {
        let (status, response) = server.send_json("POST", "update_data", body)?;
        assert_eq!(status, 200);
        assert_eq!(response, json!({"success": false, "error": "Invalid input."}));
    }
    assert_eq!(client.list_records()?.remove(0), before);
    Ok(())
}

#[test]
fn oversized_body_is_rejected_as_invalid_input() -> TestResult<()> {
    let server = TestServer::start_with_options("memory", &["--max-body-bytes", "64"])?;
    let message = "x".repeat(200);

    let (status, body) = server.send_json("POST", "write_data", json!({"message": message}))?;
    assert_eq!(status, 413);
    assert_eq!(body, json!({"success": false, "error": "Invalid input."}));

    let (status, body) = server.send_json("DELETE", "delete_data", json!({"id": message}))?;
    assert_eq!(status, 413);
    assert_eq!(body["message"], json!("Invalid input."));

    server.client()?.write_record("small")?;
    assert_eq!(server.client()?.list_records()?.len(), 1);
    Ok(())
}

#[test]
fn file_store_persists_across_restart() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    let path = temp.path().join("records.jsonl");

    let server = TestServer::start_file(&path)?;
    server.client()?.write_record("durable")?;
    drop(server);

    let server = TestServer::start_file(&path)?;
    let records = server.client()?.list_records()?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].message, "durable");
    Ok(())
}

#[test]
fn client_reports_transport_failure() -> TestResult<()> {
    let port = pick_port()?;
    let client = ApiClient::new(format!("http://127.0.0.1:{port}"))?;
    let err = client.list_records().expect_err("nothing listening");
    assert_eq!(err.kind(), ErrorKind::Io);
    Ok(())
}

fn pick_port() -> TestResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

fn wait_for_server(child: &mut Child, base_url: &str) -> TestResult<()> {
    let client = ApiClient::new(base_url.to_string())?;
    let start = Instant::now();
    loop {
        if client.health().is_ok() {
            return Ok(());
        }
        if let Some(status) = child.try_wait()? {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            let detail = stderr.trim();
            return Err(format!(
                "server exited before ready (status: {status}, stderr: {})",
                if detail.is_empty() { "<empty>" } else { detail }
            )
            .into());
        }
        if start.elapsed() > Duration::from_secs(8) {
            return Err("server did not start in time".into());
        }
        sleep(Duration::from_millis(20));
    }
}
