//! Purpose: End-to-end tests for the ureq transport against a loopback HTTP server.
//! Exports: None (integration test module).
//! Role: Validate request shape on the wire (method, route, query, headers, body) and status handling.
//! Invariants: The server answers scripted responses in order, one connection per request.
//! Invariants: Loopback-only; the OS picks the port.

use algorithmia::api::{
    AlgorithmOutput, Client, ErrorKind, InvocationOptions, OutputMode, ReadAcl,
};
use serde_json::{Value, json};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Clone, Debug)]
struct RecordedRequest {
    method: String,
    target: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl RecordedRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

struct Scripted {
    status: u16,
    body: Vec<u8>,
}

fn reply(status: u16, body: impl Into<Vec<u8>>) -> Scripted {
    Scripted {
        status,
        body: body.into(),
    }
}

struct TestServer {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl TestServer {
    fn start(script: Vec<Scripted>) -> TestResult<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let listener = TcpListener::bind("127.0.0.1:0")?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        thread::spawn(move || {
            for scripted in script {
                let Ok((stream, _)) = listener.accept() else {
                    return;
                };
                if serve_one(stream, &scripted, &recorded).is_err() {
                    return;
                }
            }
        });
        Ok(Self { base_url, requests })
    }

    fn client(&self, api_key: &str) -> TestResult<Client> {
        Ok(Client::with_address(api_key, self.base_url.clone())?)
    }

    fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }
}

fn serve_one(
    stream: TcpStream,
    scripted: &Scripted,
    recorded: &Mutex<Vec<RecordedRequest>>,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }
    let length = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body)?;

    let is_head = method == "HEAD";
    recorded
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
        .push(RecordedRequest {
            method,
            target,
            headers,
            body,
        });

    let mut stream = stream;
    let payload: &[u8] = if is_head { &[] } else { &scripted.body };
    write!(
        stream,
        "HTTP/1.1 {} Scripted\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        scripted.status,
        payload.len()
    )?;
    stream.write_all(payload)?;
    stream.flush()
}

#[test]
fn algorithm_call_sends_options_and_decodes_result() -> TestResult<()> {
    let server = TestServer::start(vec![reply(
        200,
        r#"{"result":"Hello 1","metadata":{"content_type":"text","duration":0.01}}"#,
    )])?;
    let client = server.client("simABCD")?;

    let response = client.algo("algo://demo/hello")?.pipe("1")?;
    assert_eq!(response.result, Some(AlgorithmOutput::Json(json!("Hello 1"))));
    let metadata = response.metadata.expect("metadata");
    assert_eq!(metadata.content_type, "text");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(
        request.target,
        "/v1/algo/demo/hello?timeout=300&stdout=false&output=default"
    );
    assert_eq!(request.header("Authorization"), Some("simABCD"));
    assert_eq!(request.header("Content-Type"), Some("application/json"));
    assert_eq!(request.body, b"\"1\"");
    Ok(())
}

#[test]
fn error_status_reaches_envelope_layer() -> TestResult<()> {
    let server = TestServer::start(vec![
        reply(401, r#"{"error":{"message":"authorization required"}}"#),
        reply(500, "<html>oops</html>"),
    ])?;
    let client = server.client("")?;
    let algo = client.algo("demo/hello")?;

    let err = algo.pipe(json!(1)).expect_err("unauthenticated");
    assert_eq!(err.kind(), ErrorKind::Algorithm);
    assert_eq!(
        err.message(),
        Some("Algorithm call failed - reason: authorization required")
    );
    assert_eq!(err.status(), Some(401));

    let err = algo.pipe(Value::Null).expect_err("server error");
    assert_eq!(err.kind(), ErrorKind::Platform);
    assert_eq!(err.message(), Some("Algorithm call failed"));

    let requests = server.requests();
    assert_eq!(requests[0].header("Authorization"), None);
    Ok(())
}

#[test]
fn raw_output_with_binary_input() -> TestResult<()> {
    let server = TestServer::start(vec![reply(200, vec![0xdeu8, 0xad, 0xbe, 0xef])])?;
    let client = server.client("key")?;
    let algo = client.algo("demo/bytes")?.with_options(
        InvocationOptions::new()
            .with_output(OutputMode::Raw)
            .with_timeout(10)
            .with_extra("callback", "a b"),
    );

    let response = algo.pipe(vec![1u8, 2, 3])?;
    assert_eq!(
        response.result,
        Some(AlgorithmOutput::Bytes(vec![0xde, 0xad, 0xbe, 0xef]))
    );

    let requests = server.requests();
    let request = &requests[0];
    assert_eq!(
        request.target,
        "/v1/algo/demo/bytes?callback=a+b&timeout=10&stdout=false&output=raw"
    );
    assert_eq!(
        request.header("Content-Type"),
        Some("application/octet-stream")
    );
    assert_eq!(request.body, vec![1u8, 2, 3]);
    Ok(())
}

#[test]
fn data_file_lifecycle() -> TestResult<()> {
    let server = TestServer::start(vec![
        reply(404, ""),
        reply(200, ""),
        reply(200, "contents"),
        reply(200, ""),
    ])?;
    let client = server.client("key")?;
    let file = client.file("data://.my/dir/note.txt")?;

    assert!(!file.exists()?);
    file.put_string("contents")?;
    assert_eq!(file.get_string()?, "contents");
    file.delete()?;

    let requests = server.requests();
    let summary: Vec<_> = requests
        .iter()
        .map(|r| (r.method.as_str(), r.target.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("HEAD", "/v1/data/.my/dir/note.txt"),
            ("PUT", "/v1/data/.my/dir/note.txt"),
            ("GET", "/v1/data/.my/dir/note.txt"),
            ("DELETE", "/v1/data/.my/dir/note.txt"),
        ]
    );
    assert_eq!(requests[1].body, b"contents");
    Ok(())
}

#[test]
fn directory_acl_and_listing_over_http() -> TestResult<()> {
    let server = TestServer::start(vec![
        reply(200, "{}"),
        reply(200, r#"{"acl":{"read":["user://*"]}}"#),
        reply(
            200,
            r#"{"folders":[{"name":"child"}],"files":[{"filename":"a.txt","size":3,"last_modified":"2016-01-01T00:00:00.000Z"}],"marker":"next page"}"#,
        ),
        reply(200, r#"{"files":[],"folders":[]}"#),
    ])?;
    let client = server.client("key")?;
    let dir = client.dir("data://.my/shared/")?;

    dir.create(Some(ReadAcl::Public))?;
    assert_eq!(dir.permissions()?, Some(ReadAcl::Public));
    let files = dir.files().collect::<Result<Vec<_>, _>>()?;
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name(), "a.txt");
    assert_eq!(files[0].size(), Some(3));

    let requests = server.requests();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].target, "/v1/data/.my");
    let created: Value = serde_json::from_slice(&requests[0].body)?;
    assert_eq!(created, json!({"name": "shared", "acl": {"read": ["user://*"]}}));
    assert_eq!(requests[1].target, "/v1/data/.my/shared?acl=true");
    assert_eq!(requests[2].target, "/v1/data/.my/shared");
    assert_eq!(requests[3].target, "/v1/data/.my/shared?marker=next+page");
    Ok(())
}

#[test]
fn connection_refused_is_io_error() -> TestResult<()> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let address = format!("http://{}", listener.local_addr()?);
    drop(listener);

    let client = Client::with_address("key", address)?;
    let err = client.file(".my/any")?.get_bytes().expect_err("refused");
    assert_eq!(err.kind(), ErrorKind::Io);
    Ok(())
}
