use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::compose::Ranch;
use crate::config::Config;
use crate::request::SubmitPayload;
use crate::status::RequestRecord;

#[async_trait]
pub trait TestingFarmGateway: Send + Sync {
    async fn submit_request(&self, payload: &SubmitPayload) -> Result<Value>;
    async fn list_composes(&self, ranch: Ranch) -> Result<Vec<String>>;
    async fn get_request(&self, request_id: &str) -> Result<RequestRecord>;
}

#[derive(Debug, Clone)]
pub struct TestingFarmClient {
    http: reqwest::Client,
    api_url: String,
    api_token: String,
}

#[derive(Debug, Deserialize)]
struct ComposesEnvelope {
    composes: Vec<ComposeEntry>,
}

#[derive(Debug, Deserialize)]
struct ComposeEntry {
    name: String,
}

impl TestingFarmClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed building testing farm http client")?;
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            api_token: config.api_token.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.api_url)
    }
}

#[async_trait]
impl TestingFarmGateway for TestingFarmClient {
    async fn submit_request(&self, payload: &SubmitPayload) -> Result<Value> {
        let response = self
            .http
            .post(self.endpoint("requests"))
            .bearer_auth(&self.api_token)
            .json(payload)
            .send()
            .await
            .context("submit request to testing farm failed")?;

        let status = response.status();
        if !status.is_success() {
            debug!("testing farm rejected submission (status={status})");
        }

        // Testing Farm encodes some rejections as 4xx/5xx with a JSON
        // diagnostic body; that diagnostic is the result callers want.
        response
            .json::<Value>()
            .await
            .with_context(|| format!("submit response was not JSON (status={status})"))
    }

    async fn list_composes(&self, ranch: Ranch) -> Result<Vec<String>> {
        let response = self
            .http
            .get(self.endpoint(&format!("composes/{}", ranch.as_str())))
            .bearer_auth(&self.api_token)
            .send()
            .await
            .context("list composes from testing farm failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "list composes failed: status={} body={body}",
                status.as_u16()
            );
        }

        let envelope = response
            .json::<ComposesEnvelope>()
            .await
            .context("compose listing was not in the expected shape")?;
        Ok(envelope
            .composes
            .into_iter()
            .map(|entry| entry.name)
            .collect())
    }

    async fn get_request(&self, request_id: &str) -> Result<RequestRecord> {
        let response = self
            .http
            .get(self.endpoint(&format!("requests/{request_id}")))
            .bearer_auth(&self.api_token)
            .send()
            .await
            .with_context(|| format!("fetch request {request_id} from testing farm failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "fetch request {request_id} failed: status={} body={body}",
                status.as_u16()
            );
        }

        response
            .json::<RequestRecord>()
            .await
            .with_context(|| format!("request {request_id} record was not in the expected shape"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{build_payload, SubmitParams};
    use serde_json::json;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};

    fn canned_response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn spawn_one_shot(
        status_line: &'static str,
        body: String,
    ) -> (String, Arc<Mutex<String>>, std::thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
        let addr = listener.local_addr().expect("listener addr");
        let captured = Arc::new(Mutex::new(String::new()));
        let captured_server = Arc::clone(&captured);
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept request");
            let mut buffer = vec![0_u8; 64 * 1024];
            let read = stream.read(&mut buffer).expect("read request");
            if let Ok(mut guard) = captured_server.lock() {
                *guard = String::from_utf8_lossy(&buffer[..read]).to_string();
            }
            let response = canned_response(status_line, &body);
            stream
                .write_all(response.as_bytes())
                .expect("write response");
        });
        (format!("http://{addr}/v0.1"), captured, server)
    }

    fn test_config(api_url: String) -> Config {
        Config {
            api_url,
            api_token: "secret-token".to_owned(),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn submit_returns_success_body() {
        let body = json!({ "id": "3fa85f64-5717-4562-b3fc-2c963f66afa6", "state": "new" });
        let (api_url, captured, server) = spawn_one_shot("200 OK", body.to_string());

        let client = TestingFarmClient::new(&test_config(api_url)).expect("build client");
        let payload = build_payload(&SubmitParams::new("https://x/tests.git", "fedora-41"));
        let result = client.submit_request(&payload).await.expect("submit");
        assert_eq!(result["state"], "new");
        server.join().expect("join server");

        let request_text = captured.lock().expect("lock captured").clone();
        assert!(request_text.starts_with("POST /v0.1/requests"));
        assert!(request_text.contains("authorization: Bearer secret-token"));
    }

    #[tokio::test]
    async fn submit_returns_json_diagnostic_from_error_status() {
        let body = json!({ "errors": { "environments": "unsupported compose" } });
        let (api_url, _captured, server) = spawn_one_shot("400 Bad Request", body.to_string());

        let client = TestingFarmClient::new(&test_config(api_url)).expect("build client");
        let payload = build_payload(&SubmitParams::new("https://x/tests.git", "bogus"));
        let result = client.submit_request(&payload).await.expect("submit");
        assert_eq!(result["errors"]["environments"], "unsupported compose");
        server.join().expect("join server");
    }

    #[tokio::test]
    async fn submit_fails_when_error_body_is_not_json() {
        let (api_url, _captured, server) =
            spawn_one_shot("502 Bad Gateway", "<html>gateway down</html>".to_owned());

        let client = TestingFarmClient::new(&test_config(api_url)).expect("build client");
        let payload = build_payload(&SubmitParams::new("https://x/tests.git", "fedora-41"));
        assert!(client.submit_request(&payload).await.is_err());
        server.join().expect("join server");
    }

    #[tokio::test]
    async fn list_composes_parses_names() {
        let body = json!({
            "composes": [
                { "name": "fedora-41" },
                { "name": "centos-stream-9" }
            ]
        });
        let (api_url, captured, server) = spawn_one_shot("200 OK", body.to_string());

        let client = TestingFarmClient::new(&test_config(api_url)).expect("build client");
        let names = client
            .list_composes(Ranch::Public)
            .await
            .expect("list composes");
        assert_eq!(names, vec!["fedora-41", "centos-stream-9"]);
        server.join().expect("join server");

        let request_text = captured.lock().expect("lock captured").clone();
        assert!(request_text.starts_with("GET /v0.1/composes/public"));
    }

    #[tokio::test]
    async fn list_composes_propagates_http_error() {
        let body = json!({ "message": "ranch unavailable" });
        let (api_url, _captured, server) =
            spawn_one_shot("500 Internal Server Error", body.to_string());

        let client = TestingFarmClient::new(&test_config(api_url)).expect("build client");
        let err = client
            .list_composes(Ranch::Redhat)
            .await
            .expect_err("listing should fail");
        assert!(err.to_string().contains("status=500"));
        server.join().expect("join server");
    }

    #[tokio::test]
    async fn get_request_parses_record() {
        let body = json!({
            "state": "complete",
            "result": { "overall": "passed", "summary": "ok" },
            "run": { "artifacts": "http://artifacts.example/1" }
        });
        let (api_url, captured, server) = spawn_one_shot("200 OK", body.to_string());

        let client = TestingFarmClient::new(&test_config(api_url)).expect("build client");
        let record = client
            .get_request("3fa85f64-5717-4562-b3fc-2c963f66afa6")
            .await
            .expect("fetch request");
        assert_eq!(record.state, "complete");
        server.join().expect("join server");

        let request_text = captured.lock().expect("lock captured").clone();
        assert!(request_text
            .starts_with("GET /v0.1/requests/3fa85f64-5717-4562-b3fc-2c963f66afa6"));
    }

    #[tokio::test]
    async fn get_request_propagates_http_error() {
        let body = json!({ "message": "not found" });
        let (api_url, _captured, server) = spawn_one_shot("404 Not Found", body.to_string());

        let client = TestingFarmClient::new(&test_config(api_url)).expect("build client");
        let err = client
            .get_request("3fa85f64-5717-4562-b3fc-2c963f66afa6")
            .await
            .expect_err("fetch should fail");
        assert!(err.to_string().contains("status=404"));
        server.join().expect("join server");
    }
}
