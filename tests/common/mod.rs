#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;

pub const JWT_SECRET: &str = "integration-test-secret";

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Cargo builds the server binary before running integration tests
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_mssp-api"));
        cmd.env("MSSP_API_PORT", port.to_string())
            .env("JWT_SECRET", JWT_SECRET)
            .env("APP_ENV", "development")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        // DATABASE_URL is inherited when set; without it the API still serves
        // everything that does not touch a database
        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK || resp.status() == StatusCode::SERVICE_UNAVAILABLE {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(15)).await?;
    Ok(server)
}

/// Signs claims the way the server does, for a tenant that need not exist
pub fn token_for(tenant: &str, role: &str, secret: &str) -> Result<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = serde_json::json!({
        "tenant": tenant,
        "database": format!("tenant_{}", "0".repeat(16)),
        "user": "ops@example.com",
        "role": role,
        "user_id": "00000000-0000-4000-8000-000000000001",
        "iat": now,
        "exp": now + 3600,
    });
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

pub const TEST_PASSWORD: &str = "integration-pass-1";

/// A throwaway tenant with an admin and a viewer, provisioned through the `mssp` CLI
pub struct TestTenant {
    pub name: String,
    pub admin_email: String,
    pub viewer_email: String,
}

static TENANT: OnceLock<Option<TestTenant>> = OnceLock::new();

fn database_configured() -> bool {
    let _ = dotenvy::dotenv();
    std::env::var("DATABASE_URL").map(|v| !v.trim().is_empty()).unwrap_or(false)
}

fn run_cli(args: &[&str]) -> Result<serde_json::Value> {
    let output = Command::new(env!("CARGO_BIN_EXE_mssp"))
        .arg("--json")
        .args(args)
        .stdin(Stdio::null())
        .output()
        .context("failed to run mssp CLI")?;
    if !output.status.success() {
        anyhow::bail!(
            "mssp {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(serde_json::from_str(stdout.trim()).unwrap_or(serde_json::Value::Null))
}

fn provision_tenant() -> Result<TestTenant> {
    run_cli(&["migrate"])?;

    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let tenant = TestTenant {
        name: format!("it_{}", &suffix[..12]),
        admin_email: "admin@example.com".to_string(),
        viewer_email: "viewer@example.com".to_string(),
    };

    run_cli(&[
        "tenant",
        "create",
        &tenant.name,
        "--admin-email",
        &tenant.admin_email,
        "--admin-password",
        TEST_PASSWORD,
    ])?;
    run_cli(&[
        "user",
        "create",
        &tenant.name,
        "--email",
        &tenant.viewer_email,
        "--password",
        TEST_PASSWORD,
        "--role",
        "viewer",
    ])?;
    Ok(tenant)
}

/// `None` when no DATABASE_URL is configured; such tests skip themselves
pub fn seeded_tenant() -> Option<&'static TestTenant> {
    TENANT
        .get_or_init(|| {
            if !database_configured() {
                eprintln!("DATABASE_URL not set; skipping database-backed tests");
                return None;
            }
            Some(provision_tenant().expect("failed to provision test tenant"))
        })
        .as_ref()
}

pub async fn login(server: &TestServer, tenant: &TestTenant, email: &str) -> Result<String> {
    let res = reqwest::Client::new()
        .post(server.url(&format!("/auth/login/{}", tenant.name)))
        .json(&serde_json::json!({ "email": email, "password": TEST_PASSWORD }))
        .send()
        .await?;
    let status = res.status();
    let body = res.json::<serde_json::Value>().await?;
    if status != StatusCode::OK {
        anyhow::bail!("login as {} failed with {}: {}", email, status, body);
    }
    body["data"]["token"]
        .as_str()
        .map(str::to_string)
        .context("login response has no token")
}

/// Authenticated JSON client for one user of the test tenant
pub struct Api {
    server: &'static TestServer,
    client: reqwest::Client,
    token: String,
}

impl Api {
    pub async fn as_user(tenant: &TestTenant, email: &str) -> Result<Self> {
        let server = ensure_server().await?;
        let token = login(server, tenant, email).await?;
        Ok(Self { server, client: reqwest::Client::new(), token })
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<(StatusCode, serde_json::Value)> {
        let res = req.bearer_auth(&self.token).send().await?;
        let status = res.status();
        let text = res.text().await?;
        let body = if text.is_empty() { serde_json::Value::Null } else { serde_json::from_str(&text)? };
        Ok((status, body))
    }

    pub async fn get(&self, path: &str) -> Result<(StatusCode, serde_json::Value)> {
        self.send(self.client.get(self.server.url(path))).await
    }

    pub async fn post(&self, path: &str, body: serde_json::Value) -> Result<(StatusCode, serde_json::Value)> {
        self.send(self.client.post(self.server.url(path)).json(&body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<(StatusCode, serde_json::Value)> {
        self.send(self.client.delete(self.server.url(path))).await
    }

    pub async fn patch(&self, path: &str, body: serde_json::Value) -> Result<(StatusCode, serde_json::Value)> {
        self.send(self.client.patch(self.server.url(path)).json(&body)).await
    }
}

/// Short random tag for names that must be unique across runs
pub fn unique(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &suffix[..8])
}
