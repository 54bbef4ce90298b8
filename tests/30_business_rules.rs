mod common;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::Api;

macro_rules! tenant_or_skip {
    () => {
        match common::seeded_tenant() {
            Some(tenant) => tenant,
            None => {
                eprintln!("skipping: DATABASE_URL not set");
                return Ok(());
            }
        }
    };
}

fn id_of(body: &Value) -> Result<String> {
    body["data"]["id"].as_str().map(str::to_string).context("response has no data.id")
}

async fn create_client(api: &Api) -> Result<String> {
    let (status, body) = api.post("/api/clients", json!({ "company_name": common::unique("Client") })).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    id_of(&body)
}

async fn create_asset(api: &Api) -> Result<String> {
    let (status, body) = api
        .post(
            "/api/hardware",
            json!({
                "asset_tag": common::unique("FW"),
                "name": "Edge firewall",
                "asset_type": "firewall",
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["status"], "in_stock");
    id_of(&body)
}

async fn asset_status(api: &Api, asset_id: &str) -> Result<Value> {
    let (status, body) = api.get(&format!("/api/hardware/{}", asset_id)).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    Ok(body["data"]["status"].clone())
}

#[tokio::test]
async fn company_names_are_unique_ignoring_case() -> Result<()> {
    let tenant = tenant_or_skip!();
    let api = Api::as_user(tenant, &tenant.admin_email).await?;

    let name = common::unique("Contoso");
    let (status, body) = api.post("/api/clients", json!({ "company_name": name })).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let (status, body) = api.post("/api/clients", json!({ "company_name": name.to_uppercase() })).await?;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "CONFLICT");
    Ok(())
}

#[tokio::test]
async fn assignment_lifecycle_moves_asset_status() -> Result<()> {
    let tenant = tenant_or_skip!();
    let api = Api::as_user(tenant, &tenant.admin_email).await?;

    let client_id = create_client(&api).await?;
    let first = create_asset(&api).await?;
    let spare = create_asset(&api).await?;

    let (status, body) = api
        .post("/api/hardware/assignments", json!({ "hardware_asset_id": first, "client_id": client_id }))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let assignment_id = id_of(&body)?;
    assert_eq!(asset_status(&api, &first).await?, "in_use");

    // An asset sits with at most one client at a time
    let (status, body) = api
        .post("/api/hardware/assignments", json!({ "hardware_asset_id": first, "client_id": client_id }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let (status, body) = api
        .post(
            &format!("/api/hardware/assignments/{}/replace", assignment_id),
            json!({ "replacement_asset_id": spare }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["previous"]["status"], "replaced");
    assert_eq!(body["data"]["replacement"]["status"], "active");
    assert_eq!(body["data"]["previous"]["replaced_by_assignment_id"], body["data"]["replacement"]["id"]);
    assert_eq!(asset_status(&api, &first).await?, "in_stock");
    assert_eq!(asset_status(&api, &spare).await?, "in_use");

    let successor = body["data"]["replacement"]["id"].as_str().context("no replacement id")?.to_string();
    let (status, body) = api.post(&format!("/api/hardware/assignments/{}/return", successor), json!({})).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "returned");
    assert_eq!(asset_status(&api, &spare).await?, "in_stock");

    let (status, _) = api.post(&format!("/api/hardware/assignments/{}/return", successor), json!({})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn scopes_of_deleted_contracts_cannot_take_hardware() -> Result<()> {
    let tenant = tenant_or_skip!();
    let api = Api::as_user(tenant, &tenant.admin_email).await?;

    let client_id = create_client(&api).await?;
    let asset_id = create_asset(&api).await?;
    let (status, body) = api
        .post(
            "/api/contracts",
            json!({
                "client_id": client_id,
                "contract_name": "Managed firewall",
                "start_date": "2026-01-01",
                "end_date": "2026-12-31",
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let contract_id = id_of(&body)?;

    let (status, body) = api
        .post(&format!("/api/contracts/{}/scopes", contract_id), json!({ "service_name": "Firewall management" }))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let scope_id = id_of(&body)?;

    let (status, body) = api.delete(&format!("/api/contracts/{}", contract_id)).await?;
    assert!(status.is_success(), "{} {}", status, body);

    let (status, body) = api
        .post(
            "/api/hardware/assignments",
            json!({ "hardware_asset_id": asset_id, "client_id": client_id, "service_scope_id": scope_id }),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND, "{}", body);
    assert_eq!(asset_status(&api, &asset_id).await?, "in_stock");
    Ok(())
}

#[tokio::test]
async fn patching_an_assigned_asset_keeps_it_in_use() -> Result<()> {
    let tenant = tenant_or_skip!();
    let api = Api::as_user(tenant, &tenant.admin_email).await?;

    let client_id = create_client(&api).await?;
    let asset_id = create_asset(&api).await?;
    let (status, body) = api
        .post("/api/hardware/assignments", json!({ "hardware_asset_id": asset_id, "client_id": client_id }))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let (status, body) = api.patch(&format!("/api/hardware/{}", asset_id), json!({ "location": "Rack 4" })).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "in_use");
    assert_eq!(body["data"]["location"], "Rack 4");

    let (status, body) = api
        .patch(&format!("/api/hardware/{}", asset_id), json!({ "status": "maintenance" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert_eq!(asset_status(&api, &asset_id).await?, "in_use");
    Ok(())
}

#[tokio::test]
async fn one_active_team_member_per_role() -> Result<()> {
    let tenant = tenant_or_skip!();
    let api = Api::as_user(tenant, &tenant.admin_email).await?;

    let (status, me) = api.get("/api/auth/whoami").await?;
    assert_eq!(status, StatusCode::OK, "{}", me);
    let user_id = id_of(&me)?;
    let client_id = create_client(&api).await?;

    let member = json!({ "user_id": user_id, "assignment_role": "account_manager" });
    let (status, body) = api.post(&format!("/api/clients/{}/team", client_id), member.clone()).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let (status, body) = api.post(&format!("/api/clients/{}/team", client_id), member).await?;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);
    assert_eq!(body["code"], "CONFLICT");
    Ok(())
}

#[tokio::test]
async fn money_totals_are_hidden_from_viewers() -> Result<()> {
    let tenant = tenant_or_skip!();
    let admin = Api::as_user(tenant, &tenant.admin_email).await?;
    let viewer = Api::as_user(tenant, &tenant.viewer_email).await?;
    let client_id = create_client(&admin).await?;
    let overview = format!("/api/clients/{}/overview", client_id);

    let (status, _) = viewer.get("/api/dashboard/financial-trend").await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = admin.get("/api/dashboard/financial-trend").await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = viewer.get(&overview).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["data"]["financials"].is_null(), "{}", body);
    let (_, body) = admin.get(&overview).await?;
    assert!(body["data"]["financials"].is_object(), "{}", body);

    let (status, body) = viewer.get("/api/dashboard/overview").await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["data"]["current_month"].is_null(), "{}", body);
    let (_, body) = admin.get("/api/dashboard/overview").await?;
    assert!(body["data"]["current_month"].is_object(), "{}", body);
    Ok(())
}

#[tokio::test]
async fn out_of_range_page_is_a_validation_error() -> Result<()> {
    let tenant = tenant_or_skip!();
    let api = Api::as_user(tenant, &tenant.admin_email).await?;

    let (status, body) = api.get("/api/clients?page=9223372036854775807").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    Ok(())
}
