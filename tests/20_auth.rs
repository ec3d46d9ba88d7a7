mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn protected_routes_require_a_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    for path in ["/api/auth/me", "/api/cases", "/api/invoices", "/api/dashboard"] {
        let res = client.get(common::url(server, path)).send().await?;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{} should need a token", path);

        let body = res.json::<serde_json::Value>().await?;
        assert_eq!(body["success"], false);
        assert!(body.get("error").is_some(), "missing error: {}", body);
    }
    Ok(())
}

#[tokio::test]
async fn malformed_tokens_are_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(common::url(server, "/api/clients"))
        .bearer_auth("not.a.jwt")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(common::url(server, "/api/clients"))
        .header("Authorization", "Basic dXNlcjpwYXNz")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn login_requires_email_and_password() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(common::url(server, "/auth/login"))
        .json(&json!({ "email": "", "password": "" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "VALIDATION_ERROR", "body: {}", body);
    Ok(())
}

#[tokio::test]
async fn login_rejects_non_json_bodies() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(common::url(server, "/auth/login"))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert!(res.status().is_client_error(), "got {}", res.status());
    Ok(())
}
