use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use certsync::vault::credential::StaticTokenCredential;
use certsync::vault::{CertificateCatalog, CertificateVault, KeyVaultClient, SecretWrite};
use certsync::CertsyncError;

const TOKEN: &str = "test-token";

fn client(server: &MockServer) -> anyhow::Result<KeyVaultClient> {
    Ok(KeyVaultClient::new(
        &server.uri(),
        Arc::new(StaticTokenCredential::new(TOKEN)),
        Duration::from_secs(5),
    )?)
}

fn secret_item(server: &MockServer, name: &str, certificate: Option<&str>) -> serde_json::Value {
    let mut tags = serde_json::Map::new();
    if let Some(certificate) = certificate {
        tags.insert("CertificateId".into(), json!(format!("/certificates/{}", certificate)));
        tags.insert("Thumbprint".into(), json!("0A1B2C"));
    }
    json!({
        "id": format!("{}/secrets/{}", server.uri(), name),
        "attributes": { "enabled": true, "nbf": 1_700_000_000, "exp": 1_800_000_000 },
        "contentType": "application/x-pkcs12",
        "tags": tags,
    })
}

#[tokio::test]
async fn test_list_follows_next_link() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secrets"))
        .and(query_param("api-version", "7.4"))
        .and(query_param_is_missing("$skiptoken"))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [secret_item(&server, "web-1", Some("web"))],
            "nextLink": format!("{}/secrets?api-version=7.4&$skiptoken=page2", server.uri()),
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/secrets"))
        .and(query_param("$skiptoken", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [secret_item(&server, "api-1", Some("api")), secret_item(&server, "plain", None)],
            "nextLink": null,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let vault = client(&server)?;
    let secrets = vault.list_secret_properties().await?;
    assert_eq!(secrets.len(), 3);
    assert_eq!(secrets[0].name, "web-1");
    assert_eq!(secrets[0].expires_on.map(|t| t.timestamp()), Some(1_800_000_000));

    let catalog = CertificateCatalog::from_properties(&secrets);
    let names: Vec<_> = catalog
        .find_by_names(None)?
        .into_iter()
        .filter_map(|identity| identity.certificate_name)
        .collect();
    assert_eq!(names, vec!["web", "api"]);
    Ok(())
}

#[tokio::test]
async fn test_get_secret_returns_value_and_version() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secrets/web-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": "TUlJQg==",
            "id": format!("{}/secrets/web-1/abc123", server.uri()),
            "contentType": "application/x-pkcs12",
            "attributes": { "enabled": true },
            "tags": { "CertificateId": "/certificates/web" },
        })))
        .mount(&server)
        .await;

    let secret = client(&server)?.get_secret("web-1").await?;
    assert_eq!(secret.value.expose_secret(), "TUlJQg==");
    assert_eq!(secret.properties.version.as_deref(), Some("abc123"));
    assert_eq!(secret.properties.content_type.as_deref(), Some("application/x-pkcs12"));
    Ok(())
}

#[tokio::test]
async fn test_missing_secret_is_not_found() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secrets/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": "SecretNotFound", "message": "A secret with (name/id) gone was not found" }
        })))
        .mount(&server)
        .await;

    let err = client(&server)?.get_secret("gone").await.unwrap_err();
    assert!(matches!(err, CertsyncError::NotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn test_service_errors_carry_status_and_message() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secrets"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": "Forbidden", "message": "Caller is not authorized" }
        })))
        .mount(&server)
        .await;

    let err = client(&server)?.list_secret_properties().await.unwrap_err();
    match err {
        CertsyncError::RemoteRequestFailed { status, message } => {
            assert_eq!(status, Some(403));
            assert_eq!(message, "Forbidden: Caller is not authorized");
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_set_secret_sends_tags_and_validity() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/secrets/web-1"))
        .and(body_partial_json(json!({
            "value": "TUlJQg==",
            "contentType": "application/x-pkcs12",
            "attributes": { "enabled": true, "nbf": 1_700_000_000, "exp": 1_800_000_000 },
            "tags": { "CertificateState": "Ready" },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": "TUlJQg==",
            "id": format!("{}/secrets/web-1/v2", server.uri()),
            "contentType": "application/x-pkcs12",
            "attributes": { "enabled": true, "nbf": 1_700_000_000, "exp": 1_800_000_000 },
            "tags": { "CertificateState": "Ready" },
        })))
        .expect(1)
        .mount(&server)
        .await;

    let properties = client(&server)?
        .set_secret(SecretWrite {
            name: "web-1".to_string(),
            value: "TUlJQg==".into(),
            content_type: Some("application/x-pkcs12".to_string()),
            not_before: chrono::DateTime::from_timestamp(1_700_000_000, 0),
            expires_on: chrono::DateTime::from_timestamp(1_800_000_000, 0),
            tags: HashMap::from([("CertificateState".to_string(), "Ready".to_string())]),
        })
        .await?;

    assert_eq!(properties.name, "web-1");
    assert_eq!(properties.version.as_deref(), Some("v2"));
    Ok(())
}

#[tokio::test]
async fn test_delete_secret() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/secrets/web-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/secrets/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let vault = client(&server)?;
    vault.delete_secret("web-1").await?;
    assert!(matches!(vault.delete_secret("gone").await, Err(CertsyncError::NotFound { .. })));
    Ok(())
}
