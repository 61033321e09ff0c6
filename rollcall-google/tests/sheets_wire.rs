//! Sheets and token traffic against a local stand-in server.
//!
//! The clients are blocking, so each exchange runs on the blocking pool
//! while the mock server keeps serving on the runtime.

use std::fs;
use std::path::Path;

use chrono::{TimeZone, Utc};
use chrono_tz::America::New_York;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{any, method, path, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use rollcall_core::{build_roster_table, DirectorySnapshot, Member, RoleName, RosterTable};
use rollcall_google::{Credentials, GoogleError, SheetsClient, Token};
use rollcall_sync::{sync_roster, PassStatus, SheetLayout, SpreadsheetHandle, StructuralEdit};

fn installed(token_uri: &str) -> String {
    json!({
        "installed": {
            "client_id": "123.apps.googleusercontent.com",
            "client_secret": "shh",
            "token_uri": token_uri,
            "redirect_uris": ["http://localhost"]
        }
    })
    .to_string()
}

fn token(access: &str, expiry_date: i64) -> Token {
    Token {
        access_token: access.into(),
        refresh_token: Some("1//refresh".into()),
        scope: Some("https://www.googleapis.com/auth/spreadsheets".into()),
        token_type: Some("Bearer".into()),
        expiry_date: Some(expiry_date),
    }
}

/// Credentials on disk under `dir`, with the token endpoint at `server`.
fn credentials(dir: &Path, server: &MockServer, stored: &Token) -> Credentials {
    let creds_path = dir.join("credentials.json");
    let token_path = dir.join("token.json");
    fs::write(&creds_path, installed(&format!("{}/token", server.uri()))).expect("write creds");
    stored.save_at(&token_path).expect("save token");
    Credentials::load_or_authorize(&creds_path, &token_path).expect("credentials")
}

fn sheets(dir: &Path, server: &MockServer, stored: &Token) -> SheetsClient {
    SheetsClient::new("sheet-1", credentials(dir, server, stored))
        .with_base_url(format!("{}/v4/spreadsheets", server.uri()))
}

fn fresh() -> Token {
    token("ya29.current", Utc::now().timestamp_millis() + 3_600_000)
}

fn table() -> RosterTable {
    build_roster_table(&DirectorySnapshot {
        roles: vec![RoleName::from("Member"), RoleName::from("Admin")],
        members: vec![Member::new("Alice", Some("Al"), &["Member"])],
    })
}

fn query(request: &Request) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = request
        .url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();
    pairs
}

fn pairs(expected: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = expected
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    pairs.sort();
    pairs
}

fn authorization(request: &Request) -> &str {
    request
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn body(request: &Request) -> Value {
    serde_json::from_slice(&request.body).expect("json body")
}

#[tokio::test(flavor = "multi_thread")]
async fn full_pass_sends_the_four_documented_requests() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(4)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("tempdir");
    let mut client = sheets(dir.path(), &server, &fresh());
    let report = tokio::task::spawn_blocking(move || {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 19, 5, 0).unwrap();
        sync_roster(&mut client, &SheetLayout::default(), &table(), now, New_York)
    })
    .await
    .expect("blocking pass");
    assert_eq!(report.status, PassStatus::Complete);

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 4);
    for request in &requests {
        assert_eq!(authorization(request), "Bearer ya29.current");
    }

    let clear = &requests[0];
    assert_eq!(clear.method.to_string(), "POST");
    assert_eq!(clear.url.path(), "/v4/spreadsheets/sheet-1:batchUpdate");
    assert!(query(clear).is_empty());
    let deletes = body(clear);
    assert_eq!(deletes["requests"][0]["deleteDimension"]["range"]["dimension"], "ROWS");
    assert_eq!(deletes["requests"][0]["deleteDimension"]["range"]["startIndex"], 3);
    assert_eq!(deletes["requests"][1]["deleteDimension"]["range"]["dimension"], "COLUMNS");
    assert_eq!(deletes["requests"][1]["deleteDimension"]["range"]["startIndex"], 2);

    let header = &requests[1];
    assert_eq!(header.method.to_string(), "POST");
    assert_eq!(header.url.path(), "/v4/spreadsheets/sheet-1/values/C2%3A2:append");
    assert_eq!(
        query(header),
        pairs(&[("valueInputOption", "RAW"), ("insertDataOption", "OVERWRITE")])
    );
    assert_eq!(body(header)["values"], json!([["Admin", "Member"]]));

    let members = &requests[2];
    assert_eq!(members.method.to_string(), "POST");
    assert_eq!(members.url.path(), "/v4/spreadsheets/sheet-1/values/A4:append");
    assert_eq!(
        query(members),
        pairs(&[("valueInputOption", "RAW"), ("insertDataOption", "OVERWRITE")])
    );
    assert_eq!(body(members)["values"], json!([["Alice", "Al", 0, 1]]));

    let stamp = &requests[3];
    assert_eq!(stamp.method.to_string(), "PUT");
    assert_eq!(stamp.url.path(), "/v4/spreadsheets/sheet-1/values/B1");
    assert_eq!(query(stamp), pairs(&[("valueInputOption", "USER_ENTERED")]));
    assert_eq!(body(stamp)["values"], json!([["10/18/2026, 3:05 PM"]]));
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_header_write_leaves_a_partial_pass() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"/values/C2%3A2:append$"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "Unable to parse range: C2:2", "status": "INVALID_ARGUMENT"}
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("tempdir");
    let mut client = sheets(dir.path(), &server, &fresh());
    let report = tokio::task::spawn_blocking(move || {
        sync_roster(&mut client, &SheetLayout::default(), &table(), Utc::now(), New_York)
    })
    .await
    .expect("blocking pass");

    assert_eq!(report.status, PassStatus::Partial);
    let failed: Vec<_> = report.failed_steps().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].step.as_str(), "header");
    assert_eq!(
        server.received_requests().await.expect("recording enabled").len(),
        4
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn expired_token_is_refreshed_and_persisted_before_the_first_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.fresh",
            "expires_in": 3599,
            "scope": "https://www.googleapis.com/auth/spreadsheets",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v4/spreadsheets/sheet-1:batchUpdate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("tempdir");
    let stale = token("ya29.stale", 1_600_000_000_000);
    let mut client = sheets(dir.path(), &server, &stale);
    tokio::task::spawn_blocking(move || {
        client.batch_structural_edit(&StructuralEdit {
            sheet_id: 0,
            delete_rows_from: 3,
            delete_columns_from: 2,
        })
    })
    .await
    .expect("blocking call")
    .expect("structural edit");

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].url.path(), "/token");
    let form = String::from_utf8_lossy(&requests[0].body).into_owned();
    assert!(form.contains("grant_type=refresh_token"), "form: {form}");
    assert!(form.contains("refresh_token=1%2F%2Frefresh"), "form: {form}");
    assert_eq!(authorization(&requests[1]), "Bearer ya29.fresh");

    let stored = Token::load_at(&dir.path().join("token.json"))
        .expect("load")
        .expect("present");
    assert_eq!(stored.access_token, "ya29.fresh");
    assert_eq!(stored.refresh_token.as_deref(), Some("1//refresh"));
    assert!(!stored.is_expired_at(Utc::now().timestamp_millis()));
}

#[tokio::test(flavor = "multi_thread")]
async fn refresh_rejection_surfaces_as_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("tempdir");
    let stale = token("ya29.stale", 1_600_000_000_000);
    let mut client = sheets(dir.path(), &server, &stale);
    let err = tokio::task::spawn_blocking(move || {
        client.batch_structural_edit(&StructuralEdit {
            sheet_id: 0,
            delete_rows_from: 3,
            delete_columns_from: 2,
        })
    })
    .await
    .expect("blocking call")
    .unwrap_err();

    assert!(matches!(err, GoogleError::Http { status: 400, .. }), "got: {err}");
    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1, "no sheets call after a failed refresh");
    let stored = Token::load_at(&dir.path().join("token.json"))
        .expect("load")
        .expect("present");
    assert_eq!(stored.access_token, "ya29.stale");
}
