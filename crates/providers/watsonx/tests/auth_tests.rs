use super::support::{service, TestTransport, SERVICE_URL};
use crate::ai_sdk_core::SdkError;
use crate::provider_watsonx::auth::{select_authenticator, AuthKind, Authenticator, WatsonxAuth};
use crate::provider_watsonx::config::WatsonxConfig;
use secrecy::SecretString;
use serde_json::json;
use std::collections::HashMap;

fn config_with(auth: WatsonxAuth) -> WatsonxConfig {
    WatsonxConfig::new(SERVICE_URL)
        .with_project_id("proj-1")
        .with_auth(auth)
}

fn chat_ok() -> serde_json::Value {
    json!({"id": "chat-1", "choices": []})
}

#[tokio::test]
async fn iam_token_is_exchanged_once_and_reused() {
    let transport = TestTransport::new();
    transport.push_json(chat_ok());
    transport.push_json(chat_ok());
    let svc = service(&transport, config_with(WatsonxAuth::iam("my-api-key")));

    svc.text_chat(&json!({})).await.unwrap();
    svc.text_chat(&json!({})).await.unwrap();

    let exchanges = transport.requests_to("/identity/token");
    assert_eq!(exchanges.len(), 1);
    assert_eq!(exchanges[0].url, "https://iam.cloud.ibm.com/identity/token");
    assert_eq!(
        exchanges[0].form,
        vec![
            (
                "grant_type".to_string(),
                "urn:ibm:params:oauth:grant-type:apikey".to_string()
            ),
            ("apikey".to_string(), "my-api-key".to_string()),
        ]
    );
    let chats = transport.requests_to("/ml/v1/text/chat");
    assert_eq!(chats.len(), 2);
    for req in chats {
        assert_eq!(req.header("authorization"), Some("Bearer iam-token"));
    }
}

#[tokio::test]
async fn iam_url_override_is_used_for_exchange() {
    let transport = TestTransport::new();
    transport.push_json(chat_ok());
    let mut auth = WatsonxAuth::iam("k");
    auth.url = Some("https://iam.test.cloud.ibm.com/".into());
    let svc = service(&transport, config_with(auth));

    svc.text_chat(&json!({})).await.unwrap();

    assert_eq!(
        transport.requests()[0].url,
        "https://iam.test.cloud.ibm.com/identity/token"
    );
}

#[tokio::test]
async fn token_inside_refresh_margin_is_exchanged_again() {
    let transport = TestTransport::new();
    let soon = chrono::Utc::now().timestamp() + 30;
    transport.push_token(json!({"access_token": "short-1", "expiration": soon}));
    transport.push_token(json!({"access_token": "short-2", "expiration": soon}));
    transport.push_json(chat_ok());
    transport.push_json(chat_ok());
    let svc = service(&transport, config_with(WatsonxAuth::iam("k")));

    svc.text_chat(&json!({})).await.unwrap();
    svc.text_chat(&json!({})).await.unwrap();

    assert_eq!(transport.requests_to("/identity/token").len(), 2);
    assert_eq!(
        transport.last_request().header("authorization"),
        Some("Bearer short-2")
    );
}

#[tokio::test]
async fn unauthorized_response_drops_cached_token() {
    let transport = TestTransport::new();
    transport.push_token(json!({"access_token": "stale", "expires_in": 3600}));
    transport.push_token(json!({"access_token": "fresh", "expires_in": 3600}));
    transport.push_status(401, r#"{"errors":[{"code":"authentication_token_expired","message":"expired"}]}"#);
    transport.push_json(chat_ok());
    let svc = service(&transport, config_with(WatsonxAuth::iam("k")));

    let err = svc.text_chat(&json!({})).await.unwrap_err();
    assert!(matches!(err, SdkError::Unauthorized));
    svc.text_chat(&json!({})).await.unwrap();

    assert_eq!(transport.requests_to("/identity/token").len(), 2);
    assert_eq!(
        transport.last_request().header("authorization"),
        Some("Bearer fresh")
    );
}

#[tokio::test]
async fn cp4d_exchanges_credentials_at_gateway() {
    let transport = TestTransport::new();
    transport.push_json(json!({"token": "cpd-token"}));
    transport.push_json(chat_ok());
    let svc = service(
        &transport,
        config_with(WatsonxAuth::cp4d("https://cpd.example.com/", "admin", "pw")),
    );

    svc.text_chat(&json!({})).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].url, "https://cpd.example.com/v1/authorize");
    assert_eq!(requests[0].body(), &json!({"username": "admin", "password": "pw"}));
    assert_eq!(requests[1].header("authorization"), Some("Bearer cpd-token"));
}

#[tokio::test]
async fn bearer_token_is_sent_without_exchange() {
    let transport = TestTransport::new();
    transport.push_json(chat_ok());
    let svc = service(&transport, config_with(WatsonxAuth::bearer("static")));

    svc.text_chat(&json!({})).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].header("authorization"), Some("Bearer static"));
}

#[tokio::test]
async fn anonymous_access_sends_no_authorization_header() {
    let transport = TestTransport::new();
    transport.push_json(chat_ok());
    let svc = service(&transport, config_with(WatsonxAuth::default()));

    svc.text_chat(&json!({})).await.unwrap();

    assert!(transport.last_request().header("authorization").is_none());
}

#[test]
fn implicit_selection_prefers_api_key_then_bearer_then_cp4d() {
    let everything = WatsonxAuth {
        api_key: Some(SecretString::new("k".into())),
        bearer_token: Some(SecretString::new("b".into())),
        username: Some("u".into()),
        password: Some(SecretString::new("p".into())),
        url: Some("https://cpd".into()),
        ..WatsonxAuth::default()
    };
    assert_eq!(
        select_authenticator(&everything).unwrap().kind(),
        Some(AuthKind::Iam)
    );

    let no_key = WatsonxAuth {
        api_key: None,
        ..everything.clone()
    };
    assert_eq!(
        select_authenticator(&no_key).unwrap().kind(),
        Some(AuthKind::BearerToken)
    );

    let password_only = WatsonxAuth {
        bearer_token: None,
        ..no_key
    };
    assert_eq!(
        select_authenticator(&password_only).unwrap().kind(),
        Some(AuthKind::Cp4d)
    );

    assert!(matches!(
        select_authenticator(&WatsonxAuth::default()).unwrap(),
        Authenticator::Anonymous
    ));
}

#[test]
fn explicit_auth_type_requires_its_fields() {
    let iam = WatsonxAuth {
        auth_type: Some(AuthKind::Iam),
        bearer_token: Some(SecretString::new("b".into())),
        ..WatsonxAuth::default()
    };
    assert!(matches!(
        select_authenticator(&iam),
        Err(SdkError::InvalidArgument { .. })
    ));

    let cp4d_without_secret = WatsonxAuth {
        auth_type: Some(AuthKind::Cp4d),
        username: Some("u".into()),
        url: Some("https://cpd".into()),
        ..WatsonxAuth::default()
    };
    assert!(select_authenticator(&cp4d_without_secret).is_err());

    let cp4d_with_key = WatsonxAuth {
        api_key: Some(SecretString::new("k".into())),
        ..cp4d_without_secret
    };
    assert_eq!(
        select_authenticator(&cp4d_with_key).unwrap().kind(),
        Some(AuthKind::Cp4d)
    );
}

#[test]
fn blank_credentials_count_as_missing() {
    let auth = WatsonxAuth {
        api_key: Some(SecretString::new("   ".into())),
        bearer_token: Some(SecretString::new("b".into())),
        ..WatsonxAuth::default()
    };
    assert_eq!(
        select_authenticator(&auth).unwrap().kind(),
        Some(AuthKind::BearerToken)
    );
}

#[test]
fn credentials_are_read_from_variables() {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("WATSONX_AI_APIKEY", "env-key"),
        ("WATSONX_AI_AUTH_TYPE", "iam"),
        ("WATSONX_AI_USERNAME", ""),
    ]);
    let auth = WatsonxAuth::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
    assert_eq!(auth.auth_type, Some(AuthKind::Iam));
    assert!(auth.api_key.is_some());
    assert!(auth.username.is_none());

    let bad = WatsonxAuth::from_lookup(|k| {
        (k == "WATSONX_AI_AUTH_TYPE").then(|| "kerberos".to_string())
    });
    assert!(bad.is_err());
}

#[test]
fn serialized_and_debug_forms_hide_secrets() {
    let auth = WatsonxAuth::cp4d("https://cpd", "admin", "hunter2");
    let value = serde_json::to_value(&auth).unwrap();
    assert_eq!(
        value["password"],
        json!({"type": "secret", "id": "WATSONX_AI_PASSWORD"})
    );
    assert_eq!(
        value["username"],
        json!({"type": "secret", "id": "WATSONX_AI_USERNAME"})
    );
    assert!(value.get("api_key").is_none());
    assert!(!value.to_string().contains("hunter2"));

    let debug = format!("{auth:?}");
    assert!(!debug.contains("hunter2"));
    assert!(debug.contains("[REDACTED]"));

    let svc_debug = format!(
        "{:?}",
        select_authenticator(&WatsonxAuth::iam("secret-key")).unwrap()
    );
    assert!(!svc_debug.contains("secret-key"));
}
