use super::support::{project_config, service, TestTransport, SERVICE_URL};
use crate::ai_sdk_core::chat::ChatModel;
use crate::ai_sdk_core::SdkError;
use crate::ai_sdk_types::ChatMessage;
use crate::provider_watsonx::chat::language_model::{ChatCallOptions, ChatWatsonx};
use crate::provider_watsonx::tools::toolkit::WatsonxToolkit;
use serde_json::json;

fn tool_listing() -> serde_json::Value {
    json!({
        "resources": [
            {
                "name": "GoogleSearch",
                "description": "Search for online trends, news, current events, real-time information, or research topics.",
                "agent_description": "Search the web for current information.",
                "input_schema": {
                    "$schema": "http://json-schema.org/draft-07/schema#",
                    "type": "object",
                    "properties": {"q": {"type": "string", "title": "Query"}},
                    "required": ["q"]
                },
                "config_schema": {"type": "object", "properties": {"maxResults": {"type": "integer"}}}
            },
            {
                "name": "Weather",
                "description": "Find the weather for a city."
            }
        ]
    })
}

async fn toolkit(transport: &TestTransport) -> WatsonxToolkit<TestTransport> {
    transport.push_json(tool_listing());
    WatsonxToolkit::init(service(transport, project_config()))
        .await
        .unwrap()
}

#[tokio::test]
async fn init_lists_tools_once() {
    let transport = TestTransport::new();
    let kit = toolkit(&transport).await;

    let req = transport.last_request();
    assert_eq!(req.method, "GET");
    assert_eq!(req.url, format!("{SERVICE_URL}/v1-beta/utility_agent_tools"));
    assert_eq!(kit.get_tools().len(), 2);

    let search = kit.get_tool("GoogleSearch").unwrap();
    assert_eq!(search.description(), "Search the web for current information.");
    let params = &search.descriptor().function.parameters;
    assert!(params.get("$schema").is_none());
    assert_eq!(params["required"], json!(["q"]));

    let weather = kit.get_tool("Weather").unwrap();
    assert_eq!(weather.description(), "Find the weather for a city.");
    assert_eq!(
        weather.descriptor().function.parameters["required"],
        json!(["input"])
    );
    assert!(kit.get_tool("Missing").is_none());
}

#[tokio::test]
async fn call_splits_input_and_config() {
    let transport = TestTransport::new();
    let kit = toolkit(&transport).await;
    transport.push_json(json!({"output": "Sunny, 24C"}));

    let out = kit
        .get_tool("Weather")
        .unwrap()
        .call(json!({"input": "Rome", "units": "metric"}))
        .await
        .unwrap();

    assert_eq!(out, "Sunny, 24C");
    let req = transport.last_request();
    assert_eq!(
        req.url,
        format!("{SERVICE_URL}/v1-beta/utility_agent_tools/run/Weather")
    );
    assert_eq!(
        req.body(),
        &json!({
            "tool_name": "Weather",
            "input": "Rome",
            "config": {"units": "metric"}
        })
    );
}

#[tokio::test]
async fn call_without_input_sends_all_arguments_as_input() {
    let transport = TestTransport::new();
    let kit = toolkit(&transport).await;
    transport.push_json(json!({"output": {"hits": 2}}));

    let out = kit
        .get_tool("GoogleSearch")
        .unwrap()
        .call(json!({"q": "rust news", "maxResults": 3}))
        .await
        .unwrap();

    assert_eq!(out, r#"{"hits":2}"#);
    let req = transport.last_request();
    assert_eq!(
        req.url,
        format!("{SERVICE_URL}/v1-beta/utility_agent_tools/run/GoogleSearch")
    );
    assert_eq!(
        req.body(),
        &json!({
            "tool_name": "GoogleSearch",
            "input": {"q": "rust news", "maxResults": 3},
            "config": {"q": "rust news", "maxResults": 3}
        })
    );
}

#[tokio::test]
async fn missing_output_yields_apology() {
    let transport = TestTransport::new();
    let kit = toolkit(&transport).await;
    transport.push_json(json!({}));

    let out = kit
        .get_tool("Weather")
        .unwrap()
        .call(json!({"input": "Rome"}))
        .await
        .unwrap();

    assert_eq!(out, "Sorry, the tool did not work as expected");
    assert_eq!(transport.last_request().body()["input"], json!("Rome"));
}

#[tokio::test]
async fn arguments_violating_the_input_schema_are_rejected() {
    let transport = TestTransport::new();
    let kit = toolkit(&transport).await;
    let sent_before = transport.requests().len();
    let search = kit.get_tool("GoogleSearch").unwrap();
    let weather = kit.get_tool("Weather").unwrap();

    for (tool, args) in [
        (weather, json!("Rome")),
        (weather, json!({"location": "Rome"})),
        (weather, serde_json::Value::Null),
        (search, json!({"q": 42})),
        (search, json!(["rust"])),
    ] {
        let err = tool.call(args.clone()).await.unwrap_err();
        assert!(
            matches!(err, SdkError::InvalidArgument { .. }),
            "{args} gave {err:?}"
        );
    }
    assert_eq!(transport.requests().len(), sent_before);
    assert!(search.validate_args(&json!({"q": "rust"})).is_ok());
}

#[tokio::test]
async fn run_failure_is_propagated() {
    let transport = TestTransport::new();
    let kit = toolkit(&transport).await;
    transport.push_status(404, r#"{"errors":[{"code":"not_found","message":"tool not found"}]}"#);

    let err = kit
        .get_tool("Weather")
        .unwrap()
        .call(json!({"input": "x"}))
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::Upstream { status: 404, .. }));
}

#[tokio::test]
async fn utility_tools_bind_to_chat_models() {
    let transport = TestTransport::new();
    let kit = toolkit(&transport).await;
    transport.push_json(json!({
        "id": "c",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": "ok"}}]
    }));
    let chat = ChatWatsonx::new(service(&transport, project_config()))
        .unwrap()
        .bind_tools(kit.get_tools().iter().map(|t| t.definition()));

    chat.generate(&[ChatMessage::user("news?")], &ChatCallOptions::default())
        .await
        .unwrap();

    let tools = transport.last_request().body()["tools"].clone();
    assert_eq!(tools.as_array().map(Vec::len), Some(2));
    assert_eq!(tools[0]["function"]["name"], json!("GoogleSearch"));
    assert_eq!(
        tools[0]["function"]["description"],
        json!("Search the web for current information.")
    );
    assert_eq!(tools[1]["function"]["name"], json!("Weather"));
}
