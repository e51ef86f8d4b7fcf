//! Tests for function registration, typed functions and argument handling.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use serde_json::json;

use cactus_agent::agent::AgentSession;
use cactus_agent::error::AgentError;
use cactus_agent::functions::{
    AgentFunction, FunctionArguments, FunctionParameters, FunctionRegistry, TypedFunction,
};
use cactus_agent::types::Role;

use common::{call, MockBackend};

#[derive(Debug, Deserialize)]
struct WeatherInput {
    city: String,
    #[serde(default)]
    unit: Option<String>,
}

#[derive(Debug, Serialize)]
struct WeatherReport {
    city: String,
    temperature: i32,
    unit: String,
}

fn weather() -> TypedFunction<WeatherInput, WeatherReport> {
    TypedFunction::new(
        "weather",
        "Current temperature for a city",
        FunctionParameters::object()
            .string("city", "City name", true)
            .string_enum("unit", "Temperature unit", &["c", "f"], false)
            .build(),
        |input: WeatherInput| async move {
            Ok(WeatherReport {
                city: input.city,
                temperature: 18,
                unit: input.unit.unwrap_or_else(|| "c".into()),
            })
        },
    )
}

#[tokio::test]
async fn typed_function_round_trip_through_a_turn() {
    let mock = Arc::new(MockBackend::new());
    mock.queue_calls("", vec![call("weather", json!({"city": "Oslo"}))]);
    mock.queue_reply("It is 18 degrees in Oslo.");
    let session = AgentSession::builder(Arc::clone(&mock))
        .with_function(weather())
        .build()
        .unwrap();

    let completion = session.respond("How warm is Oslo?").await.unwrap();
    let returns = completion.function_returns();
    assert_eq!(returns.len(), 1);
    assert_eq!(returns[0].name, "weather");
    let report: serde_json::Value = serde_json::from_str(&returns[0].content).unwrap();
    assert_eq!(report, json!({"city": "Oslo", "temperature": 18, "unit": "c"}));
}

#[tokio::test]
async fn string_encoded_arguments_are_accepted() {
    let mock = Arc::new(MockBackend::new());
    mock.queue_calls("", vec![call("weather", json!(r#"{"city": "Bergen", "unit": "f"}"#))]);
    mock.queue_reply("done");
    let session = AgentSession::builder(Arc::clone(&mock))
        .with_function(weather())
        .build()
        .unwrap();

    let completion = session.respond("Bergen?").await.unwrap();
    assert!(completion.function_returns()[0].content.contains("\"unit\":\"f\""));
}

#[tokio::test]
async fn schema_violations_fail_the_turn() {
    let mock = Arc::new(MockBackend::new());
    mock.queue_calls("", vec![call("weather", json!({"city": "Oslo", "unit": "kelvin"}))]);
    let session = AgentSession::builder(Arc::clone(&mock))
        .with_function(weather())
        .build()
        .unwrap();

    let err = session.respond("Oslo in kelvin?").await.unwrap_err();
    let failure = &err.failures()[0];
    assert_eq!(failure.index, 0);
    assert!(matches!(*failure.error, AgentError::InvalidArgument(ref m) if m.contains("unit")));
    let roles: Vec<Role> = session.transcript().iter().map(|e| e.message.role).collect();
    assert_eq!(roles, vec![Role::User]);
}

#[test]
fn definitions_expose_schema() {
    let definition = weather().definition();
    assert_eq!(definition.name, "weather");
    assert_eq!(definition.parameters["required"], json!(["city"]));
    assert_eq!(definition.parameters["properties"]["unit"]["enum"], json!(["c", "f"]));
}

#[test]
fn registry_reports_names_in_order() {
    let mut registry = FunctionRegistry::new();
    registry.register(Arc::new(weather())).unwrap();
    registry.register(Arc::new(common::echo_function())).unwrap();
    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["weather", "echo"]);
    assert!(registry.get("echo").is_some());
    assert!(registry.get("missing").is_none());
}

#[test]
fn arguments_decode_into_structs() {
    let args = FunctionArguments::new(json!({"city": "Turku"}));
    let input: WeatherInput = args.decode().unwrap();
    assert_eq!(input.city, "Turku");
    assert!(input.unit.is_none());

    let err = FunctionArguments::new(json!({"town": "Turku"}))
        .decode::<WeatherInput>()
        .unwrap_err();
    assert!(matches!(err, AgentError::InvalidArgument(_)));
}
