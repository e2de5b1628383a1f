use std::env;

use dotenvy::dotenv;
use kotoba_ask::http::reqwest::default_dyn_transport;
use kotoba_ask::{AggregatorConfig, ProviderResult, build_aggregator};

fn load_env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[tokio::test]
#[ignore = "requires API_KEY_* variables for every preset provider"]
async fn preset_live_round() {
    let _ = dotenv();
    let _ = tracing_subscriber::fmt()
        .with_env_filter("kotoba_ask=info")
        .try_init();

    let required = [
        "API_KEY_CHATGPT",
        "API_KEY_GEMINI",
        "API_KEY_BING",
        "API_KEY_DEEPSEEK",
        "AZURE_OPENAI_ENDPOINT",
        "AZURE_OPENAI_DEPLOYMENT",
    ];
    let missing: Vec<_> = required
        .iter()
        .filter(|key| load_env_var(key).is_none())
        .collect();
    if !missing.is_empty() {
        eprintln!("skipping live test, missing {missing:?}");
        return;
    }

    let transport = default_dyn_transport().expect("transport");
    let aggregator =
        build_aggregator(&AggregatorConfig::preset(), transport).expect("build preset");

    aggregator.set_question("Please introduce Rust language in one sentence.");
    aggregator.dispatch().await;

    let snapshot = aggregator.snapshot();
    assert!(!snapshot.busy);
    for slot in &snapshot.results {
        println!("[{}] {:?}", slot.provider, slot.result);
        assert!(!matches!(slot.result, ProviderResult::Pending));
    }
}
