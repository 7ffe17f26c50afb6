use std::sync::Arc;

use orchestra_agents::adapters::scripted::ScriptedGateway;
use orchestra_agents::memory::{WorkspaceStore, assistant_tools};
use orchestra_agents::prelude::*;
use serde_json::json;

#[tokio::test]
async fn configured_assistant_run() {
    let config = RunConfig::from_toml_str(
        r"
        [run]
        max_turns = 3
        tool_timeout_ms = 500
        ",
    )
    .unwrap();

    let store = Arc::new(WorkspaceStore::new());
    let assistant = Agent::builder("Personal Assistant")
        .with_instructions("Help the user manage tasks and notes")
        .with_tools(assistant_tools(&store).unwrap())
        .build()
        .unwrap();
    let gateway = ScriptedGateway::from_steps([
        ModelResponse::tool_call("c1", "add_task", json!({"title": "call mom"})),
        ModelResponse::final_text("Added it."),
    ]);
    let runner = Runner::new(
        Arc::new(gateway),
        AgentRegistry::from_agents([assistant]).unwrap(),
    )
    .with_config(config);

    let result = runner
        .run_named("Personal Assistant", "remind me to call mom")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.final_output(), "Added it.");
    assert_eq!(store.list_tasks(None, None).await[0].title, "call mom");
}
