//! Tool executor doubles

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chorus_llm::{LlmError, McpTool, ToolExecutor, ToolResponse, ToolUse};
use tokio::sync::Notify;

/// Tool definition offered to the model
pub fn tool(name: &str) -> McpTool {
    McpTool {
        id: format!("mock__{name}"),
        name: name.to_owned(),
        server_name: Some("mock".to_owned()),
        description: Some(format!("{name} (mock)")),
        input_schema: serde_json::json!({ "type": "object", "properties": {} }),
    }
}

/// Executor that answers every call with a fixed output and records it
pub struct RecordingTools {
    output: String,
    fail: bool,
    count: AtomicU32,
    calls: Mutex<Vec<ToolUse>>,
}

impl RecordingTools {
    pub fn answering(output: &str) -> Self {
        Self {
            output: output.to_owned(),
            fail: false,
            count: AtomicU32::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail: true,
            ..Self::answering(message)
        }
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn calls(&self) -> Vec<ToolUse> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolExecutor for RecordingTools {
    async fn execute(&self, call: &ToolUse, tool: &McpTool) -> Result<ToolResponse, LlmError> {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.calls.lock().unwrap().push(call.clone());

        if self.fail {
            return Err(LlmError::ToolExecution(self.output.clone()));
        }
        Ok(ToolResponse::success(call.clone(), tool, self.output.clone()))
    }
}

/// Executor whose calls never finish
#[derive(Default)]
pub struct StalledTools {
    started: Notify,
}

impl StalledTools {
    /// Wait until a call is running
    pub async fn started(&self) {
        self.started.notified().await;
    }
}

#[async_trait]
impl ToolExecutor for StalledTools {
    async fn execute(&self, _call: &ToolUse, _tool: &McpTool) -> Result<ToolResponse, LlmError> {
        self.started.notify_one();
        std::future::pending().await
    }
}
