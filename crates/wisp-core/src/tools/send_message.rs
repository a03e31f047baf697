//! Tool for messaging sub-agents from the top-level assistant

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::{ToolHandler, json_schema};
use crate::router::SubAgentRouter;

/// Sends a message to a named sub-agent and returns its reply
pub struct SendMessageTool {
    router: Arc<SubAgentRouter>,
}

impl SendMessageTool {
    pub fn new(router: Arc<SubAgentRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl ToolHandler for SendMessageTool {
    fn name(&self) -> &str {
        "send_message"
    }

    fn description(&self) -> &str {
        "Send a message to one of your sub-agents and get their reply"
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "recipient": {
                    "type": "string",
                    "description": "Name of the sub-agent to message"
                },
                "message": {
                    "type": "string",
                    "description": "The message to deliver"
                }
            }),
            vec!["recipient", "message"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let recipient = input
            .get("recipient")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("send_message requires a 'recipient' string"))?;
        let message = input
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("send_message requires a 'message' string"))?;
        Ok(self.router.dispatch(recipient, message).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{LlmProvider, ProviderError, ProviderFactory};
    use crate::tools::ToolRegistry;

    struct EmptyFactory;

    impl ProviderFactory for EmptyFactory {
        fn build(
            &self,
            _model_string: &str,
            _temperature: f32,
        ) -> std::result::Result<Box<dyn LlmProvider>, ProviderError> {
            Err(ProviderError::UnsupportedProvider("none".to_string()))
        }
    }

    fn tool_with_empty_router() -> SendMessageTool {
        let router = SubAgentRouter::new(
            vec![],
            Arc::new(EmptyFactory),
            Arc::new(ToolRegistry::new()),
        );
        SendMessageTool::new(Arc::new(router))
    }

    #[tokio::test]
    async fn test_unknown_recipient_returned_as_result() {
        let tool = tool_with_empty_router();
        let result = tool
            .execute(serde_json::json!({"recipient": "ghost", "message": "hi"}))
            .await
            .unwrap();
        assert_eq!(result, "Invalid recipient: ghost");
    }

    #[tokio::test]
    async fn test_missing_arguments_are_errors() {
        let tool = tool_with_empty_router();
        assert!(tool.execute(serde_json::json!({"message": "hi"})).await.is_err());
        assert!(tool.execute(serde_json::json!({"recipient": "planner"})).await.is_err());
    }

    #[test]
    fn test_schema_lists_required_fields() {
        let tool = tool_with_empty_router();
        let schema = tool.input_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(required, vec!["recipient", "message"]);
    }
}
