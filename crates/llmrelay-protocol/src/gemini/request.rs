use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::types::{Content, GenerationConfig, Tool, ToolConfig};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateContentRequest {
    #[serde(default)]
    pub contents: Vec<Content>,
    /// Some clients send the snake_case spelling; both are accepted.
    #[serde(
        rename = "systemInstruction",
        alias = "system_instruction",
        skip_serializing_if = "Option::is_none"
    )]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(rename = "toolConfig", skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<ToolConfig>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    #[serde(rename = "safetySettings", skip_serializing_if = "Option::is_none")]
    pub safety_settings: Option<JsonValue>,
}

impl GenerateContentRequest {
    /// Normalize roles before the request goes upstream: a missing
    /// system-instruction role becomes `user`, and so does any absent or
    /// empty `contents[i].role`.
    pub fn normalize_roles(&mut self) {
        if let Some(instruction) = &mut self.system_instruction
            && instruction
                .role
                .as_deref()
                .map(str::is_empty)
                .unwrap_or(true)
        {
            instruction.role = Some("user".to_string());
        }
        for content in &mut self.contents {
            if content.role.as_deref().map(str::is_empty).unwrap_or(true) {
                content.role = Some("user".to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::types::Part;

    #[test]
    fn snake_case_system_instruction_is_accepted() {
        let parsed: GenerateContentRequest = serde_json::from_str(
            r#"{"contents":[],"system_instruction":{"parts":[{"text":"sys"}]}}"#,
        )
        .unwrap();
        assert!(parsed.system_instruction.is_some());
    }

    #[test]
    fn normalize_assigns_user_roles() {
        let mut request = GenerateContentRequest {
            contents: vec![Content {
                role: None,
                parts: vec![Part::text("hi")],
            }],
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part::text("sys")],
            }),
            ..GenerateContentRequest::default()
        };
        request.normalize_roles();
        assert_eq!(request.contents[0].role.as_deref(), Some("user"));
        assert_eq!(
            request.system_instruction.unwrap().role.as_deref(),
            Some("user")
        );
    }
}
