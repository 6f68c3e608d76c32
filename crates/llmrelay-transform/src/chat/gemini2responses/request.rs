use llmrelay_protocol::gemini::request::GenerateContentRequest;
use llmrelay_protocol::gemini::types::Content;
use llmrelay_protocol::openai_responses::request::{
    InputContent, InputItem, InputPart, ResponseInput, ResponsesRequest,
};

/// Convert a Gemini generate-content request into a Responses request.
pub fn transform_request(model: String, request: GenerateContentRequest) -> ResponsesRequest {
    let mut items = Vec::new();

    for content in &request.contents {
        let text = flatten_text(content);
        if text.is_empty() {
            continue;
        }
        let (role, part) = if content.role.as_deref() == Some("model") {
            ("assistant", InputPart::OutputText { text })
        } else {
            ("user", InputPart::InputText { text })
        };
        items.push(InputItem {
            role: role.to_string(),
            content: InputContent::Parts(vec![part]),
        });
    }

    let input = match items.as_slice() {
        [InputItem { role, content }] if role == "user" => ResponseInput::Text(content.flatten()),
        _ => ResponseInput::Items(items),
    };

    let mut out = ResponsesRequest::new(model, input);
    out.instructions = request
        .system_instruction
        .as_ref()
        .map(flatten_text)
        .filter(|text| !text.is_empty());
    if let Some(config) = &request.generation_config {
        out.max_output_tokens = config.max_output_tokens;
        out.temperature = config.temperature;
        out.top_p = config.top_p;
    }
    out
}

fn flatten_text(content: &Content) -> String {
    content
        .parts
        .iter()
        .filter(|part| part.thought != Some(true))
        .filter_map(|part| part.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::gemini::types::Part;

    #[test]
    fn model_turns_become_assistant_items() {
        let request = GenerateContentRequest {
            contents: vec![
                Content::user(vec![Part::text("q")]),
                Content::model(vec![Part::text("a")]),
            ],
            system_instruction: Some(Content::user(vec![Part::text("sys")])),
            ..GenerateContentRequest::default()
        };
        let out = transform_request("gpt-4o".to_string(), request);
        assert_eq!(out.instructions.as_deref(), Some("sys"));
        let ResponseInput::Items(items) = out.input else {
            panic!("expected items");
        };
        assert_eq!(items[1].role, "assistant");
    }
}
