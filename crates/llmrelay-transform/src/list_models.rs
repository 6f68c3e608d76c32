//! Model-list conversion between dialects. The Responses dialect shares
//! OpenAI's list shape, so its entries reuse the OpenAI functions.

use llmrelay_protocol::claude::models as claude;
use llmrelay_protocol::gemini::models as gemini;
use llmrelay_protocol::openai::models as openai;

pub fn openai_to_claude(list: openai::ModelList) -> claude::ModelList {
    claude::ModelList {
        data: list
            .data
            .into_iter()
            .map(|model| claude::ModelInfo::new(model.id))
            .collect(),
        has_more: false,
        first_id: None,
        last_id: None,
    }
}

pub fn claude_to_openai(list: claude::ModelList) -> openai::ModelList {
    openai::ModelList::new(
        list.data
            .into_iter()
            .map(|model| openai::ModelInfo {
                id: model.id,
                object: "model".to_string(),
                created: None,
                owned_by: Some("anthropic".to_string()),
            })
            .collect(),
    )
}

pub fn openai_to_gemini(list: openai::ModelList) -> gemini::ModelList {
    gemini::ModelList {
        models: list
            .data
            .into_iter()
            .map(|model| gemini::ModelInfo {
                name: format!("models/{}", model.id),
                ..gemini::ModelInfo::default()
            })
            .collect(),
        next_page_token: None,
    }
}

pub fn gemini_to_openai(list: gemini::ModelList) -> openai::ModelList {
    openai::ModelList::new(
        list.models
            .into_iter()
            .map(|model| {
                let id = model.bare_id().to_string();
                openai::ModelInfo {
                    id,
                    object: "model".to_string(),
                    created: None,
                    owned_by: Some("google".to_string()),
                }
            })
            .collect(),
    )
}

pub fn claude_to_gemini(list: claude::ModelList) -> gemini::ModelList {
    gemini::ModelList {
        models: list
            .data
            .into_iter()
            .map(|model| gemini::ModelInfo {
                name: format!("models/{}", model.id),
                display_name: model.display_name,
                ..gemini::ModelInfo::default()
            })
            .collect(),
        next_page_token: None,
    }
}

pub fn gemini_to_claude(list: gemini::ModelList) -> claude::ModelList {
    claude::ModelList {
        data: list
            .models
            .into_iter()
            .map(|model| {
                let id = model.bare_id().to_string();
                claude::ModelInfo {
                    id,
                    r#type: "model".to_string(),
                    display_name: model.display_name,
                    created_at: None,
                }
            })
            .collect(),
        has_more: false,
        first_id: None,
        last_id: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_names_lose_their_prefix() {
        let list = gemini::ModelList {
            models: vec![gemini::ModelInfo {
                name: "models/gemini-2.5-flash".to_string(),
                ..gemini::ModelInfo::default()
            }],
            next_page_token: None,
        };
        let out = gemini_to_openai(list);
        assert_eq!(out.data[0].id, "gemini-2.5-flash");
        assert_eq!(out.object, "list");
    }

    #[test]
    fn openai_ids_gain_the_gemini_prefix() {
        let list = openai::ModelList::new(vec![openai::ModelInfo::new("gpt-4o")]);
        let out = openai_to_gemini(list);
        assert_eq!(out.models[0].name, "models/gpt-4o");
    }
}
