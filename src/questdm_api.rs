//! Typed wrappers over the QuestDM backend routes.

use reqwest::Response;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::{error::ApiError, http_client::ApiClient};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub parameter_size: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct CurrentModel {
    model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelUpdate {
    pub message: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Story {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Character {
    pub name: String,
    #[serde(default)]
    pub race: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub backstory: String,
}

/// Fields for `create_story`; `characters` names character templates to copy.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewStory<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub genre: &'a str,
    pub mode: &'a str,
    pub characters: Vec<&'a str>,
}

/// Fields for `create_character`. `advanced` holds optional sheet entries
/// such as `ability_scores` or `level`, sent as top-level keys.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewCharacter<'a> {
    pub name: &'a str,
    pub race: &'a str,
    pub class: &'a str,
    pub backstory: &'a str,
    #[serde(flatten)]
    pub advanced: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoryUpdate {
    pub message: String,
    pub story: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CharacterCreated {
    pub message: String,
    pub character: Value,
}

/// A loaded story plus its conversation transformed for display.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoadedStory {
    pub story: Value,
    #[serde(default)]
    pub conversation: Vec<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SettingsChange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_accuracy: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub message: String,
    pub model_accuracy: u32,
    pub context_size: u32,
}

#[derive(Debug, Deserialize)]
struct StoryList {
    stories: Vec<Story>,
}

#[derive(Debug, Deserialize)]
struct CharacterList {
    characters: Vec<Character>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub story_name: &'a str,
    pub message: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    content: String,
}

pub async fn list_models(client: &ApiClient) -> Result<Vec<ModelInfo>, ApiError> {
    client.get("/list_models").await
}

pub async fn current_model(client: &ApiClient) -> Result<String, ApiError> {
    let current: CurrentModel = client.get("/get_model").await?;
    Ok(current.model)
}

pub async fn set_model(client: &ApiClient, model_name: &str) -> Result<ModelUpdate, ApiError> {
    client
        .post("/set_model", &json!({ "model_name": model_name }))
        .await
}

pub async fn get_stories(client: &ApiClient) -> Result<Vec<Story>, ApiError> {
    let list: StoryList = client.get("/get_stories").await?;
    Ok(list.stories)
}

pub async fn get_characters(client: &ApiClient) -> Result<Vec<Character>, ApiError> {
    let list: CharacterList = client.get("/get_characters").await?;
    Ok(list.characters)
}

pub async fn create_story(
    client: &ApiClient,
    story: &NewStory<'_>,
) -> Result<StoryUpdate, ApiError> {
    client.post("/create_story", story).await
}

pub async fn load_story(client: &ApiClient, name: &str) -> Result<LoadedStory, ApiError> {
    client.post("/load_story", &json!({ "name": name })).await
}

/// `changes` is merged over the stored story; a rename keeps `original_name` as the key.
pub async fn edit_story(
    client: &ApiClient,
    original_name: &str,
    changes: &Value,
) -> Result<Value, ApiError> {
    client
        .put("/edit_story", &with_original_name(original_name, changes))
        .await
}

pub async fn create_character(
    client: &ApiClient,
    character: &NewCharacter<'_>,
) -> Result<CharacterCreated, ApiError> {
    client.post("/create_character", character).await
}

pub async fn edit_character(
    client: &ApiClient,
    original_name: &str,
    changes: &Value,
) -> Result<Value, ApiError> {
    client
        .put("/edit_character", &with_original_name(original_name, changes))
        .await
}

pub async fn update_settings(
    client: &ApiClient,
    change: SettingsChange,
) -> Result<Settings, ApiError> {
    client.post("/update_settings", &change).await
}

fn with_original_name(original_name: &str, changes: &Value) -> Value {
    let mut body = match changes {
        Value::Object(fields) => fields.clone(),
        _ => Map::new(),
    };
    body.insert("originalName".to_string(), Value::from(original_name));
    Value::Object(body)
}

pub async fn delete_story(client: &ApiClient, name: &str) -> Result<String, ApiError> {
    let reply: Message = client
        .delete("/delete_story", Some(&json!({ "name": name })))
        .await?;
    Ok(reply.message)
}

pub async fn delete_character(client: &ApiClient, name: &str) -> Result<String, ApiError> {
    let reply: Message = client
        .delete("/delete_character", Some(&json!({ "name": name })))
        .await?;
    Ok(reply.message)
}

pub async fn chat(client: &ApiClient, request: &ChatRequest<'_>) -> Result<ChatStream, ApiError> {
    let response = client.stream_post("/chat", request).await?;
    Ok(ChatStream::new(response))
}

/// Reads the `text/event-stream` reply of `/chat` one `data:` event at a time.
pub struct ChatStream {
    response: Response,
    buffer: Vec<u8>,
    finished: bool,
}

impl ChatStream {
    fn new(response: Response) -> Self {
        Self {
            response,
            buffer: Vec::new(),
            finished: false,
        }
    }

    /// Next content fragment, or `None` once the backend closes the stream.
    pub async fn next_content(&mut self) -> Result<Option<String>, ApiError> {
        loop {
            if let Some(event) = take_event(&mut self.buffer, self.finished) {
                if let Some(content) = parse_event(&event)? {
                    return Ok(Some(content));
                }
                continue;
            }
            if self.finished {
                return Ok(None);
            }
            match self.response.chunk().await.map_err(ApiError::Decode)? {
                Some(chunk) => self.buffer.extend_from_slice(&chunk),
                None => self.finished = true,
            }
        }
    }

    pub async fn collect_text(mut self) -> Result<String, ApiError> {
        let mut text = String::new();
        while let Some(content) = self.next_content().await? {
            text.push_str(&content);
        }
        Ok(text)
    }
}

fn take_event(buffer: &mut Vec<u8>, finished: bool) -> Option<String> {
    let end = buffer.windows(2).position(|window| window == b"\n\n");
    let event: Vec<u8> = match end {
        Some(end) => {
            let event = buffer[..end].to_vec();
            buffer.drain(..end + 2);
            event
        }
        None if finished && !buffer.is_empty() => std::mem::take(buffer),
        None => return None,
    };
    Some(String::from_utf8_lossy(&event).into_owned())
}

fn parse_event(event: &str) -> Result<Option<String>, ApiError> {
    let data: Vec<&str> = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .collect();
    if data.is_empty() {
        return Ok(None);
    }
    let chunk: ChatChunk = serde_json::from_str(&data.join("\n")).map_err(ApiError::Event)?;
    Ok(Some(chunk.content))
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::*;
    use crate::{http_retry::RetryPolicy, runtime_env::ApiBase};

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::with_base(ApiBase::Absolute(server.base_url()))
            .unwrap()
            .with_retry_policy(RetryPolicy::none())
    }

    #[tokio::test]
    async fn list_models_decodes_model_entries() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/list_models");
                then.status(200).json_body(json!([
                    { "model_name": "llama3.2-vision:latest", "parameter_size": "9.8B" },
                    { "model_name": "qwen2.5:7b", "parameter_size": "N/A" }
                ]));
            })
            .await;

        let models = list_models(&client_for(&server)).await.unwrap();

        assert_eq!(models.len(), 2);
        assert_eq!(models[0].model_name, "llama3.2-vision:latest");
        assert_eq!(models[1].parameter_size, "N/A");
    }

    #[tokio::test]
    async fn current_model_surfaces_backend_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/get_model");
                then.status(500).json_body(json!({ "error": "No models found." }));
            })
            .await;

        let error = current_model(&client_for(&server)).await.unwrap_err();

        assert_eq!(error.to_string(), "API error: 500 Internal Server Error");
    }

    #[tokio::test]
    async fn set_model_posts_model_name() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/set_model")
                    .json_body(json!({ "model_name": "qwen2.5:7b" }));
                then.status(200).json_body(json!({
                    "message": "Model updated to qwen2.5:7b",
                    "model": "qwen2.5:7b"
                }));
            })
            .await;

        let update = set_model(&client_for(&server), "qwen2.5:7b").await.unwrap();

        assert_eq!(update.model, "qwen2.5:7b");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn stories_and_characters_are_unwrapped() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/get_stories");
                then.status(200).json_body(json!({
                    "stories": [{ "name": "Dragon Keep", "genre": "fantasy", "mode": "dnd" }]
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/get_characters");
                then.status(200).json_body(json!({
                    "characters": [{ "name": "Ilsa", "race": "elf", "class": "ranger" }]
                }));
            })
            .await;
        let client = client_for(&server);

        let stories = get_stories(&client).await.unwrap();
        let characters = get_characters(&client).await.unwrap();

        assert_eq!(stories[0].mode, "dnd");
        assert_eq!(stories[0].description, "");
        assert_eq!(characters[0].class, "ranger");
    }

    #[tokio::test]
    async fn delete_story_sends_name_in_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path("/delete_story")
                    .json_body(json!({ "name": "Dragon Keep" }));
                then.status(200)
                    .json_body(json!({ "message": "Story 'Dragon Keep' deleted successfully." }));
            })
            .await;

        let message = delete_story(&client_for(&server), "Dragon Keep").await.unwrap();

        assert!(message.contains("Dragon Keep"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn create_story_posts_fields_and_character_names() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/create_story").json_body(json!({
                    "name": "Dragon Keep",
                    "description": "A keep under siege",
                    "genre": "fantasy",
                    "mode": "dnd",
                    "characters": ["Ilsa"]
                }));
                then.status(200).json_body(json!({
                    "message": "Story 'Dragon Keep' created successfully!",
                    "story": { "name": "Dragon Keep", "characters": { "Ilsa": {} } }
                }));
            })
            .await;

        let story = NewStory {
            name: "Dragon Keep",
            description: "A keep under siege",
            genre: "fantasy",
            mode: "dnd",
            characters: vec!["Ilsa"],
        };
        let created = create_story(&client_for(&server), &story).await.unwrap();

        assert!(created.message.contains("created"));
        assert_eq!(created.story["name"], "Dragon Keep");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn load_story_returns_story_and_display_conversation() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/load_story")
                    .json_body(json!({ "name": "Dragon Keep" }));
                then.status(200).json_body(json!({
                    "story": { "name": "Dragon Keep", "mode": "dnd" },
                    "conversation": [{ "role": "assistant", "content": "Welcome." }]
                }));
            })
            .await;

        let loaded = load_story(&client_for(&server), "Dragon Keep").await.unwrap();

        assert_eq!(loaded.story["mode"], "dnd");
        assert_eq!(loaded.conversation.len(), 1);
    }

    #[tokio::test]
    async fn load_story_of_unknown_name_is_status_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/load_story");
                then.status(404)
                    .json_body(json!({ "error": "Story with the name 'Nope' does not exist." }));
            })
            .await;

        let error = load_story(&client_for(&server), "Nope").await.unwrap_err();

        assert_eq!(error.status(), Some(reqwest::StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn edit_story_puts_changes_with_original_name() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT).path("/edit_story").json_body(json!({
                    "originalName": "Dragon Keep",
                    "name": "Dragon Hold",
                    "genre": "horror"
                }));
                then.status(200)
                    .json_body(json!({ "name": "Dragon Hold", "genre": "horror" }));
            })
            .await;

        let updated = edit_story(
            &client_for(&server),
            "Dragon Keep",
            &json!({ "name": "Dragon Hold", "genre": "horror" }),
        )
        .await
        .unwrap();

        assert_eq!(updated["name"], "Dragon Hold");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn create_and_edit_character_send_sheet_fields() {
        let server = MockServer::start_async().await;
        let created_mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/create_character").json_body(json!({
                    "name": "Ilsa",
                    "race": "elf",
                    "class": "ranger",
                    "backstory": "",
                    "level": 3
                }));
                then.status(200).json_body(json!({
                    "message": "Character created successfully!",
                    "character": { "name": "Ilsa", "level": 3 }
                }));
            })
            .await;
        let edited_mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/edit_character")
                    .json_body(json!({ "originalName": "Ilsa", "level": 4 }));
                then.status(200).json_body(json!({ "name": "Ilsa", "level": 4 }));
            })
            .await;
        let client = client_for(&server);

        let mut advanced = Map::new();
        advanced.insert("level".to_string(), json!(3));
        let character = NewCharacter {
            name: "Ilsa",
            race: "elf",
            class: "ranger",
            backstory: "",
            advanced,
        };
        let created = create_character(&client, &character).await.unwrap();
        let edited = edit_character(&client, "Ilsa", &json!({ "level": 4 }))
            .await
            .unwrap();

        assert_eq!(created.character["level"], 3);
        assert_eq!(edited["level"], 4);
        created_mock.assert_async().await;
        edited_mock.assert_async().await;
    }

    #[tokio::test]
    async fn update_settings_sends_only_changed_values() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/update_settings")
                    .json_body(json!({ "context_size": 8192 }));
                then.status(200).json_body(json!({
                    "message": "Settings updated successfully.",
                    "model_accuracy": 5,
                    "context_size": 8192
                }));
            })
            .await;

        let change = SettingsChange {
            model_accuracy: None,
            context_size: Some(8192),
        };
        let settings = update_settings(&client_for(&server), change).await.unwrap();

        assert_eq!(settings.context_size, 8192);
        assert_eq!(settings.model_accuracy, 5);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn chat_stream_yields_content_fragments() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat")
                    .json_body(json!({ "story_name": "Dragon Keep", "message": "I open the door" }));
                then.status(200)
                    .header("content-type", "text/event-stream")
                    .body("data: {\"content\": \"The door \"}\n\ndata: {\"content\": \"creaks open.\"}\n\n");
            })
            .await;

        let request = ChatRequest {
            story_name: "Dragon Keep",
            message: "I open the door",
        };
        let mut stream = chat(&client_for(&server), &request).await.unwrap();

        assert_eq!(stream.next_content().await.unwrap().as_deref(), Some("The door "));
        assert_eq!(stream.next_content().await.unwrap().as_deref(), Some("creaks open."));
        assert_eq!(stream.next_content().await.unwrap(), None);
    }

    #[test]
    fn take_event_keeps_partial_event_until_finished() {
        let mut buffer = b"data: {\"content\": \"a\"}\n\ndata: {\"content\"".to_vec();

        assert_eq!(
            take_event(&mut buffer, false).as_deref(),
            Some("data: {\"content\": \"a\"}")
        );
        assert_eq!(take_event(&mut buffer, false), None);
        assert_eq!(
            take_event(&mut buffer, true).as_deref(),
            Some("data: {\"content\"")
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn parse_event_ignores_comments_and_rejects_bad_json() {
        assert_eq!(parse_event(": keep-alive").unwrap(), None);
        assert!(matches!(parse_event("data: not json"), Err(ApiError::Event(_))));
    }
}
