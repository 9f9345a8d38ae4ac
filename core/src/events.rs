use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

/// Identifier of a configured agent persona.
///
/// Upstream publishers send it either as a JSON number (`7`) or as a string
/// (`"7"`). Both normalize to the same textual form, which is what the stores
/// and bus keys use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for AgentId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for AgentId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(AgentId::new(Scalar::deserialize(deserializer)?.into_text()))
    }
}

/// An identifier as it appears on the wire: a JSON number or a JSON string.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Integer(i64),
    Text(String),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Integer(value) => value.to_string(),
            Scalar::Text(value) => value,
        }
    }
}

/// Optional identifier field that accepts a number or a string.
fn optional_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(Scalar::into_text))
}

/// Chat message event as published on `chat_messages`.
///
/// Every field is optional at the wire level so that a payload with a missing
/// field still decodes and can be rejected with a precise reason.
#[derive(Debug, Default, Deserialize)]
pub struct ChatEvent {
    #[serde(default, deserialize_with = "optional_scalar")]
    pub conversation_id: Option<String>,
    #[serde(default, deserialize_with = "optional_scalar")]
    pub user_id: Option<String>,
    pub agent_id: Option<AgentId>,
    pub message: Option<String>,
}

/// A chat event that passed validation. All identifiers are non-blank; the
/// message is present but may be blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub conversation_id: String,
    pub user_id: String,
    pub agent_id: AgentId,
    pub message: String,
}

impl ChatEvent {
    pub fn parse(payload: &str) -> Result<ChatMessage, ValidationError> {
        let event: ChatEvent = serde_json::from_str(payload)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        event.validate()
    }

    pub fn validate(self) -> Result<ChatMessage, ValidationError> {
        let conversation_id = required_text(self.conversation_id, "conversation_id")?;
        let user_id = required_text(self.user_id, "user_id")?;
        let agent_id = required_agent(self.agent_id)?;
        let message = self
            .message
            .ok_or(ValidationError::MissingField { field: "message" })?;

        Ok(ChatMessage {
            conversation_id,
            user_id,
            agent_id,
            message,
        })
    }
}

/// Document types the worker can extract text from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Pdf,
    Docx,
    Txt,
}

impl FileType {
    /// Case-insensitive match against the closed set. `None` means unsupported.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" => Some(Self::Txt),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Txt => "txt",
        }
    }
}

/// How the `content` string of a file upload maps to file bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentEncoding {
    /// The UTF-8 bytes of the string are the file
    #[default]
    Utf8,
    /// The string is standard base64 of the raw file
    Base64,
}

impl ContentEncoding {
    fn parse(raw: Option<String>) -> Result<Self, ValidationError> {
        let Some(raw) = raw else {
            return Ok(Self::Utf8);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "utf8" | "utf-8" | "text" => Ok(Self::Utf8),
            "base64" => Ok(Self::Base64),
            _ => Err(ValidationError::UnsupportedEncoding(raw)),
        }
    }
}

/// File upload event as published on `file_uploads`.
#[derive(Debug, Default, Deserialize)]
pub struct FileEvent {
    pub agent_id: Option<AgentId>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub content: Option<String>,
    pub content_encoding: Option<String>,
}

/// A file event that passed validation.
///
/// `file_type` keeps the declared tag verbatim; an unsupported tag is still a
/// valid upload and simply extracts to nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub agent_id: AgentId,
    pub file_name: String,
    pub file_type: String,
    pub content: String,
    pub encoding: ContentEncoding,
}

impl FileUpload {
    pub fn kind(&self) -> Option<FileType> {
        FileType::parse(&self.file_type)
    }
}

impl FileEvent {
    pub fn parse(payload: &str) -> Result<FileUpload, ValidationError> {
        let event: FileEvent = serde_json::from_str(payload)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        event.validate()
    }

    pub fn validate(self) -> Result<FileUpload, ValidationError> {
        let agent_id = required_agent(self.agent_id)?;
        let file_name = required_text(self.file_name, "file_name")?;
        // Present but blank is allowed here: it resolves to "unsupported".
        let file_type = self
            .file_type
            .ok_or(ValidationError::MissingField { field: "file_type" })?;
        // Empty files are legitimate uploads.
        let content = self
            .content
            .ok_or(ValidationError::MissingField { field: "content" })?;
        let encoding = ContentEncoding::parse(self.content_encoding)?;

        Ok(FileUpload {
            agent_id,
            file_name,
            file_type,
            content,
            encoding,
        })
    }
}

/// Payload published on the per-user response channel and cached under the
/// per-conversation key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePayload {
    pub conversation_id: String,
    pub text: String,
}

fn required_text(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ValidationError::MissingField { field })
}

fn required_agent(value: Option<AgentId>) -> Result<AgentId, ValidationError> {
    value
        .filter(|v| !v.is_blank())
        .ok_or(ValidationError::MissingField { field: "agent_id" })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn chat_event_accepts_numeric_agent_id() {
        let payload = json!({
            "conversation_id": "c1",
            "user_id": "u1",
            "agent_id": 7,
            "message": "hi"
        })
        .to_string();

        let msg = ChatEvent::parse(&payload).expect("event should validate");
        assert_eq!(msg.agent_id, AgentId::new("7"));
        assert_eq!(msg.agent_id.as_str(), "7");
        assert_eq!(msg.message, "hi");
    }

    #[test]
    fn chat_event_accepts_string_agent_id() {
        let payload = r#"{"conversation_id":"c1","user_id":"u1","agent_id":" 7 ","message":"hi"}"#;
        let msg = ChatEvent::parse(payload).expect("event should validate");
        assert_eq!(msg.agent_id.as_str(), "7");
    }

    #[test]
    fn chat_event_reports_each_missing_field() {
        let full = json!({
            "conversation_id": "c1",
            "user_id": "u1",
            "agent_id": 7,
            "message": "hi"
        });

        for field in ["conversation_id", "user_id", "agent_id", "message"] {
            let mut payload = full.clone();
            payload.as_object_mut().unwrap().remove(field);
            let err = ChatEvent::parse(&payload.to_string()).expect_err("missing field must fail");
            assert_eq!(err, ValidationError::MissingField { field });
        }
    }

    #[test]
    fn chat_event_treats_null_and_blank_as_missing() {
        let null_user = r#"{"conversation_id":"c1","user_id":null,"agent_id":7,"message":"hi"}"#;
        assert_eq!(
            ChatEvent::parse(null_user).unwrap_err(),
            ValidationError::MissingField { field: "user_id" }
        );

        let blank_user = r#"{"conversation_id":"c1","user_id":"  ","agent_id":7,"message":"hi"}"#;
        assert_eq!(
            ChatEvent::parse(blank_user).unwrap_err(),
            ValidationError::MissingField { field: "user_id" }
        );

        let null_message = r#"{"conversation_id":"c1","user_id":"u1","agent_id":7,"message":null}"#;
        assert_eq!(
            ChatEvent::parse(null_message).unwrap_err(),
            ValidationError::MissingField { field: "message" }
        );
    }

    #[test]
    fn chat_event_keeps_blank_message() {
        let payload = r#"{"conversation_id":"c1","user_id":"u1","agent_id":7,"message":"   "}"#;
        let msg = ChatEvent::parse(payload).expect("a present message is valid even when blank");
        assert_eq!(msg.message, "   ");
    }

    #[test]
    fn chat_event_accepts_numeric_user_and_conversation_ids() {
        let payload = r#"{"conversation_id":42,"user_id":5,"agent_id":7,"message":"hi"}"#;
        let msg = ChatEvent::parse(payload).expect("numeric identifiers should validate");
        assert_eq!(msg.conversation_id, "42");
        assert_eq!(msg.user_id, "5");
        assert_eq!(crate::keys::response_channel(&msg.user_id), "user:5:responses");
        assert_eq!(
            crate::keys::response_cache_key(&msg.user_id, &msg.conversation_id),
            "user:5:responses:42"
        );
    }

    #[test]
    fn chat_event_rejects_non_scalar_identifiers() {
        let payload = r#"{"conversation_id":["c1"],"user_id":"u1","agent_id":7,"message":"hi"}"#;
        assert_eq!(ChatEvent::parse(payload).unwrap_err().code(), "malformed_payload");
    }

    #[test]
    fn chat_event_rejects_non_json() {
        let err = ChatEvent::parse("not json").unwrap_err();
        assert_eq!(err.code(), "malformed_payload");
    }

    #[test]
    fn file_type_parse_is_case_insensitive_and_closed() {
        assert_eq!(FileType::parse("PDF"), Some(FileType::Pdf));
        assert_eq!(FileType::parse(".docx"), Some(FileType::Docx));
        assert_eq!(FileType::parse(" txt "), Some(FileType::Txt));
        assert_eq!(FileType::parse("xlsx"), None);
        assert_eq!(FileType::parse(""), None);
    }

    #[test]
    fn file_event_keeps_unsupported_type_valid() {
        let payload = json!({
            "agent_id": 3,
            "file_name": "notes.odt",
            "file_type": "odt",
            "content": "hello"
        })
        .to_string();

        let upload = FileEvent::parse(&payload).expect("unsupported type is still a valid upload");
        assert_eq!(upload.kind(), None);
        assert_eq!(upload.encoding, ContentEncoding::Utf8);
    }

    #[test]
    fn file_event_parses_base64_encoding_and_rejects_unknown() {
        let b64 = r#"{"agent_id":3,"file_name":"a.pdf","file_type":"pdf","content":"aGk=","content_encoding":"BASE64"}"#;
        assert_eq!(FileEvent::parse(b64).unwrap().encoding, ContentEncoding::Base64);

        let gz = r#"{"agent_id":3,"file_name":"a.pdf","file_type":"pdf","content":"x","content_encoding":"gzip"}"#;
        assert_eq!(
            FileEvent::parse(gz).unwrap_err(),
            ValidationError::UnsupportedEncoding("gzip".to_string())
        );
    }

    #[test]
    fn file_event_requires_content_but_allows_empty_content() {
        let missing = r#"{"agent_id":3,"file_name":"a.txt","file_type":"txt"}"#;
        assert_eq!(
            FileEvent::parse(missing).unwrap_err(),
            ValidationError::MissingField { field: "content" }
        );

        let empty = r#"{"agent_id":3,"file_name":"a.txt","file_type":"txt","content":""}"#;
        assert!(FileEvent::parse(empty).is_ok());
    }

    #[test]
    fn response_payload_wire_shape() {
        let payload = ResponsePayload {
            conversation_id: "c1".to_string(),
            text: "hello".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"conversation_id": "c1", "text": "hello"})
        );
    }
}
