use std::{
    fmt::{Debug, Display},
    time::Duration,
};

use reqwest::{
    blocking::{Client, ClientBuilder},
    header::CONTENT_TYPE,
    Certificate, Proxy,
};
use tracing::debug;

#[derive(Debug, PartialEq, Clone, Default, Eq)]
pub struct GptClientOption {
    pub proxy: Option<String>,
    pub ca_path: Option<String>,
    /// API root such as `https://api.openai.com/v1`; `None` uses OpenAI.
    pub base_url: Option<String>,
}
impl GptClientOption {
    pub fn from_env() -> Self {
        Self {
            proxy: proxy_from_env(),
            ca_path: root_ca_from_env(),
            base_url: first_env(&["OPENAI_BASE_URL"]),
        }
    }
}

fn first_env(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| std::env::var(key).ok())
}

fn root_ca_from_env() -> Option<String> {
    first_env(&["CA_BUNDLE", "ca_bundle"])
}

fn proxy_from_env() -> Option<String> {
    first_env(&["HTTPS_PROXY", "https_proxy", "HTTP_PROXY", "http_proxy"])
}

pub struct GptClient {
    key: OpenAIKey,
    url: String,
    http: Client,
}
impl GptClient {
    const BASE_URL: &'static str = "https://api.openai.com/v1";
    pub fn new(key: OpenAIKey, option: GptClientOption) -> Result<Self> {
        let mut builder = Client::builder().timeout(None::<Duration>);
        if let Some(proxy) = option.proxy {
            builder = Self::with_proxy(builder, proxy)?;
        }
        if let Some(ca) = option.ca_path {
            builder = Self::with_ca(builder, ca)?;
        }
        let url = format!(
            "{}/chat/completions",
            option
                .base_url
                .as_deref()
                .unwrap_or(Self::BASE_URL)
                .trim_end_matches('/')
        );
        let http = builder.build().map_err(|e| {
            GptClientError::new(
                "failed to build http client".to_string(),
                GptClientErrorKind::RequestError(e.to_string()),
            )
        })?;
        Ok(Self { key, url, http })
    }
    pub fn complete(&self, model: OpenAIModel, messages: &[Message]) -> Result<ChatCompletion> {
        let request = ChatRequest::new(model, messages.to_vec());
        debug!(
            model = model.as_str(),
            messages = messages.len(),
            url = self.url.as_str(),
            "send chat request"
        );
        let response = self
            .http
            .post(self.url.as_str())
            .bearer_auth(self.key.key())
            .header(CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .map_err(|e| {
                GptClientError::new(
                    "Cause Error at GptClient::complete".to_string(),
                    GptClientErrorKind::RequestError(e.to_string()),
                )
            })?;
        let status = response.status();
        let body = response.text().map_err(|e| {
            GptClientError::new(
                "failed to read response body".to_string(),
                GptClientErrorKind::RequestError(e.to_string()),
            )
        })?;
        if !status.is_success() {
            return Err(GptClientError::new(
                body,
                GptClientErrorKind::ResponseError(status.as_u16()),
            ));
        }
        ChatCompletion::from_json(&body)
    }
    fn with_proxy(builder: ClientBuilder, proxy: String) -> Result<ClientBuilder> {
        let proxy_conf = Proxy::all(proxy.as_str()).map_err(|_e| {
            GptClientError::new(
                "invalid proxy url".to_string(),
                GptClientErrorKind::InvalidUrl(proxy.clone()),
            )
        })?;
        debug!(proxy = proxy.as_str(), "use proxy");
        Ok(builder.proxy(proxy_conf))
    }
    fn with_ca(builder: ClientBuilder, ca: String) -> Result<ClientBuilder> {
        let not_found = |e: String| {
            GptClientError::new(
                format!("invalid ca: {}", e),
                GptClientErrorKind::NotFoundCAFile(ca.clone()),
            )
        };
        let pem = std::fs::read(&ca).map_err(|e| not_found(e.to_string()))?;
        let cert = Certificate::from_pem(&pem).map_err(|e| not_found(e.to_string()))?;
        Ok(builder.add_root_certificate(cert))
    }
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize)]
pub struct OpenAIKey(String);

impl OpenAIKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
    fn key(&self) -> &str {
        self.0.as_str()
    }
}
impl Debug for OpenAIKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", "x".repeat(self.0.len()))
    }
}
impl Display for OpenAIKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", "x".repeat(self.0.len()))
    }
}

#[derive(Debug, Clone, serde::Serialize, PartialEq, Eq)]
pub struct ChatRequest {
    model: OpenAIModel,
    messages: Vec<Message>,
}
impl ChatRequest {
    pub fn new(model: OpenAIModel, messages: Vec<Message>) -> Self {
        Self { model, messages }
    }
}

/// Non-streaming body returned by the chat completions endpoint.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize, PartialEq, Eq)]
pub struct ChatCompletion {
    pub choices: Vec<Choice>,
    pub usage: Usage,
}
impl ChatCompletion {
    pub fn new(reply: impl Into<String>, usage: Usage) -> Self {
        Self {
            choices: vec![Choice {
                message: Message::new(Role::Assistant, reply),
            }],
            usage,
        }
    }
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| {
            GptClientError::new(
                format!("Failed to parse chat response: {}", body),
                GptClientErrorKind::ResponseDeserializeError(e.to_string()),
            )
        })
    }
    /// Content of the first choice; the API always answers with at least one.
    pub fn reply_text(&self) -> Result<&str> {
        self.choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| {
                GptClientError::new(
                    "completion has no choices".to_string(),
                    GptClientErrorKind::EmptyChoices,
                )
            })
    }
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize, PartialEq, Eq)]
pub struct Choice {
    pub message: Message,
}

#[derive(Debug, Clone, Copy, Default, serde::Deserialize, serde::Serialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}
impl Usage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64, total_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        }
    }
}
impl Display for Usage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} = c:{} + p:{}",
            self.total_tokens, self.completion_tokens, self.prompt_tokens
        )
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Message {
    role: Role,
    pub(crate) content: String,
}
impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
    pub fn role(&self) -> Role {
        self.role
    }
    pub fn content(&self) -> &str {
        &self.content
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    System,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenAIModel {
    #[default]
    Gpt3Dot5Turbo,
    Gpt4,
}
impl serde::Serialize for OpenAIModel {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl OpenAIModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpt3Dot5Turbo => "gpt-3.5-turbo",
            Self::Gpt4 => "gpt-4",
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct GptClientError {
    message: String,
    pub kind: GptClientErrorKind,
}
impl GptClientError {
    pub fn new(message: String, kind: GptClientErrorKind) -> Self {
        Self { message, kind }
    }
}
impl Display for GptClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "kind : {}\n message : {}", self.kind, self.message)
    }
}
impl std::error::Error for GptClientError {}

#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum GptClientErrorKind {
    #[error("Not found CA File. File is : {0}")]
    NotFoundCAFile(String),
    #[error("Invalid Url. Url is : {0}")]
    InvalidUrl(String),
    #[error("Request Error to {0}")]
    RequestError(String),
    #[error("Response Error. Status is : {0}")]
    ResponseError(u16),
    #[error("Not Deserialize response. Serde Error is :  {0}")]
    ResponseDeserializeError(String),
    #[error("Response has no choices")]
    EmptyChoices,
}
pub type Result<T> = std::result::Result<T, GptClientError>;

#[cfg(test)]
mod tests {
    use super::fakes::*;
    use super::*;

    #[test]
    #[ignore = "実際に通信するので、CIでのテストは行わない"]
    fn gptと実際の通信を行うことが可能() {
        let key = OpenAIKey::new(std::env::var("OPENAI_API_KEY").unwrap());
        let client = GptClient::new(key, GptClientOption::from_env()).unwrap();

        let result = client
            .complete(
                OpenAIModel::Gpt3Dot5Turbo,
                &[Message::new(Role::User, "hello")],
            )
            .unwrap();

        assert!(result.reply_text().unwrap().len() > 0);
        assert!(result.usage.total_tokens > 0);
    }
    #[test]
    fn requestはmodelとmessagesをapiの形式でシリアライズする() {
        let req = ChatRequest::new(
            OpenAIModel::Gpt4,
            vec![
                Message::new(Role::System, "I am a helpful assistant."),
                Message::new(Role::User, "hello"),
            ],
        );

        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "model": "gpt-4",
                "messages": [
                    { "role": "system", "content": "I am a helpful assistant." },
                    { "role": "user", "content": "hello" }
                ]
            })
        );
    }
    #[test]
    #[allow(non_snake_case)]
    fn gptのレスポンスをChatCompletionに変換可能() {
        let completion = ChatCompletion::from_json(&make_completion_json("Hello World")).unwrap();

        assert_eq!(completion.reply_text().unwrap(), "Hello World");
        assert_eq!(completion.usage, Usage::new(10, 5, 15));
        assert_eq!(completion.choices[0].message.role(), Role::Assistant);
    }
    #[test]
    fn スキーマが異なるレスポンスはエラーになる() {
        let err = ChatCompletion::from_json(r#"{"choices": []}"#).unwrap_err();

        assert!(matches!(
            err.kind,
            GptClientErrorKind::ResponseDeserializeError(_)
        ));
    }
    #[test]
    fn choicesが空のレスポンスからは返答を取り出せない() {
        let completion = ChatCompletion::from_json(
            r#"{"choices": [], "usage": {"prompt_tokens": 1, "completion_tokens": 0, "total_tokens": 1}}"#,
        )
        .unwrap();

        assert_eq!(
            completion.reply_text().unwrap_err().kind,
            GptClientErrorKind::EmptyChoices
        );
    }
    #[test]
    fn usageはtotal_completion_promptの順に表示される() {
        assert_eq!(Usage::new(10, 5, 15).to_string(), "15 = c:5 + p:10");
    }
    #[test]
    fn api_keyは表示時にマスクされる() {
        let key = OpenAIKey::new("sk-abc");

        assert_eq!(key.to_string(), "xxxxxx");
        assert_eq!(format!("{:?}", key), "xxxxxx");
    }
    #[test]
    fn 不正なproxyはinvalid_urlエラーになる() {
        let result = GptClient::new(
            OpenAIKey::new("sk-abc"),
            GptClientOption {
                proxy: Some("http://[::1".to_string()),
                ..Default::default()
            },
        );

        assert!(matches!(
            result.map(|_| ()).unwrap_err().kind,
            GptClientErrorKind::InvalidUrl(_)
        ));
    }
    #[test]
    fn 存在しないca_fileはエラーになる() {
        let result = GptClient::new(
            OpenAIKey::new("sk-abc"),
            GptClientOption {
                ca_path: Some("/no/such/ca.pem".to_string()),
                ..Default::default()
            },
        );

        assert!(matches!(
            result.map(|_| ()).unwrap_err().kind,
            GptClientErrorKind::NotFoundCAFile(_)
        ));
    }
}
