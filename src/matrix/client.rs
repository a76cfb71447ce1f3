//! Matrix Client-Server API 客户端（只实现 bot 需要的部分）
//!
//! - `PUT /rooms/{roomId}/send/m.room.message/{txnId}` 发送消息
//! - `POST /join/{roomId}` 接受邀请
//! - `GET /sync` 长轮询接收命令
//! - `GET /account/whoami` 获取 bot 自己的 user id

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::types::SyncResponse;
use crate::delivery::{DeliveryError, MessageSink};

/// 请求超时需要大于 sync 长轮询时间
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Sync 过滤器：只关心消息事件，不要 presence
const SYNC_FILTER: &str = r#"{"room":{"timeline":{"limit":50,"types":["m.room.message"]}},"presence":{"types":[]},"account_data":{"types":[]}}"#;

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("invalid homeserver url `{0}`")]
    InvalidHomeserver(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{errcode} ({status}): {message}")]
    Api {
        status: u16,
        errcode: String,
        message: String,
    },
}

impl MatrixError {
    pub fn is_forbidden(&self) -> bool {
        matches!(self, MatrixError::Api { status: 403, .. })
    }
}

/// 标准错误响应体
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    errcode: String,
    #[serde(default)]
    error: String,
}

#[derive(Debug, Deserialize)]
struct WhoamiResponse {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    event_id: String,
}

/// `m.room.message` 内容，正文为 markdown，同时附带渲染后的 HTML
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MessageContent {
    pub msgtype: &'static str,
    pub body: String,
    pub format: &'static str,
    pub formatted_body: String,
    #[serde(rename = "m.relates_to", skip_serializing_if = "Option::is_none")]
    pub relates_to: Option<RelatesTo>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RelatesTo {
    #[serde(rename = "m.in_reply_to")]
    pub in_reply_to: InReplyTo,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InReplyTo {
    pub event_id: String,
}

impl MessageContent {
    pub fn markdown(markdown: &str) -> Self {
        Self {
            msgtype: "m.text",
            body: markdown.to_string(),
            format: "org.matrix.custom.html",
            formatted_body: render_html(markdown),
            relates_to: None,
        }
    }

    pub fn in_reply_to(mut self, event_id: impl Into<String>) -> Self {
        self.relates_to = Some(RelatesTo {
            in_reply_to: InReplyTo {
                event_id: event_id.into(),
            },
        });
        self
    }
}

/// markdown -> HTML（Matrix formatted_body）
pub fn render_html(markdown: &str) -> String {
    use pulldown_cmark::{html, Options, Parser};

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options);
    let mut output = String::new();
    html::push_html(&mut output, parser);
    output.trim_end().to_string()
}

/// Matrix 客户端
#[derive(Debug)]
pub struct MatrixClient {
    client: Client,
    homeserver: Url,
    access_token: String,
    txn_counter: AtomicU64,
}

impl MatrixClient {
    /// 创建新的客户端
    pub fn new(homeserver: &str, access_token: &str) -> Result<Self, MatrixError> {
        let homeserver = Url::parse(homeserver)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| MatrixError::InvalidHomeserver(homeserver.to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            homeserver,
            access_token: access_token.to_string(),
            txn_counter: AtomicU64::new(0),
        })
    }

    /// `/_matrix/client/v3/<segments...>`，每个 segment 单独做百分号编码
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.homeserver.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["_matrix", "client", "v3"]).extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url).bearer_auth(&self.access_token)
    }

    /// 每个请求唯一的 transaction id
    fn next_txn_id(&self) -> String {
        let seq = self.txn_counter.fetch_add(1, Ordering::Relaxed);
        format!("alertbot-{}-{}", chrono::Utc::now().timestamp_millis(), seq)
    }

    async fn check(response: Response) -> Result<Response, MatrixError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let body: ApiErrorBody = serde_json::from_str(&text).unwrap_or(ApiErrorBody {
            errcode: "M_UNKNOWN".to_string(),
            error: text,
        });
        Err(MatrixError::Api {
            status: status.as_u16(),
            errcode: body.errcode,
            message: body.error,
        })
    }

    /// 当前 access token 对应的用户
    pub async fn whoami(&self) -> Result<String, MatrixError> {
        let url = self.endpoint(&["account", "whoami"]);
        let response = Self::check(self.request(Method::GET, url).send().await?).await?;
        Ok(response.json::<WhoamiResponse>().await?.user_id)
    }

    /// 加入房间（接受邀请）
    pub async fn join(&self, room_id: &str) -> Result<(), MatrixError> {
        let url = self.endpoint(&["join", room_id]);
        Self::check(
            self.request(Method::POST, url)
                .json(&serde_json::json!({}))
                .send()
                .await?,
        )
        .await?;
        info!(room_id = %room_id, "Joined room");
        Ok(())
    }

    /// 长轮询 `/sync`
    pub async fn sync(&self, since: Option<&str>, timeout_ms: u64) -> Result<SyncResponse, MatrixError> {
        let mut url = self.endpoint(&["sync"]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("timeout", &timeout_ms.to_string());
            query.append_pair("filter", SYNC_FILTER);
            if let Some(since) = since {
                query.append_pair("since", since);
            }
        }
        let response = Self::check(self.request(Method::GET, url).send().await?).await?;
        Ok(response.json().await?)
    }

    /// 发送消息，返回 event id
    pub async fn send_message(&self, room_id: &str, content: &MessageContent) -> Result<String, MatrixError> {
        let txn_id = self.next_txn_id();
        let url = self.endpoint(&["rooms", room_id, "send", "m.room.message", &txn_id]);
        let response = Self::check(self.request(Method::PUT, url).json(content).send().await?).await?;
        let event_id = response.json::<SendResponse>().await?.event_id;
        debug!(room_id = %room_id, event_id = %event_id, "Message sent");
        Ok(event_id)
    }

    /// 以回复形式发送 markdown
    pub async fn send_reply(&self, room_id: &str, in_reply_to: &str, markdown: &str) -> Result<String, MatrixError> {
        let content = MessageContent::markdown(markdown).in_reply_to(in_reply_to);
        self.send_message(room_id, &content).await
    }
}

#[async_trait]
impl MessageSink for MatrixClient {
    fn name(&self) -> &str {
        "matrix"
    }

    async fn send_markdown(&self, room_id: &str, markdown: &str) -> Result<(), DeliveryError> {
        if room_id.is_empty() {
            return Err(DeliveryError::InvalidDestination(room_id.to_string()));
        }
        match self.send_message(room_id, &MessageContent::markdown(markdown)).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_forbidden() => Err(DeliveryError::Forbidden {
                room_id: room_id.to_string(),
            }),
            Err(MatrixError::Http(e)) => Err(DeliveryError::Http(e)),
            Err(MatrixError::Api { status, errcode, message }) => Err(DeliveryError::Status {
                status,
                body: format!("{errcode}: {message}"),
            }),
            Err(e @ MatrixError::InvalidHomeserver(_)) => {
                Err(DeliveryError::InvalidDestination(e.to_string()))
            }
        }
    }
}
