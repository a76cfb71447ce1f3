//! 渲染错误 - payload 通过了分类但缺少渲染所需字段

use thiserror::Error;

/// 结构性渲染错误
///
/// 分类只检查少量特征字段，所以"分类正确但字段缺失"是预期内的情况，
/// 由 dispatch 层转换为诊断消息，不会向上传播。
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("missing field `{path}`")]
    MissingField { path: String },

    #[error("field `{path}` is not {expected}")]
    UnexpectedType { path: String, expected: &'static str },

    #[error("field `{path}` has unexpected value {value}")]
    UnexpectedValue { path: String, value: String },

    #[error("field `{path}` is not a valid timestamp: {source}")]
    InvalidTimestamp {
        path: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl RenderError {
    pub fn missing(path: impl Into<String>) -> Self {
        Self::MissingField { path: path.into() }
    }
}
