use thiserror::Error;

/// 仓库检索链路上的统一错误
#[derive(Debug, Error)]
pub enum ExplorerError {
    /// 调用方参数不合法（直接回给调用方，不重试）
    #[error("{0}")]
    InvalidArgument(String),

    /// 网关：指定位置超出当前过滤条件的匹配数
    #[error("repository at position {index} is not found")]
    NotFound { index: u32 },

    /// 分区器自检失败（逻辑缺陷，而非数据状况）
    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),

    /// 远端检索服务失败（网络 / 协议 / GraphQL errors）
    #[error("search backend failure: {0}")]
    Gateway(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ExplorerError {
    fn from(e: reqwest::Error) -> Self {
        ExplorerError::Gateway(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExplorerError>;
