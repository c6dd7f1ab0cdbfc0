//! Ingestion 错误类型

use contracts::ContractError;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 工作线程创建失败
    #[error("failed to spawn worker {worker}: {message}")]
    SpawnFailed {
        /// 工作线程名
        worker: String,
        /// 错误消息
        message: String,
    },

    /// landmark 模型初始化失败
    #[error("detector for worker {worker} failed to open: {source}")]
    DetectorInit {
        /// 工作线程名
        worker: String,
        /// 底层错误
        #[source]
        source: ContractError,
    },

    /// 通道已关闭
    #[error("channel closed for worker {worker}")]
    ChannelClosed {
        /// 工作线程名
        worker: String,
    },

    /// 工作线程未在运行
    #[error("worker {worker} is not running")]
    NotRunning {
        /// 工作线程名
        worker: String,
    },

    /// 等待工作线程退出超时
    #[error("worker {worker} did not stop within {timeout_ms} ms")]
    JoinTimeout {
        /// 工作线程名
        worker: String,
        /// 超时时间
        timeout_ms: u64,
    },
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
