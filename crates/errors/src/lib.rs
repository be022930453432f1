use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("任务被拒绝: 队列已满 ({queued} 个排队任务) 且线程数已达上限 ({live})")]
    Rejected { queued: usize, live: usize },
    #[error("调度器已关闭，不再接受新任务")]
    ShutDown,
    #[error("配置错误: {0}")]
    InvalidConfig(String),
    #[error("无法创建工作线程: {0}")]
    WorkerSpawn(#[from] std::io::Error),
    #[error("关闭超时: 仍有 {live} 个工作线程在运行")]
    ShutdownTimeout { live: usize },
    #[error("任务执行时发生panic: {0}")]
    TaskPanicked(String),
    #[error("任务在执行前被取消")]
    Canceled,
}

pub type DispatchResult<T> = Result<T, DispatchError>;

impl DispatchError {
    pub fn rejected(queued: usize, live: usize) -> Self {
        Self::Rejected { queued, live }
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }
    /// Saturation signal: the caller may slow down and resubmit later.
    pub fn is_backpressure(&self) -> bool {
        matches!(self, DispatchError::Rejected { .. })
    }
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DispatchError::InvalidConfig(_) | DispatchError::WorkerSpawn(_)
        )
    }
    pub fn user_message(&self) -> &str {
        match self {
            DispatchError::Rejected { .. } => "系统繁忙，请稍后重试",
            DispatchError::ShutDown => "服务正在关闭",
            DispatchError::InvalidConfig(_) => "线程池配置有误",
            DispatchError::ShutdownTimeout { .. } => "关闭超时，仍有任务在运行",
            _ => "任务执行失败",
        }
    }
}
