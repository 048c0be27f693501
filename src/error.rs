//! 错误类型定义
//!
//! 提供 EROFS 镜像解析的错误类型。

use core::fmt;

/// EROFS 解析错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// I/O 错误（短读、设备错误）
    Io,
    /// 无效参数
    InvalidInput,
    /// 镜像损坏（违反磁盘格式不变量）
    Corrupted,
    /// 可识别但尚未实现的磁盘特性
    Unsupported,
    /// 未找到
    NotFound,
    /// 内存分配失败
    ResourceExhausted,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// 创建带原因的错误（简化版，忽略 cause）
    ///
    /// 注意：在 no_std 环境下，cause 参数会被忽略
    pub fn with_cause(kind: ErrorKind, message: &'static str, _cause: impl core::fmt::Debug) -> Self {
        Self { kind, message }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }

    /// 是否是镜像损坏
    pub fn is_corrupted(&self) -> bool {
        self.kind == ErrorKind::Corrupted
    }

    /// 是否是不支持的特性
    pub fn is_unsupported(&self) -> bool {
        self.kind == ErrorKind::Unsupported
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_cause(ErrorKind::Io, "Device I/O error", err)
    }
}

impl From<alloc::collections::TryReserveError> for Error {
    fn from(err: alloc::collections::TryReserveError) -> Self {
        Error::with_cause(ErrorKind::ResourceExhausted, "Buffer allocation failed", err)
    }
}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;
