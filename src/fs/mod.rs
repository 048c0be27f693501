//! 文件系统高级 API
//!
//! 这个模块提供只读 EROFS 文件系统的查询接口。

mod filesystem;
mod types;

pub use filesystem::ErofsFileSystem;
pub use types::{FsConfig, InodeType};
