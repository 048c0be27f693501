//! Superblock 操作模块
//!
//! 这个模块提供 EROFS superblock 的读取、验证和几何信息访问。

mod read;
pub mod checksum;

pub use read::*;
