//! Inode 操作模块
//!
//! 这个模块提供 EROFS inode 的解码（紧凑/扩展两种布局）和平铺数据映射。
//! 压缩布局的映射头不在这里读取，见 `zmap` 模块。

mod read;
mod map;

pub use read::*;
pub use map::*;
