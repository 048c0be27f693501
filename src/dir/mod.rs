//! 目录操作模块
//!
//! 这个模块提供 EROFS 目录块的解析和路径查找功能。
//!
//! ## 模块结构
//!
//! - `iterator` - 目录迭代器，按块顺序、块内顺序返回目录项
//! - `path_lookup` - 从根目录开始的路径查找

pub mod iterator;
pub mod path_lookup;

pub use iterator::{read_dir, DirEntry, DirIterator};
pub use path_lookup::{lookup_path, PathLookup};
