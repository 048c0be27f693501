//! 块缓存模块
//!
//! 只读镜像的块缓存，使用 `lru` crate 提供 LRU 驱逐。
//!
//! # 主要组件
//!
//! - [`BlockCache`] - 块缓存管理器
//! - [`CacheStats`] - 缓存统计信息
//!
//! 镜像不可写，缓存中没有脏块，驱逐时直接丢弃。
//! 目录遍历和压缩索引读取会反复访问同一批元数据块，缓存主要服务于这部分读取。
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use erofs_core::cache::{BlockCache, DEFAULT_CACHE_SIZE};
//!
//! let mut cache = BlockCache::new(DEFAULT_CACHE_SIZE, 4096).unwrap();
//!
//! if !cache.touch(100) {
//!     let data = read_block_from_device(100)?;
//!     cache.insert(100, data);
//! }
//! let block = cache.peek(100).unwrap();
//! ```

mod block_cache;

pub use block_cache::{BlockCache, CacheStats, DEFAULT_CACHE_SIZE};
