//! 块缓存实现（基于 lru crate）

use alloc::vec::Vec;
use core::num::NonZeroUsize;
use lru::LruCache;

/// 默认缓存块数量
pub const DEFAULT_CACHE_SIZE: usize = 256;

/// 缓存统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 总访问次数
    pub total_accesses: u64,
    /// 缓存命中次数
    pub hits: u64,
    /// 缓存未命中次数
    pub misses: u64,
    /// 驱逐次数
    pub evictions: u64,
    /// 当前缓存块数量
    pub used: usize,
    /// 缓存容量（块数）
    pub capacity: usize,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total_accesses == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_accesses as f64
        }
    }
}

/// 只读块缓存
///
/// 以设备块号为键缓存整块数据。`touch` 负责统计和更新 LRU 顺序，
/// `peek` 只取数据，两者分开是为了让调用方在未命中时先插入再借用。
pub struct BlockCache {
    /// LRU 缓存核心
    cache: LruCache<u64, Vec<u8>>,
    /// 块大小（字节）
    block_size: usize,
    /// 统计信息
    stats: CacheStats,
}

impl BlockCache {
    /// 创建新的块缓存
    ///
    /// # 参数
    ///
    /// * `capacity` - 缓存容量（块数量）
    /// * `block_size` - 块大小（字节）
    ///
    /// # 返回
    ///
    /// `capacity` 为 0 时返回 `None`，表示不启用缓存
    pub fn new(capacity: usize, block_size: usize) -> Option<Self> {
        let cap = NonZeroUsize::new(capacity)?;
        log::debug!("[CACHE] capacity={} blocks, block_size={}", capacity, block_size);
        Some(Self {
            cache: LruCache::new(cap),
            block_size,
            stats: CacheStats {
                capacity,
                ..CacheStats::default()
            },
        })
    }

    /// 块大小
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// 记录一次访问并更新 LRU 顺序
    ///
    /// # 返回
    ///
    /// 命中返回 `true`
    pub fn touch(&mut self, lba: u64) -> bool {
        self.stats.total_accesses += 1;
        if self.cache.get(&lba).is_some() {
            self.stats.hits += 1;
            true
        } else {
            self.stats.misses += 1;
            false
        }
    }

    /// 读取缓存块（不更新统计和 LRU 顺序）
    pub fn peek(&self, lba: u64) -> Option<&[u8]> {
        self.cache.peek(&lba).map(|data| data.as_slice())
    }

    /// 检查块是否在缓存中
    pub fn contains(&self, lba: u64) -> bool {
        self.cache.contains(&lba)
    }

    /// 插入块数据，缓存已满时驱逐最久未用的块
    pub fn insert(&mut self, lba: u64, data: Vec<u8>) {
        debug_assert_eq!(data.len(), self.block_size);
        if let Some((old, _)) = self.cache.push(lba, data) {
            if old != lba {
                self.stats.evictions += 1;
                log::trace!("[CACHE] evict block {}", old);
            }
        }
        self.stats.used = self.cache.len();
    }

    /// 使单个块失效
    pub fn invalidate(&mut self, lba: u64) {
        self.cache.pop(&lba);
        self.stats.used = self.cache.len();
    }

    /// 清空缓存
    pub fn clear(&mut self) {
        self.cache.clear();
        self.stats.used = 0;
    }

    /// 获取统计信息
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
