//! 镜像统计
//!
//! 从根目录开始深度优先遍历整个目录树，按 inode 类型计数，并统计普通文件的
//! 逻辑大小和实际占用大小。单个文件或目录出错时记录到 [`Statistics::errors`]
//! 后继续遍历。

use crate::{
    block::BlockDevice,
    error::{Error, ErrorKind, Result},
    fs::{ErofsFileSystem, InodeType},
    inode::Inode,
};
use alloc::{string::String, vec::Vec};

/// 大小直方图的桶数
///
/// 桶 0 是小于 1 KiB 的文件，桶 `k` 是 `[2^(k-1), 2^k)` KiB，最后一个桶不设上限。
pub const HISTOGRAM_BUCKETS: usize = 16;

/// 遍历中记录的错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkError {
    /// 出错对象的 nid
    pub nid: u64,
    /// 出错对象的路径
    pub path: String,
    /// 错误
    pub error: Error,
}

/// 统计结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statistics {
    /// 按 [`InodeType::index`] 计数
    pub files_by_type: [u64; InodeType::COUNT],
    /// 普通文件逻辑大小之和
    pub logical_size: u64,
    /// 普通文件实际占用大小之和
    pub occupied_size: u64,
    /// 压缩布局的普通文件数
    pub compressed_files: u64,
    /// 普通文件逻辑大小直方图
    pub logical_histogram: [u64; HISTOGRAM_BUCKETS],
    /// 普通文件占用大小直方图
    pub occupied_histogram: [u64; HISTOGRAM_BUCKETS],
    /// 遍历到的最大目录深度（根目录为 0）
    pub max_depth: u32,
    /// 遍历中记录的错误
    pub errors: Vec<WalkError>,
}

/// 计算大小所在的直方图桶
pub fn size_bucket(size: u64) -> usize {
    let kib = size / 1024;
    if kib == 0 {
        return 0;
    }
    let k = (u64::BITS - kib.leading_zeros()) as usize;
    core::cmp::min(k, HISTOGRAM_BUCKETS - 1)
}

impl Statistics {
    /// 创建空统计
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有类型的文件总数
    pub fn total_files(&self) -> u64 {
        self.files_by_type.iter().sum()
    }

    /// 某一类型的文件数
    pub fn files_of(&self, ty: InodeType) -> u64 {
        self.files_by_type[ty.index()]
    }

    /// 压缩率（占用大小 / 逻辑大小）
    ///
    /// 没有普通文件数据时返回 `None`
    pub fn compression_ratio(&self) -> Option<f64> {
        if self.logical_size == 0 {
            return None;
        }
        Some(self.occupied_size as f64 / self.logical_size as f64)
    }

    /// 计入一个普通文件
    pub fn record_regular(&mut self, logical: u64, occupied: u64, compressed: bool) {
        self.logical_size = self.logical_size.saturating_add(logical);
        self.occupied_size = self.occupied_size.saturating_add(occupied);
        if compressed {
            self.compressed_files += 1;
        }
        self.logical_histogram[size_bucket(logical)] += 1;
        self.occupied_histogram[size_bucket(occupied)] += 1;
    }

    fn record_error(&mut self, nid: u64, path: &str, error: Error) {
        log::warn!("[STATS] nid={} path={} error={}", nid, path, error);
        let mut owned = String::new();
        if owned.try_reserve_exact(path.len()).is_ok() {
            owned.push_str(path);
        }
        self.errors.push(WalkError {
            nid,
            path: owned,
            error,
        });
    }
}

/// 遍历整个镜像并累加统计
///
/// # 参数
///
/// * `fs` - 已挂载的文件系统
/// * `stats` - 累加器；可以在多次调用间复用
///
/// # 返回
///
/// 只有根目录本身无法读取时返回错误；其他错误记录在 `stats.errors` 中
pub fn collect_statistics<D: BlockDevice>(
    fs: &mut ErofsFileSystem<D>,
    stats: &mut Statistics,
) -> Result<()> {
    let root = fs.root_inode()?;
    let mut path = String::new();

    stats.files_by_type[root.inode_type().index()] += 1;
    if root.is_dir() {
        walk_dir(fs, stats, &root, root.nid(), &mut path, 0);
    }

    log::debug!(
        "[STATS] files={} logical={} occupied={} compressed={} errors={}",
        stats.total_files(),
        stats.logical_size,
        stats.occupied_size,
        stats.compressed_files,
        stats.errors.len()
    );
    Ok(())
}

fn walk_dir<D: BlockDevice>(
    fs: &mut ErofsFileSystem<D>,
    stats: &mut Statistics,
    dir: &Inode,
    parent_nid: u64,
    path: &mut String,
    depth: u32,
) {
    if depth > fs.config().max_depth {
        stats.record_error(
            dir.nid(),
            path,
            Error::new(ErrorKind::Corrupted, "Directory tree exceeds maximum depth"),
        );
        return;
    }
    stats.max_depth = core::cmp::max(stats.max_depth, depth);

    let mut iter = match fs.dir_iter(dir) {
        Ok(iter) => iter,
        Err(e) => {
            stats.record_error(dir.nid(), path, e);
            return;
        }
    };

    loop {
        let entry = match fs.next_entry(&mut iter) {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                // 块内布局不可信，放弃这个目录剩下的部分
                stats.record_error(dir.nid(), path, e);
                break;
            }
        };

        if entry.nid == dir.nid() || entry.nid == parent_nid {
            continue;
        }

        let saved = path.len();
        path.push('/');
        path.push_str(&entry.name_lossy());

        match fs.read_inode(entry.nid) {
            Ok(inode) => {
                stats.files_by_type[inode.inode_type().index()] += 1;
                if inode.is_file() {
                    match fs.occupied_size(&inode) {
                        Ok(occupied) => {
                            stats.record_regular(inode.size(), occupied, inode.is_compressed())
                        }
                        Err(e) => stats.record_error(inode.nid(), path, e),
                    }
                } else if inode.is_dir() {
                    walk_dir(fs, stats, &inode, dir.nid(), path, depth + 1);
                }
            }
            Err(e) => stats.record_error(entry.nid, path, e),
        }

        path.truncate(saved);
    }
}
