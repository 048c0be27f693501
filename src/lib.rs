//! erofs_core: EROFS 只读镜像诊断解码器
//!
//! 这是一个纯 Rust 实现的 EROFS 镜像解析库，提供：
//! - superblock 与 inode（紧凑/扩展两种布局）解码
//! - 目录块遍历和路径查找
//! - 压缩文件的 lcluster 索引遍历，以及最后一个物理簇的实际压缩长度恢复
//! - 整个镜像的文件类型与占用大小统计
//!
//! # 示例
//!
//! ```rust,ignore
//! use erofs_core::{collect_statistics, ErofsFileSystem, FsConfig, MemDevice, Statistics};
//!
//! let device = MemDevice::new(image_bytes, 4096);
//! let mut fs = ErofsFileSystem::mount_with_config(device, FsConfig::default())?;
//!
//! let mut stats = Statistics::new();
//! collect_statistics(&mut fs, &mut stats)?;
//! println!("occupied {} / logical {}", stats.occupied_size, stats.logical_size);
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`block`] - 块设备抽象和字节级读取
//! - [`consts`] - 磁盘格式常量
//! - [`types`] - 磁盘结构定义
//! - [`superblock`] - Superblock 读取与校验
//! - [`inode`] - Inode 解码与平铺数据映射
//! - [`dir`] - 目录遍历与路径查找
//! - [`zmap`] - 压缩索引与占用大小计算
//! - [`stats`] - 镜像统计

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 块设备抽象
pub mod block;

/// 常量定义
pub mod consts;

/// 数据结构定义
pub mod types;

/// Superblock 操作
pub mod superblock;

/// Inode 操作
pub mod inode;

/// 目录操作
pub mod dir;

/// 压缩数据映射
pub mod zmap;

/// 文件系统高级 API
pub mod fs;

/// 块缓存
pub mod cache;

/// 镜像统计
pub mod stats;

/// CRC32C 校验和计算
pub(crate) mod crc;

#[cfg(test)]
mod testing;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 块设备
pub use block::{BlockDev, BlockDevice, MemDevice};
#[cfg(all(feature = "std", unix))]
pub use block::FileDevice;

// Superblock
pub use superblock::{read_superblock, Superblock};

// Inode
pub use inode::{map_flat, read_inode, DataLayout, FlatMapping, Inode, InodeData, InodeVersion};

// Dir
pub use dir::{lookup_path, read_dir, DirEntry, DirIterator, PathLookup};

// 压缩映射
pub use zmap::{
    codec_for, last_cluster_size, load_lcluster, occupied_size, walk_extents, ClusterCodec,
    ClusterType, CompressedInode, CompressionAlgorithm, ExtentMap, IndexFormat, LclusterIndex,
    Lz4Codec, PhysicalCluster,
};

// FileSystem
pub use fs::{ErofsFileSystem, FsConfig, InodeType};

// Cache
pub use cache::{BlockCache, CacheStats, DEFAULT_CACHE_SIZE};

// 统计
pub use stats::{collect_statistics, Statistics, WalkError};
