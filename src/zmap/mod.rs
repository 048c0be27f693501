//! 压缩数据映射模块
//!
//! 处理压缩布局 inode 的 lcluster 索引：
//!
//! - `header` - 读取压缩映射头，得到 [`CompressedInode`]
//! - `index` - 解码完整/紧凑两种 lcluster 索引，统一为 [`LclusterIndex`]
//! - `extent` - 按 lcluster 顺序遍历物理簇，计算占用块数和精确占用字节数
//! - `lz4` - 末尾物理簇大小恢复所需的部分解压和定长压缩

mod header;
mod index;
mod extent;
mod lz4;

pub use header::{CompressedInode, CompressionAlgorithm, IndexFormat};
pub use index::{load_lcluster, ClusterType, LclusterIndex};
pub use extent::{last_cluster_size, occupied_size, walk_extents, ExtentMap, PhysicalCluster};
pub use lz4::{codec_for, max_decoded_len, ClusterCodec, Lz4Codec};
