//! 压缩文件的物理簇遍历与占用大小计算
//!
//! 从 lcn 0 开始按 head 到 head 的顺序遍历 lcluster 表：
//!
//! - PLAIN/HEAD 记录一个物理簇，累加它占用的块数，然后前进 1
//! - NONHEAD 不解析地址，按 `max(delta[1], 1)` 跳到下一个 head
//!
//! 除最后一个物理簇外，所有物理簇都按整块计算；最后一个物理簇的实际
//! 压缩长度没有存储在磁盘上，需要通过部分解压再定长压缩恢复。

use super::header::CompressedInode;
use super::index::{load_lcluster, ClusterType, LclusterIndex};
use super::lz4::{codec_for, max_decoded_len};
use crate::{
    block::{BlockDev, BlockDevice},
    consts::*,
    error::{Error, ErrorKind, Result},
    inode::InodeData,
    superblock::Superblock,
    types::MapAdvise,
};
use alloc::vec::Vec;

/// 遍历得到的一个物理簇
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalCluster {
    /// 起始 lcluster
    pub lcn: u64,
    /// PLAIN 或 HEAD
    pub cluster_type: ClusterType,
    /// 起始 lcluster 的簇内偏移
    pub clusterofs: u32,
    /// 物理块地址
    pub blkaddr: u32,
    /// 占用的块数
    pub blocks: u32,
}

/// 一个压缩文件的全部物理簇
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtentMap {
    total_lclusters: u64,
    pclusters: Vec<PhysicalCluster>,
    total_blocks: u64,
}

impl ExtentMap {
    /// 文件覆盖的 lcluster 数
    pub fn total_lclusters(&self) -> u64 {
        self.total_lclusters
    }

    /// 按 lcn 递增排列的物理簇
    pub fn pclusters(&self) -> &[PhysicalCluster] {
        &self.pclusters
    }

    /// 所有物理簇占用的块数之和
    pub fn total_blocks(&self) -> u64 {
        self.total_blocks
    }

    /// 最后一个物理簇
    pub fn last(&self) -> Option<&PhysicalCluster> {
        self.pclusters.last()
    }

    /// 物理块范围 `[最小块地址, 最大块地址 + 块数)`
    pub fn block_range(&self) -> Option<(u64, u64)> {
        let start = self.pclusters.iter().map(|p| p.blkaddr as u64).min()?;
        let end = self
            .pclusters
            .iter()
            .map(|p| p.blkaddr as u64 + p.blocks as u64)
            .max()?;
        Some((start, end))
    }
}

/// 计算一个 head 物理簇占用的块数
///
/// 不使用大物理簇时一个物理簇占满一个 lcluster。使用大物理簇时，块数由紧随其后的
/// NONHEAD 通过 CBLKCNT 给出；后面没有 lcluster 或紧跟另一个 head 时为 1 块。
fn pcluster_blocks<D: BlockDevice>(
    bdev: &mut BlockDev<D>,
    sb: &Superblock,
    zi: &CompressedInode,
    head: &LclusterIndex,
) -> Result<u32> {
    let big = match head.cluster_type {
        ClusterType::Head => zi.advise().contains(MapAdvise::BIG_PCLUSTER_1),
        ClusterType::Plain => zi.advise().contains(MapAdvise::BIG_PCLUSTER_2),
        ClusterType::NonHead => false,
    };
    if !big {
        return Ok(1u32 << (zi.lclusterbits() - sb.blkszbits()));
    }

    let next_lcn = head.lcn + 1;
    if next_lcn >= zi.total_lclusters() {
        return Ok(1);
    }

    let next = load_lcluster(bdev, zi, next_lcn)?;
    match next.cluster_type {
        ClusterType::Plain | ClusterType::Head => Ok(1),
        ClusterType::NonHead if next.delta[0] == 1 && next.compressed_blocks != 0 => {
            Ok(next.compressed_blocks as u32)
        }
        ClusterType::NonHead => {
            log::warn!(
                "[ZMAP] nid={} lcn={} big pcluster without CBLKCNT",
                zi.inode().nid(),
                head.lcn
            );
            Err(Error::new(
                ErrorKind::Corrupted,
                "Big pcluster head not followed by a compressed block count",
            ))
        }
    }
}

/// 遍历 lcluster 表，收集物理簇
///
/// # 参数
///
/// * `bdev` - 块设备引用
/// * `sb` - superblock 引用
/// * `zi` - 已解析映射头的压缩 inode
///
/// # 返回
///
/// 按 lcn 递增排列的物理簇；第一个 lcluster 不是 head 时返回 `Corrupted`
pub fn walk_extents<D: BlockDevice>(
    bdev: &mut BlockDev<D>,
    sb: &Superblock,
    zi: &CompressedInode,
) -> Result<ExtentMap> {
    let total = zi.total_lclusters();
    let mut map = ExtentMap {
        total_lclusters: total,
        ..ExtentMap::default()
    };

    let mut lcn = 0u64;
    while lcn < total {
        let index = load_lcluster(bdev, zi, lcn)?;
        match index.cluster_type {
            ClusterType::Plain | ClusterType::Head => {
                let blocks = pcluster_blocks(bdev, sb, zi, &index)?;
                map.pclusters.try_reserve(1)?;
                map.pclusters.push(PhysicalCluster {
                    lcn,
                    cluster_type: index.cluster_type,
                    clusterofs: index.clusterofs,
                    blkaddr: index.blkaddr,
                    blocks,
                });
                map.total_blocks += blocks as u64;
                lcn += 1;
            }
            ClusterType::NonHead => {
                if map.pclusters.is_empty() {
                    return Err(Error::new(
                        ErrorKind::Corrupted,
                        "Compressed file starts with a non-head lcluster",
                    ));
                }
                lcn += core::cmp::max(index.delta[1], 1) as u64;
            }
        }
    }

    if let InodeData::CompressedBlocks(expected) = zi.inode().data() {
        if expected as u64 != map.total_blocks {
            log::warn!(
                "[ZMAP] nid={} walked {} blocks, inode records {}",
                zi.inode().nid(),
                map.total_blocks,
                expected
            );
        }
    }

    log::debug!(
        "[ZMAP] nid={} lclusters={} pclusters={} blocks={}",
        zi.inode().nid(),
        total,
        map.pclusters.len(),
        map.total_blocks
    );

    Ok(map)
}

/// 计算最后一个物理簇实际占用的字节数
///
/// PLAIN 物理簇直接按剩余明文长度计算。HEAD 物理簇读出原始数据：启用 LZ4 0padding
/// 时就是读出的长度；否则部分解压剩余明文，再按物理簇上限定长压缩，结果不超过读出的长度。
///
/// # 参数
///
/// * `bdev` - 块设备引用
/// * `sb` - superblock 引用
/// * `zi` - 已解析映射头的压缩 inode
/// * `map` - [`walk_extents`] 的结果
///
/// # 返回
///
/// 最后一个物理簇的字节数
pub fn last_cluster_size<D: BlockDevice>(
    bdev: &mut BlockDev<D>,
    sb: &Superblock,
    zi: &CompressedInode,
    map: &ExtentMap,
) -> Result<u64> {
    let last = map
        .last()
        .ok_or(Error::new(ErrorKind::Corrupted, "Compressed file has no pcluster"))?;

    let start = (last.lcn << zi.lclusterbits()) + last.clusterofs as u64;
    let remaining = zi.inode().size().checked_sub(start).ok_or(Error::new(
        ErrorKind::Corrupted,
        "Last pcluster starts beyond end of file",
    ))?;

    match last.cluster_type {
        ClusterType::Plain => Ok(remaining),
        ClusterType::Head => {
            let codec = codec_for(zi.head1_algorithm())?;
            let plen = last.blocks as u64 * sb.block_size() as u64;
            let plen = usize::try_from(plen)
                .map_err(|_| Error::new(ErrorKind::ResourceExhausted, "Pcluster too large"))?;

            let mut raw = Vec::new();
            raw.try_reserve_exact(plen)?;
            raw.resize(plen, 0);
            bdev.read_bytes_direct(sb.blknr_to_addr(last.blkaddr as u64), &mut raw)?;

            if sb.has_lz4_0padding() {
                return Ok(plen as u64);
            }

            let target = usize::try_from(remaining)
                .ok()
                .filter(|&n| n <= max_decoded_len(plen))
                .ok_or(Error::new(
                    ErrorKind::Corrupted,
                    "Remaining size exceeds what the pcluster can decode to",
                ))?;

            let plain = codec.decompress_partial(&raw, target)?;
            let (_, produced) = codec.compress_destsize(&plain, Z_EROFS_PCLUSTER_MAX_SIZE)?;
            let size = core::cmp::min(produced, plen) as u64;

            log::debug!(
                "[ZMAP] nid={} last pcluster lcn={} blkaddr={} decoded={} recovered={} ({})",
                zi.inode().nid(),
                last.lcn,
                last.blkaddr,
                target,
                size,
                codec.name()
            );
            Ok(size)
        }
        ClusterType::NonHead => Err(Error::new(
            ErrorKind::Unsupported,
            "Last pcluster is not a head",
        )),
    }
}

/// 计算压缩文件在磁盘上实际占用的字节数
///
/// 空文件直接返回 0，不遍历 lcluster 表。
///
/// # 参数
///
/// * `bdev` - 块设备引用
/// * `sb` - superblock 引用
/// * `zi` - 已解析映射头的压缩 inode
pub fn occupied_size<D: BlockDevice>(
    bdev: &mut BlockDev<D>,
    sb: &Superblock,
    zi: &CompressedInode,
) -> Result<u64> {
    if zi.inode().size() == 0 {
        return Ok(0);
    }

    let map = walk_extents(bdev, sb, zi)?;
    let last_size = last_cluster_size(bdev, sb, zi, &map)?;
    let last_blocks = map.last().map(|p| p.blocks as u64).unwrap_or(0);

    Ok((map.total_blocks - last_blocks) * sb.block_size() as u64 + last_size)
}
