//! lcluster 索引解码
//!
//! 完整索引每个 lcluster 占 8 字节；紧凑索引把若干 lcluster 打成一个包，
//! 包末尾 4 字节是起始块地址，前面按固定位宽存放 `lo | type << lobits`。
//! 两种编码都解码为 [`LclusterIndex`]。

use super::header::{CompressedInode, IndexFormat};
use crate::{
    block::{BlockDev, BlockDevice},
    consts::*,
    error::{Error, ErrorKind, Result},
    types::{z_erofs_lcluster_index, MapAdvise},
};

/// lcluster 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterType {
    /// 未压缩但按簇对齐
    Plain,
    /// 压缩物理簇的第一个 lcluster
    Head,
    /// 压缩物理簇的后续 lcluster
    NonHead,
}

impl ClusterType {
    /// 从 2 位类型字段解析
    ///
    /// # 返回
    ///
    /// 保留类型（新格式中的 HEAD2）返回 `Unsupported`
    pub fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            Z_EROFS_LCLUSTER_TYPE_PLAIN => Ok(ClusterType::Plain),
            Z_EROFS_LCLUSTER_TYPE_HEAD => Ok(ClusterType::Head),
            Z_EROFS_LCLUSTER_TYPE_NONHEAD => Ok(ClusterType::NonHead),
            _ => Err(Error::new(
                ErrorKind::Unsupported,
                "Unrecognized lcluster type",
            )),
        }
    }

    /// 是否开启一个新的物理簇
    pub fn is_head(self) -> bool {
        matches!(self, ClusterType::Plain | ClusterType::Head)
    }
}

/// 解码后的 lcluster 索引
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LclusterIndex {
    /// 逻辑簇号
    pub lcn: u64,
    /// 类型
    pub cluster_type: ClusterType,
    /// 簇内偏移；NONHEAD 为 lcluster 大小
    pub clusterofs: u32,
    /// NONHEAD 的 delta：`[到 HEAD 的距离, 到下一个 HEAD 的距离]`
    pub delta: [u16; 2],
    /// PLAIN/HEAD 的物理块地址
    pub blkaddr: u32,
    /// NONHEAD 携带的压缩块数（CBLKCNT），0 表示未携带
    pub compressed_blocks: u16,
}

/// 读取一个 lcluster 的索引
///
/// # 参数
///
/// * `bdev` - 块设备引用
/// * `zi` - 已解析映射头的压缩 inode
/// * `lcn` - 逻辑簇号
///
/// # 返回
///
/// `lcn` 超出文件范围返回 `InvalidInput`
pub fn load_lcluster<D: BlockDevice>(
    bdev: &mut BlockDev<D>,
    zi: &CompressedInode,
    lcn: u64,
) -> Result<LclusterIndex> {
    if lcn >= zi.total_lclusters() {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "Logical cluster beyond end of file",
        ));
    }

    let index = match zi.format() {
        IndexFormat::Full => load_full(bdev, zi, lcn)?,
        IndexFormat::Compact => load_compact(bdev, zi, lcn)?,
    };

    log::trace!(
        "[ZMAP] lcn={} type={:?} clusterofs={} delta={:?} blkaddr={} cblks={}",
        lcn,
        index.cluster_type,
        index.clusterofs,
        index.delta,
        index.blkaddr,
        index.compressed_blocks
    );

    Ok(index)
}

fn load_full<D: BlockDevice>(
    bdev: &mut BlockDev<D>,
    zi: &CompressedInode,
    lcn: u64,
) -> Result<LclusterIndex> {
    let pos = zi.map_header_end()
        + Z_EROFS_LEGACY_HEADER_PADDING
        + lcn * Z_EROFS_FULL_INDEX_SIZE as u64;
    let mut raw = [0u8; Z_EROFS_FULL_INDEX_SIZE];
    bdev.read_bytes(pos, &mut raw)?;
    let di = z_erofs_lcluster_index::parse(&raw)?;

    let cluster_type = ClusterType::from_raw(di.raw_type())?;
    let mut index = LclusterIndex {
        lcn,
        cluster_type,
        clusterofs: di.di_clusterofs as u32,
        delta: [0, 0],
        blkaddr: 0,
        compressed_blocks: 0,
    };

    match cluster_type {
        ClusterType::NonHead => {
            let mut delta = di.delta();
            index.clusterofs = 1u32 << zi.lclusterbits();
            if delta[0] & Z_EROFS_LI_D0_CBLKCNT != 0 {
                index.compressed_blocks = delta[0] & !Z_EROFS_LI_D0_CBLKCNT;
                delta[0] = 1;
            }
            index.delta = delta;
        }
        ClusterType::Plain | ClusterType::Head => {
            index.blkaddr = di.blkaddr();
        }
    }

    Ok(index)
}

/// 紧凑索引包中的一个条目
#[derive(Debug, Clone, Copy)]
struct PackEntry {
    lo: u32,
    raw_type: u8,
}

/// 一个紧凑索引包
struct CompactPack<'a> {
    data: &'a [u8],
    vcnt: usize,
    encodebits: usize,
    lobits: usize,
}

impl CompactPack<'_> {
    fn entry(&self, i: usize) -> Result<PackEntry> {
        let pos = self.encodebits * i;
        let byte = pos / 8;
        let word = self
            .data
            .get(byte..byte + 4)
            .ok_or(Error::new(ErrorKind::Corrupted, "Compact index out of pack"))?;
        let v = u32::from_le_bytes([word[0], word[1], word[2], word[3]]) >> (pos & 7);
        Ok(PackEntry {
            lo: v & ((1u32 << self.lobits) - 1),
            raw_type: ((v >> self.lobits) & 0x3) as u8,
        })
    }

    fn base(&self) -> u32 {
        let n = self.data.len();
        u32::from_le_bytes([self.data[n - 4], self.data[n - 3], self.data[n - 2], self.data[n - 1]])
    }

    /// 从第 i 个 NONHEAD 起向后数到下一个 HEAD 的距离
    fn lookahead_distance(&self, mut i: usize) -> Result<u16> {
        let mut d1 = 0u32;
        loop {
            let e = self.entry(i)?;
            if e.raw_type != Z_EROFS_LCLUSTER_TYPE_NONHEAD {
                break;
            }
            d1 += 1;
            i += 1;
            if i >= self.vcnt {
                // 包内最后一个 NONHEAD 存的是 delta[1]
                if e.lo & Z_EROFS_LI_D0_CBLKCNT as u32 == 0 {
                    d1 += e.lo.saturating_sub(1);
                }
                break;
            }
        }
        Ok(core::cmp::min(d1, u16::MAX as u32) as u16)
    }
}

fn load_compact<D: BlockDevice>(
    bdev: &mut BlockDev<D>,
    zi: &CompressedInode,
    lcn: u64,
) -> Result<LclusterIndex> {
    let ebase = zi.map_header_end();
    let total = zi.total_lclusters();
    let lclusterbits = zi.lclusterbits() as usize;

    let initial_4b = ((32 - (ebase % 32)) / 4) & 7;
    let compacted_2b = if zi.advise().contains(MapAdvise::COMPACTED_2B) && initial_4b < total {
        (total - initial_4b) & !15
    } else {
        0
    };

    let mut pos = ebase;
    let mut rel = lcn;
    let mut amortizedshift = 2u32;
    if rel >= initial_4b {
        pos += initial_4b * 4;
        rel -= initial_4b;
        if rel < compacted_2b {
            amortizedshift = 1;
        } else {
            pos += compacted_2b * 2;
            rel -= compacted_2b;
        }
    }
    pos += rel << amortizedshift;

    let vcnt: usize = match amortizedshift {
        2 if lclusterbits <= 14 => 2,
        1 if lclusterbits <= 12 => 16,
        _ => {
            return Err(Error::new(
                ErrorKind::Unsupported,
                "Unsupported compact index geometry",
            ));
        }
    };

    let pack_size = vcnt << amortizedshift;
    let pack_base = pos & !(pack_size as u64 - 1);
    let i = ((pos - pack_base) >> amortizedshift) as usize;

    let mut buf = [0u8; 32];
    bdev.read_bytes(pack_base, &mut buf[..pack_size])?;

    let pack = CompactPack {
        data: &buf[..pack_size],
        vcnt,
        encodebits: ((pack_size - 4) * 8) / vcnt,
        lobits: core::cmp::max(lclusterbits, 12),
    };

    let e = pack.entry(i)?;
    let cluster_type = ClusterType::from_raw(e.raw_type)?;
    let mut index = LclusterIndex {
        lcn,
        cluster_type,
        clusterofs: e.lo,
        delta: [0, 0],
        blkaddr: 0,
        compressed_blocks: 0,
    };

    if cluster_type == ClusterType::NonHead {
        index.clusterofs = 1u32 << lclusterbits;
        index.delta[1] = pack.lookahead_distance(i)?;

        if e.lo & Z_EROFS_LI_D0_CBLKCNT as u32 != 0 {
            index.compressed_blocks = (e.lo & !(Z_EROFS_LI_D0_CBLKCNT as u32)) as u16;
            index.delta[0] = 1;
        } else if i + 1 != vcnt {
            index.delta[0] = e.lo as u16;
        } else {
            // 包内最后一个条目存的是 delta[1]，delta[0] 由前一个条目推出
            let prev = pack.entry(i - 1)?;
            let lo = if prev.raw_type != Z_EROFS_LCLUSTER_TYPE_NONHEAD {
                0
            } else if prev.lo & Z_EROFS_LI_D0_CBLKCNT as u32 != 0 {
                1
            } else {
                prev.lo
            };
            index.delta[0] = (lo + 1) as u16;
        }
        return Ok(index);
    }

    // 计算 HEAD/PLAIN 的物理块地址：包基址加上包内之前的物理簇块数
    let mut nblk: u32 = 0;
    let mut j = i as i64;
    if !zi.has_big_pcluster() {
        nblk = 1;
        while j > 0 {
            j -= 1;
            let x = pack.entry(j as usize)?;
            if x.raw_type == Z_EROFS_LCLUSTER_TYPE_NONHEAD {
                j -= x.lo as i64;
            }
            if j >= 0 {
                nblk += 1;
            }
        }
    } else {
        while j > 0 {
            j -= 1;
            let x = pack.entry(j as usize)?;
            if x.raw_type == Z_EROFS_LCLUSTER_TYPE_NONHEAD {
                if x.lo & Z_EROFS_LI_D0_CBLKCNT as u32 != 0 {
                    j -= 1;
                    nblk = nblk.saturating_add(x.lo & !(Z_EROFS_LI_D0_CBLKCNT as u32));
                    continue;
                }
                if x.lo <= 1 {
                    log::warn!("[ZMAP] nid={} bogus big pcluster delta", zi.inode().nid());
                    return Err(Error::new(
                        ErrorKind::Corrupted,
                        "Invalid compact big pcluster delta",
                    ));
                }
                j -= x.lo as i64 - 2;
                continue;
            }
            nblk = nblk.saturating_add(1);
        }
    }
    index.blkaddr = pack.base().wrapping_add(nblk);
    Ok(index)
}
