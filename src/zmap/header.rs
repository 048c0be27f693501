//! 压缩映射头解析

use crate::{
    block::{BlockDev, BlockDevice},
    consts::*,
    error::{Error, ErrorKind, Result},
    inode::{units_round_up, DataLayout, Inode, MAX_ADDRESSABLE_UNITS},
    superblock::Superblock,
    types::{z_erofs_map_header, MapAdvise},
};

/// 压缩算法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionAlgorithm {
    /// LZ4
    Lz4,
    /// LZMA（可识别，不支持大小恢复）
    Lzma,
}

impl CompressionAlgorithm {
    /// 从映射头中的算法编号解析
    pub fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            Z_EROFS_COMPRESSION_LZ4 => Ok(CompressionAlgorithm::Lz4),
            Z_EROFS_COMPRESSION_LZMA => Ok(CompressionAlgorithm::Lzma),
            _ => Err(Error::new(
                ErrorKind::Unsupported,
                "Unknown compression algorithm",
            )),
        }
    }
}

/// lcluster 索引编码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    /// 每个 lcluster 一个 8 字节索引
    Full,
    /// 2 字节 / 4 字节压缩包
    Compact,
}

/// 已读取压缩映射头的 inode
///
/// 只能通过 [`CompressedInode::resolve`] 得到，持有它即表示映射头已经校验过。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedInode {
    inode: Inode,
    format: IndexFormat,
    advise: MapAdvise,
    algorithms: [CompressionAlgorithm; 2],
    lclusterbits: u8,
    map_header_end: u64,
}

impl CompressedInode {
    /// 读取并校验压缩映射头
    ///
    /// # 参数
    ///
    /// * `bdev` - 块设备引用
    /// * `sb` - superblock 引用
    /// * `inode` - 压缩布局的 inode
    ///
    /// # 返回
    ///
    /// 非压缩 inode 返回 `InvalidInput`；映射头与 superblock 特性矛盾返回 `Corrupted`；
    /// 内联/碎片物理簇等未实现的特性返回 `Unsupported`
    pub fn resolve<D: BlockDevice>(
        bdev: &mut BlockDev<D>,
        sb: &Superblock,
        inode: Inode,
    ) -> Result<Self> {
        let format = match inode.layout() {
            DataLayout::CompressedFull => IndexFormat::Full,
            DataLayout::CompressedCompact => IndexFormat::Compact,
            DataLayout::FlatPlain | DataLayout::FlatInline => {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    "Inode is not compressed",
                ));
            }
        };

        let pos = (inode.inline_data_offset() + 7) & !7;
        let mut raw = [0u8; Z_EROFS_MAP_HEADER_SIZE];
        bdev.read_bytes(pos, &mut raw)?;
        let h = z_erofs_map_header::parse(&raw)?;
        let advise = h.advise();

        let algorithms = [
            CompressionAlgorithm::from_raw(h.h_algorithmtype & 0xf)?,
            CompressionAlgorithm::from_raw(h.h_algorithmtype >> 4)?,
        ];
        let lclusterbits = sb.blkszbits() + (h.h_clusterbits & 7);

        log::debug!(
            "[ZMAP] nid={} format={:?} advise={:?} algorithms={:?} lclusterbits={}",
            inode.nid(),
            format,
            advise,
            algorithms,
            lclusterbits
        );

        if advise.intersects(MapAdvise::INLINE_PCLUSTER | MapAdvise::FRAGMENT_PCLUSTER) {
            return Err(Error::new(
                ErrorKind::Unsupported,
                "Inline or fragment pclusters are not supported",
            ));
        }

        let big1 = advise.contains(MapAdvise::BIG_PCLUSTER_1);
        let big2 = advise.contains(MapAdvise::BIG_PCLUSTER_2);

        // 紧凑索引要求 HEAD1 与 HEAD2 的大物理簇标志一致
        if format == IndexFormat::Compact && big1 != big2 {
            log::warn!("[ZMAP] nid={} inconsistent big pcluster advise", inode.nid());
            return Err(Error::new(
                ErrorKind::Corrupted,
                "Big pcluster head1/head2 of compact indexes disagree",
            ));
        }

        if (big1 || big2) && !sb.has_big_pcluster() {
            return Err(Error::new(
                ErrorKind::Corrupted,
                "Big pcluster advise without superblock feature",
            ));
        }

        if (big1 || big2) && lclusterbits != sb.blkszbits() {
            return Err(Error::new(
                ErrorKind::Unsupported,
                "Big pcluster with lcluster larger than block",
            ));
        }

        if units_round_up(inode.size(), lclusterbits as u32) > MAX_ADDRESSABLE_UNITS {
            log::warn!("[ZMAP] nid={} size {} exceeds addressable lclusters", inode.nid(), inode.size());
            return Err(Error::new(
                ErrorKind::Corrupted,
                "Compressed size exceeds addressable lclusters",
            ));
        }

        if format == IndexFormat::Compact {
            if lclusterbits > 14 {
                return Err(Error::new(
                    ErrorKind::Unsupported,
                    "Compact indexes with lcluster beyond 16KiB",
                ));
            }
            if advise.contains(MapAdvise::COMPACTED_2B) && lclusterbits > 12 {
                return Err(Error::new(
                    ErrorKind::Unsupported,
                    "2B compact indexes with lcluster beyond 4KiB",
                ));
            }
        }

        Ok(Self {
            inode,
            format,
            advise,
            algorithms,
            lclusterbits,
            map_header_end: pos + Z_EROFS_MAP_HEADER_SIZE as u64,
        })
    }

    /// 原始 inode
    pub fn inode(&self) -> &Inode {
        &self.inode
    }

    /// 取回原始 inode
    pub fn into_inode(self) -> Inode {
        self.inode
    }

    /// 索引编码方式
    pub fn format(&self) -> IndexFormat {
        self.format
    }

    /// advise 位
    pub fn advise(&self) -> MapAdvise {
        self.advise
    }

    /// HEAD1 类型使用的算法
    pub fn head1_algorithm(&self) -> CompressionAlgorithm {
        self.algorithms[0]
    }

    /// HEAD2 类型使用的算法
    pub fn head2_algorithm(&self) -> CompressionAlgorithm {
        self.algorithms[1]
    }

    /// lcluster 大小位数
    pub fn lclusterbits(&self) -> u8 {
        self.lclusterbits
    }

    /// lcluster 大小（字节）
    pub fn lcluster_size(&self) -> u64 {
        1u64 << self.lclusterbits
    }

    /// 映射头结束处的字节偏移
    pub fn map_header_end(&self) -> u64 {
        self.map_header_end
    }

    /// 覆盖整个文件所需的 lcluster 数
    pub fn total_lclusters(&self) -> u64 {
        units_round_up(self.inode.size(), self.lclusterbits as u32)
    }

    /// HEAD 物理簇是否可跨多个块
    pub fn has_big_pcluster(&self) -> bool {
        self.advise.contains(MapAdvise::BIG_PCLUSTER_1)
    }
}
