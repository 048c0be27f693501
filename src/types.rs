//! EROFS 数据结构定义
//!
//! 这个模块包含了直接对应磁盘格式的数据结构。
//!
//! ## 设计原则
//!
//! 1. **磁盘格式结构** - 保留 C 风格命名（便于对照 erofs_fs.h）
//! 2. **安全解析** - 通过 `byteorder::LittleEndian` 逐字段解析，不做指针转换
//! 3. **标志位** - 使用 `bitflags` 表示特性与 advise 位

#![allow(non_camel_case_types)] // 允许C风格命名

use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};

bitflags! {
    /// 兼容特性
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FeatureCompat: u32 {
        /// superblock 带 CRC32C 校验和
        const SB_CHKSUM = EROFS_FEATURE_COMPAT_SB_CHKSUM;
        /// 扩展 inode 记录修改时间
        const MTIME = EROFS_FEATURE_COMPAT_MTIME;
    }
}

bitflags! {
    /// 不兼容特性
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FeatureIncompat: u32 {
        /// LZ4 压缩数据以零填充对齐到物理簇末尾
        const LZ4_0PADDING = EROFS_FEATURE_INCOMPAT_LZ4_0PADDING;
        /// 物理簇可跨多个块
        const BIG_PCLUSTER = EROFS_FEATURE_INCOMPAT_BIG_PCLUSTER;
        /// 分块文件
        const CHUNKED_FILE = EROFS_FEATURE_INCOMPAT_CHUNKED_FILE;
        /// 多设备表
        const DEVICE_TABLE = EROFS_FEATURE_INCOMPAT_DEVICE_TABLE;
    }
}

bitflags! {
    /// 压缩映射头 advise 位
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MapAdvise: u16 {
        /// 紧凑索引中包含 2 字节包
        const COMPACTED_2B = 0x0001;
        /// HEAD1 类型使用大物理簇
        const BIG_PCLUSTER_1 = 0x0002;
        /// HEAD2 类型使用大物理簇
        const BIG_PCLUSTER_2 = 0x0004;
        /// 尾部物理簇内联
        const INLINE_PCLUSTER = 0x0008;
        /// 交错物理簇
        const INTERLACED_PCLUSTER = 0x0010;
        /// 碎片物理簇
        const FRAGMENT_PCLUSTER = 0x0020;
    }
}

/// 校验输入缓冲区长度
fn ensure_len(buf: &[u8], len: usize, message: &'static str) -> Result<()> {
    if buf.len() < len {
        return Err(Error::new(ErrorKind::Io, message));
    }
    Ok(())
}

//=============================================================================
// 磁盘格式结构定义
//=============================================================================

/// Superblock 结构
///
/// 对应 EROFS 磁盘格式中的 `struct erofs_super_block`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct erofs_super_block {
    pub magic: u32,            // 0: 魔数
    pub checksum: u32,         // 4: CRC32C 校验和
    pub feature_compat: u32,   // 8: 兼容特性
    pub blkszbits: u8,         // 12: 块大小位数
    pub reserved: u8,          // 13
    pub root_nid: u16,         // 14: 根目录 nid
    pub inos: u64,             // 16: 有效 inode 数
    pub build_time: u64,       // 24: 构建时间（秒）
    pub build_time_nsec: u32,  // 32: 构建时间（纳秒）
    pub blocks: u32,           // 36: 总块数
    pub meta_blkaddr: u32,     // 40: 元数据区起始块
    pub xattr_blkaddr: u32,    // 44: 共享 xattr 起始块
    pub uuid: [u8; 16],        // 48: 128位UUID
    pub volume_name: [u8; 16], // 64: 卷名称
    pub feature_incompat: u32, // 80: 不兼容特性
    pub lz4_max_distance: u16, // 84: LZ4 最大距离 / 可用压缩算法
    pub extra_devices: u16,    // 86: 额外设备数
    pub devt_slotoff: u16,     // 88: 设备表槽位偏移
}

impl erofs_super_block {
    /// 从字节解析
    pub fn parse(buf: &[u8]) -> Result<Self> {
        ensure_len(buf, EROFS_SUPER_SIZE, "Short read of superblock")?;

        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&buf[48..64]);
        let mut volume_name = [0u8; 16];
        volume_name.copy_from_slice(&buf[64..80]);

        Ok(Self {
            magic: LittleEndian::read_u32(&buf[0..]),
            checksum: LittleEndian::read_u32(&buf[4..]),
            feature_compat: LittleEndian::read_u32(&buf[8..]),
            blkszbits: buf[12],
            reserved: buf[13],
            root_nid: LittleEndian::read_u16(&buf[14..]),
            inos: LittleEndian::read_u64(&buf[16..]),
            build_time: LittleEndian::read_u64(&buf[24..]),
            build_time_nsec: LittleEndian::read_u32(&buf[32..]),
            blocks: LittleEndian::read_u32(&buf[36..]),
            meta_blkaddr: LittleEndian::read_u32(&buf[40..]),
            xattr_blkaddr: LittleEndian::read_u32(&buf[44..]),
            uuid,
            volume_name,
            feature_incompat: LittleEndian::read_u32(&buf[80..]),
            lz4_max_distance: LittleEndian::read_u16(&buf[84..]),
            extra_devices: LittleEndian::read_u16(&buf[86..]),
            devt_slotoff: LittleEndian::read_u16(&buf[88..]),
        })
    }

    /// 检查魔数
    pub fn is_valid(&self) -> bool {
        self.magic == EROFS_SUPER_MAGIC_V1
    }
}

/// 紧凑 inode（32 字节）
///
/// 对应 `struct erofs_inode_compact`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct erofs_inode_compact {
    pub i_format: u16,      // 0: 版本 + 数据布局
    pub i_xattr_icount: u16, // 2
    pub i_mode: u16,        // 4
    pub i_nlink: u16,       // 6
    pub i_size: u32,        // 8
    pub i_reserved: u32,    // 12
    pub i_u: u32,           // 16: raw_blkaddr / compressed_blocks / rdev
    pub i_ino: u32,         // 20
    pub i_uid: u16,         // 24
    pub i_gid: u16,         // 26
    pub i_reserved2: u32,   // 28
}

impl erofs_inode_compact {
    /// 从字节解析
    pub fn parse(buf: &[u8]) -> Result<Self> {
        ensure_len(buf, EROFS_INODE_COMPACT_SIZE, "Short read of compact inode")?;
        Ok(Self {
            i_format: LittleEndian::read_u16(&buf[0..]),
            i_xattr_icount: LittleEndian::read_u16(&buf[2..]),
            i_mode: LittleEndian::read_u16(&buf[4..]),
            i_nlink: LittleEndian::read_u16(&buf[6..]),
            i_size: LittleEndian::read_u32(&buf[8..]),
            i_reserved: LittleEndian::read_u32(&buf[12..]),
            i_u: LittleEndian::read_u32(&buf[16..]),
            i_ino: LittleEndian::read_u32(&buf[20..]),
            i_uid: LittleEndian::read_u16(&buf[24..]),
            i_gid: LittleEndian::read_u16(&buf[26..]),
            i_reserved2: LittleEndian::read_u32(&buf[28..]),
        })
    }
}

/// 扩展 inode（64 字节）
///
/// 对应 `struct erofs_inode_extended`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct erofs_inode_extended {
    pub i_format: u16,       // 0
    pub i_xattr_icount: u16, // 2
    pub i_mode: u16,         // 4
    pub i_reserved: u16,     // 6
    pub i_size: u64,         // 8
    pub i_u: u32,            // 16
    pub i_ino: u32,          // 20
    pub i_uid: u32,          // 24
    pub i_gid: u32,          // 28
    pub i_ctime: u64,        // 32
    pub i_ctime_nsec: u32,   // 40
    pub i_nlink: u32,        // 44
}

impl erofs_inode_extended {
    /// 从字节解析
    pub fn parse(buf: &[u8]) -> Result<Self> {
        ensure_len(buf, EROFS_INODE_EXTENDED_SIZE, "Short read of extended inode")?;
        Ok(Self {
            i_format: LittleEndian::read_u16(&buf[0..]),
            i_xattr_icount: LittleEndian::read_u16(&buf[2..]),
            i_mode: LittleEndian::read_u16(&buf[4..]),
            i_reserved: LittleEndian::read_u16(&buf[6..]),
            i_size: LittleEndian::read_u64(&buf[8..]),
            i_u: LittleEndian::read_u32(&buf[16..]),
            i_ino: LittleEndian::read_u32(&buf[20..]),
            i_uid: LittleEndian::read_u32(&buf[24..]),
            i_gid: LittleEndian::read_u32(&buf[28..]),
            i_ctime: LittleEndian::read_u64(&buf[32..]),
            i_ctime_nsec: LittleEndian::read_u32(&buf[40..]),
            i_nlink: LittleEndian::read_u32(&buf[44..]),
        })
    }
}

/// 目录项头部（12 字节）
///
/// 对应 `struct erofs_dirent`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct erofs_dirent {
    pub nid: u64,       // 0: 目标 inode 的 nid
    pub nameoff: u16,   // 8: 名称在块内的偏移
    pub file_type: u8,  // 10
    pub reserved: u8,   // 11
}

impl erofs_dirent {
    /// 从字节解析
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < EROFS_DIRENT_SIZE {
            return Err(Error::new(
                ErrorKind::Corrupted,
                "Directory entry header extends beyond block",
            ));
        }
        Ok(Self {
            nid: LittleEndian::read_u64(&buf[0..]),
            nameoff: LittleEndian::read_u16(&buf[8..]),
            file_type: buf[10],
            reserved: buf[11],
        })
    }
}

/// 压缩映射头（8 字节）
///
/// 对应 `struct z_erofs_map_header`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct z_erofs_map_header {
    pub h_reserved1: u32,     // 0
    pub h_advise: u16,        // 4
    pub h_algorithmtype: u8,  // 6: 低 4 位 HEAD1，高 4 位 HEAD2
    pub h_clusterbits: u8,    // 7: 低 3 位为 lclusterbits - blkszbits
}

impl z_erofs_map_header {
    /// 从字节解析
    pub fn parse(buf: &[u8]) -> Result<Self> {
        ensure_len(buf, Z_EROFS_MAP_HEADER_SIZE, "Short read of compression map header")?;
        Ok(Self {
            h_reserved1: LittleEndian::read_u32(&buf[0..]),
            h_advise: LittleEndian::read_u16(&buf[4..]),
            h_algorithmtype: buf[6],
            h_clusterbits: buf[7],
        })
    }

    /// advise 位
    pub fn advise(&self) -> MapAdvise {
        MapAdvise::from_bits_retain(self.h_advise)
    }
}

/// 完整 lcluster 索引（8 字节）
///
/// 对应 `struct z_erofs_lcluster_index`，`di_u` 按类型解释为
/// `blkaddr` 或 `delta[2]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct z_erofs_lcluster_index {
    pub di_advise: u16,     // 0: 类型位于低 2 位
    pub di_clusterofs: u16, // 2
    pub di_u: [u8; 4],      // 4
}

impl z_erofs_lcluster_index {
    /// 从字节解析
    pub fn parse(buf: &[u8]) -> Result<Self> {
        ensure_len(buf, Z_EROFS_FULL_INDEX_SIZE, "Short read of lcluster index")?;
        let mut di_u = [0u8; 4];
        di_u.copy_from_slice(&buf[4..8]);
        Ok(Self {
            di_advise: LittleEndian::read_u16(&buf[0..]),
            di_clusterofs: LittleEndian::read_u16(&buf[2..]),
            di_u,
        })
    }

    /// 原始 lcluster 类型
    pub fn raw_type(&self) -> u8 {
        ((self.di_advise >> Z_EROFS_LI_LCLUSTER_TYPE_BIT) & Z_EROFS_LI_LCLUSTER_TYPE_MASK) as u8
    }

    /// 将 `di_u` 解释为块地址
    pub fn blkaddr(&self) -> u32 {
        LittleEndian::read_u32(&self.di_u)
    }

    /// 将 `di_u` 解释为 delta 对
    pub fn delta(&self) -> [u16; 2] {
        [
            LittleEndian::read_u16(&self.di_u[0..]),
            LittleEndian::read_u16(&self.di_u[2..]),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superblock_parse_fields() {
        let mut buf = [0u8; EROFS_SUPER_SIZE];
        buf[0..4].copy_from_slice(&EROFS_SUPER_MAGIC_V1.to_le_bytes());
        buf[12] = 12;
        buf[14..16].copy_from_slice(&32u16.to_le_bytes());
        buf[36..40].copy_from_slice(&1000u32.to_le_bytes());
        buf[80..84].copy_from_slice(&EROFS_FEATURE_INCOMPAT_LZ4_0PADDING.to_le_bytes());

        let sb = erofs_super_block::parse(&buf).unwrap();
        assert!(sb.is_valid());
        assert_eq!(sb.blkszbits, 12);
        assert_eq!(sb.root_nid, 32);
        assert_eq!(sb.blocks, 1000);
        assert!(FeatureIncompat::from_bits_retain(sb.feature_incompat)
            .contains(FeatureIncompat::LZ4_0PADDING));
    }

    #[test]
    fn test_short_buffer_is_io_error() {
        let err = erofs_inode_compact::parse(&[0u8; 16]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_lcluster_index_union() {
        let mut buf = [0u8; 8];
        buf[0..2].copy_from_slice(&(Z_EROFS_LCLUSTER_TYPE_NONHEAD as u16).to_le_bytes());
        buf[4..6].copy_from_slice(&1u16.to_le_bytes());
        buf[6..8].copy_from_slice(&3u16.to_le_bytes());
        let idx = z_erofs_lcluster_index::parse(&buf).unwrap();
        assert_eq!(idx.raw_type(), Z_EROFS_LCLUSTER_TYPE_NONHEAD);
        assert_eq!(idx.delta(), [1, 3]);
        assert_eq!(idx.blkaddr(), 0x0003_0001);
    }
}
