//! Inode 读取和解码

use crate::{
    block::{BlockDev, BlockDevice},
    consts::*,
    error::{Error, ErrorKind, Result},
    fs::InodeType,
    superblock::Superblock,
    types::{erofs_inode_compact, erofs_inode_extended},
};

/// inode 磁盘布局版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeVersion {
    /// 32 字节紧凑 inode
    Compact,
    /// 64 字节扩展 inode
    Extended,
}

impl InodeVersion {
    /// inode 核心部分大小（字节）
    pub fn core_size(self) -> u32 {
        match self {
            InodeVersion::Compact => EROFS_INODE_COMPACT_SIZE as u32,
            InodeVersion::Extended => EROFS_INODE_EXTENDED_SIZE as u32,
        }
    }
}

/// 数据布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataLayout {
    /// 平铺，数据从 `raw_blkaddr` 开始连续存放
    FlatPlain,
    /// 压缩，完整 lcluster 索引
    CompressedFull,
    /// 平铺，尾块内联在 inode 之后
    FlatInline,
    /// 压缩，紧凑 lcluster 索引
    CompressedCompact,
}

impl DataLayout {
    /// 从 `i_format` 的布局字段解析
    ///
    /// # 返回
    ///
    /// 分块布局和未知布局返回 `Unsupported`
    pub fn from_raw(raw: u16) -> Result<Self> {
        match raw {
            EROFS_INODE_FLAT_PLAIN => Ok(DataLayout::FlatPlain),
            EROFS_INODE_FLAT_COMPRESSION_LEGACY => Ok(DataLayout::CompressedFull),
            EROFS_INODE_FLAT_INLINE => Ok(DataLayout::FlatInline),
            EROFS_INODE_FLAT_COMPRESSION => Ok(DataLayout::CompressedCompact),
            EROFS_INODE_CHUNK_BASED => Err(Error::new(
                ErrorKind::Unsupported,
                "Chunk-based data layout is not supported",
            )),
            _ => Err(Error::new(ErrorKind::Unsupported, "Unknown inode data layout")),
        }
    }

    /// 是否为压缩布局
    pub fn is_compressed(self) -> bool {
        matches!(self, DataLayout::CompressedFull | DataLayout::CompressedCompact)
    }
}

/// `i_u` 联合体按 mode 和布局解释后的值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeData {
    /// 平铺数据起始块
    RawBlkAddr(u32),
    /// 压缩数据占用的块数
    CompressedBlocks(u32),
    /// 字符/块设备号
    Device {
        /// 主设备号
        major: u32,
        /// 次设备号
        minor: u32,
    },
    /// FIFO / Socket 没有数据
    None,
}

/// 拆分旧式打包设备号
///
/// 主设备号位于 8..20 位，次设备号分布在 0..8 位和 20..32 位
pub fn decode_rdev(dev: u32) -> (u32, u32) {
    let major = (dev & 0xfff00) >> 8;
    let minor = (dev & 0xff) | ((dev >> 12) & 0xfff00);
    (major, minor)
}

/// 计算 inline xattr 区大小
pub fn xattr_ibody_size(icount: u16) -> u32 {
    if icount == 0 {
        0
    } else {
        EROFS_XATTR_IBODY_HEADER_SIZE + (icount as u32 - 1) * EROFS_XATTR_ENTRY_SIZE
    }
}

/// 解码后的 inode
///
/// 每次查询都从磁盘重新构造，不做缓存。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub(super) nid: u64,
    pub(super) iloc: u64,
    pub(super) version: InodeVersion,
    pub(super) layout: DataLayout,
    pub(super) xattr_isize: u32,
    pub(super) ino: u32,
    pub(super) mode: u16,
    pub(super) inode_type: InodeType,
    pub(super) uid: u32,
    pub(super) gid: u32,
    pub(super) nlink: u32,
    pub(super) ctime: u64,
    pub(super) ctime_nsec: u32,
    pub(super) size: u64,
    pub(super) data: InodeData,
}

/// 从块设备读取并解码 inode
///
/// # 参数
///
/// * `bdev` - 块设备引用
/// * `sb` - superblock 引用
/// * `nid` - inode 的 nid
///
/// # 返回
///
/// 短读返回 `Io`，未知布局返回 `Unsupported`，无法识别的 mode 返回 `Corrupted`
pub fn read_inode<D: BlockDevice>(
    bdev: &mut BlockDev<D>,
    sb: &Superblock,
    nid: u64,
) -> Result<Inode> {
    let iloc = sb.iloc(nid)?;
    let mut buf = [0u8; EROFS_INODE_EXTENDED_SIZE];

    // 先读紧凑 inode 大小，足以判断版本
    bdev.read_bytes(iloc, &mut buf[..EROFS_INODE_COMPACT_SIZE])?;

    let i_format = u16::from_le_bytes([buf[0], buf[1]]);
    let version_raw = (i_format >> EROFS_I_VERSION_BIT) & ((1 << EROFS_I_VERSION_BITS) - 1);
    let layout_raw = (i_format >> EROFS_I_DATALAYOUT_BIT) & ((1 << EROFS_I_DATALAYOUT_BITS) - 1);
    let layout = DataLayout::from_raw(layout_raw)?;

    let version = if version_raw == EROFS_INODE_LAYOUT_EXTENDED {
        InodeVersion::Extended
    } else {
        InodeVersion::Compact
    };

    let mut inode = match version {
        InodeVersion::Extended => {
            bdev.read_bytes(
                iloc + EROFS_INODE_COMPACT_SIZE as u64,
                &mut buf[EROFS_INODE_COMPACT_SIZE..],
            )?;
            let die = erofs_inode_extended::parse(&buf)?;
            Inode {
                nid,
                iloc,
                version,
                layout,
                xattr_isize: xattr_ibody_size(die.i_xattr_icount),
                ino: die.i_ino,
                mode: die.i_mode,
                inode_type: InodeType::Unknown,
                uid: die.i_uid,
                gid: die.i_gid,
                nlink: die.i_nlink,
                ctime: die.i_ctime,
                ctime_nsec: die.i_ctime_nsec,
                size: die.i_size,
                data: InodeData::None,
            }
        }
        InodeVersion::Compact => {
            let dic = erofs_inode_compact::parse(&buf[..EROFS_INODE_COMPACT_SIZE])?;
            Inode {
                nid,
                iloc,
                version,
                layout,
                xattr_isize: xattr_ibody_size(dic.i_xattr_icount),
                ino: dic.i_ino,
                mode: dic.i_mode,
                inode_type: InodeType::Unknown,
                uid: dic.i_uid as u32,
                gid: dic.i_gid as u32,
                nlink: dic.i_nlink as u32,
                // 紧凑 inode 没有时间字段，使用镜像构建时间
                ctime: sb.build_time(),
                ctime_nsec: sb.build_time_nsec(),
                size: dic.i_size as u64,
                data: InodeData::None,
            }
        }
    };

    // 两种布局中 i_u 都位于偏移 16
    let i_u = u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]);

    let inode_type = InodeType::from_mode(inode.mode).ok_or_else(|| {
        log::warn!("[INODE] nid {} has bogus mode {:#o}", nid, inode.mode);
        Error::new(ErrorKind::Corrupted, "Bogus inode mode")
    })?;
    inode.inode_type = inode_type;

    inode.data = match inode_type {
        InodeType::RegularFile | InodeType::Directory | InodeType::Symlink => {
            if layout.is_compressed() {
                InodeData::CompressedBlocks(i_u)
            } else {
                InodeData::RawBlkAddr(i_u)
            }
        }
        InodeType::CharacterDevice | InodeType::BlockDevice => {
            let (major, minor) = decode_rdev(i_u);
            InodeData::Device { major, minor }
        }
        InodeType::Fifo | InodeType::Socket => InodeData::None,
        InodeType::Unknown => {
            return Err(Error::new(ErrorKind::Corrupted, "Bogus inode mode"));
        }
    };

    log::debug!(
        "[INODE] nid={} version={:?} layout={:?} type={:?} size={} xattr_isize={}",
        nid,
        version,
        layout,
        inode_type,
        inode.size,
        inode.xattr_isize
    );

    Ok(inode)
}

impl Inode {
    /// 从块设备加载 inode
    ///
    /// # 参数
    ///
    /// * `bdev` - 块设备引用
    /// * `sb` - superblock 引用
    /// * `nid` - inode 的 nid
    pub fn load<D: BlockDevice>(bdev: &mut BlockDev<D>, sb: &Superblock, nid: u64) -> Result<Self> {
        read_inode(bdev, sb, nid)
    }

    /// 获取 nid
    pub fn nid(&self) -> u64 {
        self.nid
    }

    /// inode 在镜像中的字节偏移
    pub fn iloc(&self) -> u64 {
        self.iloc
    }

    /// 磁盘布局版本
    pub fn version(&self) -> InodeVersion {
        self.version
    }

    /// inode 核心部分大小（32 或 64）
    pub fn inode_isize(&self) -> u32 {
        self.version.core_size()
    }

    /// inline xattr 区大小
    pub fn xattr_isize(&self) -> u32 {
        self.xattr_isize
    }

    /// 数据布局
    pub fn layout(&self) -> DataLayout {
        self.layout
    }

    /// inode 号
    pub fn ino(&self) -> u32 {
        self.ino
    }

    /// 文件模式（类型 + 权限）
    pub fn mode(&self) -> u16 {
        self.mode
    }

    /// 权限位
    pub fn permissions(&self) -> u16 {
        self.mode & !S_IFMT
    }

    /// inode 类型
    pub fn inode_type(&self) -> InodeType {
        self.inode_type
    }

    /// 用户 ID
    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// 组 ID
    pub fn gid(&self) -> u32 {
        self.gid
    }

    /// 硬链接数
    pub fn nlink(&self) -> u32 {
        self.nlink
    }

    /// 时间（秒）
    pub fn ctime(&self) -> u64 {
        self.ctime
    }

    /// 时间（纳秒部分）
    pub fn ctime_nsec(&self) -> u32 {
        self.ctime_nsec
    }

    /// 逻辑大小（字节）
    pub fn size(&self) -> u64 {
        self.size
    }

    /// 按类型解释后的 `i_u`
    pub fn data(&self) -> InodeData {
        self.data
    }

    /// 平铺数据起始块
    pub fn raw_blkaddr(&self) -> Option<u32> {
        match self.data {
            InodeData::RawBlkAddr(addr) => Some(addr),
            _ => None,
        }
    }

    /// 设备号 (major, minor)
    pub fn rdev(&self) -> Option<(u32, u32)> {
        match self.data {
            InodeData::Device { major, minor } => Some((major, minor)),
            _ => None,
        }
    }

    /// 检查是否为目录
    pub fn is_dir(&self) -> bool {
        self.inode_type.is_dir()
    }

    /// 检查是否为普通文件
    pub fn is_file(&self) -> bool {
        self.inode_type.is_file()
    }

    /// 检查是否为符号链接
    pub fn is_symlink(&self) -> bool {
        self.inode_type.is_symlink()
    }

    /// 检查是否为压缩布局
    pub fn is_compressed(&self) -> bool {
        self.layout.is_compressed()
    }

    /// inode + inline xattr 之后的字节偏移
    pub fn inline_data_offset(&self) -> u64 {
        self.iloc + self.inode_isize() as u64 + self.xattr_isize as u64
    }

    /// 逻辑大小对应的块数（向上取整）
    ///
    /// # 返回
    ///
    /// 块数超出 32 位块地址能表示的范围时返回 `Corrupted`
    pub fn nblocks(&self, sb: &Superblock) -> Result<u64> {
        let count = units_round_up(self.size, sb.blkszbits() as u32);
        if count > MAX_ADDRESSABLE_UNITS {
            log::warn!("[INODE] nid {} size {} exceeds addressable blocks", self.nid, self.size);
            return Err(Error::new(
                ErrorKind::Corrupted,
                "Inode size exceeds addressable blocks",
            ));
        }
        Ok(count)
    }
}

/// 块地址和 lcluster 号都是 32 位，文件最多覆盖这么多个单位
pub(crate) const MAX_ADDRESSABLE_UNITS: u64 = 1 << 32;

/// 按 `1 << bits` 为单位向上取整，不会溢出
pub(crate) fn units_round_up(size: u64, bits: u32) -> u64 {
    (size >> bits) + (size & ((1u64 << bits) - 1) != 0) as u64
}
