//! EROFS 文件系统常量定义
//!
//! 这个模块包含了 EROFS 磁盘格式的常量定义，包括：
//! - 磁盘布局相关常量
//! - inode 格式字段和文件类型位
//! - 特性标志
//! - 压缩索引（lcluster）相关常量

//=============================================================================
// 基础常量
//=============================================================================

/// 最小块大小位数（512 字节）
pub const EROFS_MIN_BLOCK_BITS: u8 = 9;

/// 最大块大小位数（65536 字节）
pub const EROFS_MAX_BLOCK_BITS: u8 = 16;

/// 默认块大小（4096 字节）
pub const EROFS_DEFAULT_BLOCK_SIZE: u32 = 4096;

//=============================================================================
// Superblock 相关
//=============================================================================

/// Superblock 在镜像上的字节偏移
pub const EROFS_SUPER_OFFSET: u64 = 1024;

/// Superblock 大小（字节）
pub const EROFS_SUPER_SIZE: usize = 128;

/// EROFS 魔数
pub const EROFS_SUPER_MAGIC_V1: u32 = 0xE0F5_E1E2;

/// superblock 中校验和字段的偏移
pub const EROFS_SUPER_CHECKSUM_OFFSET: usize = 4;

/// 兼容特性：superblock 校验和
pub const EROFS_FEATURE_COMPAT_SB_CHKSUM: u32 = 0x0000_0001;
/// 兼容特性：每 inode 修改时间
pub const EROFS_FEATURE_COMPAT_MTIME: u32 = 0x0000_0002;

/// 不兼容特性：LZ4 零填充
pub const EROFS_FEATURE_INCOMPAT_LZ4_0PADDING: u32 = 0x0000_0001;
/// 不兼容特性：大物理簇（与 COMPR_CFGS 共用同一位）
pub const EROFS_FEATURE_INCOMPAT_BIG_PCLUSTER: u32 = 0x0000_0002;
/// 不兼容特性：压缩配置
pub const EROFS_FEATURE_INCOMPAT_COMPR_CFGS: u32 = 0x0000_0002;
/// 不兼容特性：分块文件
pub const EROFS_FEATURE_INCOMPAT_CHUNKED_FILE: u32 = 0x0000_0004;
/// 不兼容特性：多设备表
pub const EROFS_FEATURE_INCOMPAT_DEVICE_TABLE: u32 = 0x0000_0008;

//=============================================================================
// Inode 相关
//=============================================================================

/// inode 槽位大小位数（nid 以 32 字节为单位）
pub const EROFS_ISLOTBITS: u32 = 5;

/// 紧凑 inode 大小
pub const EROFS_INODE_COMPACT_SIZE: usize = 32;

/// 扩展 inode 大小
pub const EROFS_INODE_EXTENDED_SIZE: usize = 64;

/// i_format 中版本位
pub const EROFS_I_VERSION_BIT: u16 = 0;
/// i_format 中版本位宽
pub const EROFS_I_VERSION_BITS: u16 = 1;
/// i_format 中数据布局起始位
pub const EROFS_I_DATALAYOUT_BIT: u16 = 1;
/// i_format 中数据布局位宽
pub const EROFS_I_DATALAYOUT_BITS: u16 = 3;

/// 版本：紧凑 inode
pub const EROFS_INODE_LAYOUT_COMPACT: u16 = 0;
/// 版本：扩展 inode
pub const EROFS_INODE_LAYOUT_EXTENDED: u16 = 1;

/// 数据布局：平铺
pub const EROFS_INODE_FLAT_PLAIN: u16 = 0;
/// 数据布局：压缩（完整索引）
pub const EROFS_INODE_FLAT_COMPRESSION_LEGACY: u16 = 1;
/// 数据布局：平铺 + 尾部内联
pub const EROFS_INODE_FLAT_INLINE: u16 = 2;
/// 数据布局：压缩（紧凑索引）
pub const EROFS_INODE_FLAT_COMPRESSION: u16 = 3;
/// 数据布局：分块
pub const EROFS_INODE_CHUNK_BASED: u16 = 4;

/// xattr ibody 头大小
pub const EROFS_XATTR_IBODY_HEADER_SIZE: u32 = 12;
/// xattr 条目槽大小
pub const EROFS_XATTR_ENTRY_SIZE: u32 = 4;

//=============================================================================
// 文件类型和权限位
//=============================================================================

/// 文件类型掩码
pub const S_IFMT: u16 = 0o170000;
/// Socket
pub const S_IFSOCK: u16 = 0o140000;
/// 符号链接
pub const S_IFLNK: u16 = 0o120000;
/// 普通文件
pub const S_IFREG: u16 = 0o100000;
/// 块设备
pub const S_IFBLK: u16 = 0o060000;
/// 目录
pub const S_IFDIR: u16 = 0o040000;
/// 字符设备
pub const S_IFCHR: u16 = 0o020000;
/// FIFO
pub const S_IFIFO: u16 = 0o010000;

//=============================================================================
// 目录相关
//=============================================================================

/// 目录项头部大小
pub const EROFS_DIRENT_SIZE: usize = 12;

/// 最大文件名长度
pub const EROFS_NAME_LEN: usize = 255;

/// 目录项文件类型：未知
pub const EROFS_FT_UNKNOWN: u8 = 0;
/// 目录项文件类型：普通文件
pub const EROFS_FT_REG_FILE: u8 = 1;
/// 目录项文件类型：目录
pub const EROFS_FT_DIR: u8 = 2;
/// 目录项文件类型：字符设备
pub const EROFS_FT_CHRDEV: u8 = 3;
/// 目录项文件类型：块设备
pub const EROFS_FT_BLKDEV: u8 = 4;
/// 目录项文件类型：FIFO
pub const EROFS_FT_FIFO: u8 = 5;
/// 目录项文件类型：Socket
pub const EROFS_FT_SOCK: u8 = 6;
/// 目录项文件类型：符号链接
pub const EROFS_FT_SYMLINK: u8 = 7;

//=============================================================================
// 压缩索引相关
//=============================================================================

/// 压缩映射头大小
pub const Z_EROFS_MAP_HEADER_SIZE: usize = 8;

/// 完整索引在映射头之后的填充
pub const Z_EROFS_LEGACY_HEADER_PADDING: u64 = 8;

/// 完整 lcluster 索引大小
pub const Z_EROFS_FULL_INDEX_SIZE: usize = 8;

/// lcluster 类型在 di_advise 中的起始位
pub const Z_EROFS_LI_LCLUSTER_TYPE_BIT: u16 = 0;
/// lcluster 类型位宽
pub const Z_EROFS_LI_LCLUSTER_TYPE_BITS: u16 = 2;
/// lcluster 类型掩码
pub const Z_EROFS_LI_LCLUSTER_TYPE_MASK: u16 = (1 << Z_EROFS_LI_LCLUSTER_TYPE_BITS) - 1;

/// lcluster 类型：未压缩
pub const Z_EROFS_LCLUSTER_TYPE_PLAIN: u8 = 0;
/// lcluster 类型：压缩头
pub const Z_EROFS_LCLUSTER_TYPE_HEAD: u8 = 1;
/// lcluster 类型：非头
pub const Z_EROFS_LCLUSTER_TYPE_NONHEAD: u8 = 2;
/// lcluster 类型：保留（新格式中的 HEAD2）
pub const Z_EROFS_LCLUSTER_TYPE_RESERVED: u8 = 3;

/// delta[0] 中的压缩块计数标志
pub const Z_EROFS_LI_D0_CBLKCNT: u16 = 1 << 11;

/// 压缩算法：LZ4
pub const Z_EROFS_COMPRESSION_LZ4: u8 = 0;
/// 压缩算法：LZMA
pub const Z_EROFS_COMPRESSION_LZMA: u8 = 1;

/// 物理簇最大大小（字节）
pub const Z_EROFS_PCLUSTER_MAX_SIZE: usize = 1024 * 1024;

/// LZ4 最大压缩比
pub const LZ4_MAX_COMPRESSION_RATIO: usize = 255;
