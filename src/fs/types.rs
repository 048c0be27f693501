//! 文件系统层的公共类型
//!
//! 挂载配置和 inode 类型枚举

use crate::consts::*;

/// 文件系统配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsConfig {
    /// 块缓存大小（块数），为 0 时不启用缓存
    pub bcache_size: usize,
    /// 统计遍历的最大目录深度
    pub max_depth: u32,
    /// 挂载时是否校验 superblock CRC32C
    pub verify_checksum: bool,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            bcache_size: 256, // 默认 256 个块
            max_depth: 256,
            verify_checksum: true,
        }
    }
}

/// Inode 类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum InodeType {
    /// 未知类型
    #[default]
    Unknown = 0,
    /// FIFO（命名管道）
    Fifo = 1,
    /// 字符设备
    CharacterDevice = 2,
    /// 目录
    Directory = 3,
    /// 块设备
    BlockDevice = 4,
    /// 普通文件
    RegularFile = 5,
    /// 符号链接
    Symlink = 6,
    /// Socket
    Socket = 7,
}

impl InodeType {
    /// 类型总数，用于按类型统计
    pub const COUNT: usize = 8;

    /// 所有类型
    pub const ALL: [InodeType; Self::COUNT] = [
        InodeType::Unknown,
        InodeType::Fifo,
        InodeType::CharacterDevice,
        InodeType::Directory,
        InodeType::BlockDevice,
        InodeType::RegularFile,
        InodeType::Symlink,
        InodeType::Socket,
    ];

    /// 从 mode 中提取 inode 类型
    ///
    /// 类型位无法识别时返回 `None`
    pub fn from_mode(mode: u16) -> Option<Self> {
        match mode & S_IFMT {
            S_IFIFO => Some(InodeType::Fifo),
            S_IFCHR => Some(InodeType::CharacterDevice),
            S_IFDIR => Some(InodeType::Directory),
            S_IFBLK => Some(InodeType::BlockDevice),
            S_IFREG => Some(InodeType::RegularFile),
            S_IFLNK => Some(InodeType::Symlink),
            S_IFSOCK => Some(InodeType::Socket),
            _ => None,
        }
    }

    /// 转换为 mode 类型位
    pub fn to_mode_bits(self) -> u16 {
        match self {
            InodeType::Fifo => S_IFIFO,
            InodeType::CharacterDevice => S_IFCHR,
            InodeType::Directory => S_IFDIR,
            InodeType::BlockDevice => S_IFBLK,
            InodeType::RegularFile => S_IFREG,
            InodeType::Symlink => S_IFLNK,
            InodeType::Socket => S_IFSOCK,
            InodeType::Unknown => 0,
        }
    }

    /// 从目录项文件类型转换
    pub fn from_de_type(de_type: u8) -> Self {
        match de_type {
            EROFS_FT_REG_FILE => InodeType::RegularFile,
            EROFS_FT_DIR => InodeType::Directory,
            EROFS_FT_CHRDEV => InodeType::CharacterDevice,
            EROFS_FT_BLKDEV => InodeType::BlockDevice,
            EROFS_FT_FIFO => InodeType::Fifo,
            EROFS_FT_SOCK => InodeType::Socket,
            EROFS_FT_SYMLINK => InodeType::Symlink,
            _ => InodeType::Unknown,
        }
    }

    /// 转换为目录项文件类型
    pub fn to_de_type(self) -> u8 {
        match self {
            InodeType::RegularFile => EROFS_FT_REG_FILE,
            InodeType::Directory => EROFS_FT_DIR,
            InodeType::CharacterDevice => EROFS_FT_CHRDEV,
            InodeType::BlockDevice => EROFS_FT_BLKDEV,
            InodeType::Fifo => EROFS_FT_FIFO,
            InodeType::Socket => EROFS_FT_SOCK,
            InodeType::Symlink => EROFS_FT_SYMLINK,
            InodeType::Unknown => EROFS_FT_UNKNOWN,
        }
    }

    /// 在 [`InodeType::ALL`] 中的下标
    pub fn index(self) -> usize {
        self as usize
    }

    /// 检查是否为目录
    pub fn is_dir(self) -> bool {
        self == InodeType::Directory
    }

    /// 检查是否为普通文件
    pub fn is_file(self) -> bool {
        self == InodeType::RegularFile
    }

    /// 检查是否为符号链接
    pub fn is_symlink(self) -> bool {
        self == InodeType::Symlink
    }

    /// 检查是否为设备节点
    pub fn is_device(self) -> bool {
        matches!(self, InodeType::CharacterDevice | InodeType::BlockDevice)
    }
}
