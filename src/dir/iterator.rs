//! 目录迭代器
//!
//! EROFS 目录数据按块划分。每个块开头是连续的 12 字节目录项头部，
//! 第一个头部的 `nameoff` 同时给出头部区的长度；名称紧跟在头部区之后依次存放。
//! 第 `i` 个名称占据 `[nameoff[i], nameoff[i + 1])`，最后一个名称截止到块末尾
//! 或第一个 NUL 字节。
//!
//! ## 设计说明
//!
//! 迭代器只保存状态（目录 inode、当前逻辑块和块内位置），不持有 `BlockDev`
//! 的引用；每次调用 [`DirIterator::next`] 时传入块设备和 superblock。
//! `.` 和 `..` 作为普通目录项返回，是否跳过由调用者决定。

use crate::{
    block::{BlockDev, BlockDevice},
    consts::*,
    error::{Error, ErrorKind, Result},
    fs::InodeType,
    inode::{map_flat, Inode},
    superblock::Superblock,
    types::erofs_dirent,
};
use alloc::{borrow::Cow, string::String, vec::Vec};

/// 目录迭代器状态
pub struct DirIterator {
    /// 目录 inode
    dir: Inode,
    /// 目录占用的逻辑块数
    nblocks: u64,
    /// 下一个要读取的逻辑块
    next_lblk: u64,
    /// 当前块的数据
    block: Vec<u8>,
    /// 当前块中的目录项数
    entry_count: usize,
    /// 当前块中下一个目录项的下标
    entry_idx: usize,
    /// 遇到损坏后停止
    failed: bool,
}

impl DirIterator {
    /// 创建新的目录迭代器
    ///
    /// # 参数
    ///
    /// * `sb` - superblock 引用
    /// * `dir` - 目录 inode
    ///
    /// # 返回
    ///
    /// 不是目录返回 `InvalidInput`，压缩布局的目录返回 `Unsupported`
    pub fn new(sb: &Superblock, dir: &Inode) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Inode is not a directory",
            ));
        }
        if dir.is_compressed() {
            return Err(Error::new(
                ErrorKind::Unsupported,
                "Compressed directories are not supported",
            ));
        }

        let nblocks = dir.nblocks(sb)?;

        Ok(Self {
            dir: dir.clone(),
            nblocks,
            next_lblk: 0,
            block: Vec::new(),
            entry_count: 0,
            entry_idx: 0,
            failed: false,
        })
    }

    /// 回到目录开头
    pub fn rewind(&mut self) {
        self.next_lblk = 0;
        self.block.clear();
        self.entry_count = 0;
        self.entry_idx = 0;
        self.failed = false;
    }

    /// 目录 inode
    pub fn dir(&self) -> &Inode {
        &self.dir
    }

    /// 获取下一个目录项
    ///
    /// # 参数
    ///
    /// * `bdev` - 块设备引用
    /// * `sb` - superblock 引用
    ///
    /// # 返回
    ///
    /// - `Ok(Some(DirEntry))` - 成功获取下一个目录项
    /// - `Ok(None)` - 已到达目录末尾
    /// - `Err(_)` - 块内布局损坏或 I/O 错误，之后的调用返回 `Ok(None)`
    pub fn next<D: BlockDevice>(
        &mut self,
        bdev: &mut BlockDev<D>,
        sb: &Superblock,
    ) -> Result<Option<DirEntry>> {
        if self.failed {
            return Ok(None);
        }

        let result = self.advance(bdev, sb);
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    fn advance<D: BlockDevice>(
        &mut self,
        bdev: &mut BlockDev<D>,
        sb: &Superblock,
    ) -> Result<Option<DirEntry>> {
        while self.entry_idx >= self.entry_count {
            if self.next_lblk >= self.nblocks {
                return Ok(None);
            }
            self.load_block(bdev, sb)?;
        }

        let entry = self.decode_entry(self.entry_idx)?;
        self.entry_idx += 1;
        Ok(Some(entry))
    }

    /// 读入下一个逻辑块并校验头部区
    fn load_block<D: BlockDevice>(&mut self, bdev: &mut BlockDev<D>, sb: &Superblock) -> Result<()> {
        let lblk = self.next_lblk;
        let mapping = map_flat(sb, &self.dir, lblk)?;

        self.block.clear();
        self.block.try_reserve_exact(mapping.len as usize)?;
        self.block.resize(mapping.len as usize, 0);
        bdev.read_bytes(mapping.offset, &mut self.block)?;
        self.next_lblk += 1;
        self.entry_idx = 0;
        self.entry_count = 0;

        let first = erofs_dirent::parse(&self.block)?;
        let nameoff0 = first.nameoff as usize;
        if nameoff0 < EROFS_DIRENT_SIZE
            || nameoff0 >= sb.block_size() as usize
            || nameoff0 > self.block.len()
        {
            log::warn!(
                "[DIR] nid={} lblk={} invalid nameoff0 {}",
                self.dir.nid(),
                lblk,
                nameoff0
            );
            return Err(Error::new(
                ErrorKind::Corrupted,
                "Directory block has invalid first name offset",
            ));
        }

        self.entry_count = nameoff0 / EROFS_DIRENT_SIZE;
        log::trace!(
            "[DIR] nid={} lblk={} offset={} len={} entries={}",
            self.dir.nid(),
            lblk,
            mapping.offset,
            mapping.len,
            self.entry_count
        );
        Ok(())
    }

    /// 解码当前块中的第 `idx` 个目录项
    fn decode_entry(&self, idx: usize) -> Result<DirEntry> {
        let block = &self.block[..];
        let de = erofs_dirent::parse(&block[idx * EROFS_DIRENT_SIZE..])?;
        let nameoff = de.nameoff as usize;
        let headers_end = self.entry_count * EROFS_DIRENT_SIZE;

        if nameoff < headers_end || nameoff > block.len() {
            return Err(Error::new(
                ErrorKind::Corrupted,
                "Directory entry name offset out of range",
            ));
        }

        let name_len = if idx + 1 < self.entry_count {
            let next = erofs_dirent::parse(&block[(idx + 1) * EROFS_DIRENT_SIZE..])?;
            (next.nameoff as usize).checked_sub(nameoff).ok_or(Error::new(
                ErrorKind::Corrupted,
                "Directory entry names overlap",
            ))?
        } else {
            let tail = &block[nameoff..];
            tail.iter().position(|&b| b == 0).unwrap_or(tail.len())
        };

        if name_len == 0 || name_len > EROFS_NAME_LEN || nameoff + name_len > block.len() {
            log::warn!(
                "[DIR] nid={} entry {} bad name span {}+{}",
                self.dir.nid(),
                idx,
                nameoff,
                name_len
            );
            return Err(Error::new(
                ErrorKind::Corrupted,
                "Directory entry name length out of range",
            ));
        }

        let mut name = Vec::new();
        name.try_reserve_exact(name_len)?;
        name.extend_from_slice(&block[nameoff..nameoff + name_len]);

        Ok(DirEntry {
            nid: de.nid,
            name,
            file_type: de.file_type,
        })
    }
}

/// 目录项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// 目标 inode 的 nid
    pub nid: u64,
    /// 文件名（原始字节）
    pub name: Vec<u8>,
    /// 目录项中的文件类型
    pub file_type: u8,
}

impl DirEntry {
    /// 文件名，非 UTF-8 字节替换为 U+FFFD
    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// 目录项记录的 inode 类型
    pub fn inode_type(&self) -> InodeType {
        InodeType::from_de_type(self.file_type)
    }

    /// 是否为 `.` 或 `..`
    pub fn is_dot_or_dotdot(&self) -> bool {
        self.name == b"." || self.name == b".."
    }

    /// 检查是否是目录
    pub fn is_dir(&self) -> bool {
        self.file_type == EROFS_FT_DIR
    }

    /// 检查是否是普通文件
    pub fn is_file(&self) -> bool {
        self.file_type == EROFS_FT_REG_FILE
    }

    /// 检查是否是符号链接
    pub fn is_symlink(&self) -> bool {
        self.file_type == EROFS_FT_SYMLINK
    }
}

/// 便捷函数：读取目录中的所有条目
///
/// # 参数
///
/// * `bdev` - 块设备引用
/// * `sb` - superblock 引用
/// * `dir` - 目录 inode
///
/// # 返回
///
/// 按块顺序、块内顺序排列的目录项列表
pub fn read_dir<D: BlockDevice>(
    bdev: &mut BlockDev<D>,
    sb: &Superblock,
    dir: &Inode,
) -> Result<Vec<DirEntry>> {
    let mut iter = DirIterator::new(sb, dir)?;
    let mut entries = Vec::new();

    while let Some(entry) = iter.next(bdev, sb)? {
        entries.try_reserve(1)?;
        entries.push(entry);
    }

    log::debug!("[DIR] nid={} read {} entries", dir.nid(), entries.len());
    Ok(entries)
}
