//! 路径查找
//!
//! 从根目录开始逐级在目录中查找路径组件。EROFS 目录把 `.` 和 `..` 存为普通
//! 目录项，所以这两个组件和其他名称一样按目录项匹配。

use crate::{
    block::{BlockDev, BlockDevice},
    error::{Error, ErrorKind, Result},
    inode::{read_inode, Inode},
    superblock::Superblock,
};

use super::iterator::DirIterator;

/// 路径查找器
///
/// 用于根据路径字符串查找 inode
pub struct PathLookup<'a, D: BlockDevice> {
    bdev: &'a mut BlockDev<D>,
    sb: &'a Superblock,
}

impl<'a, D: BlockDevice> PathLookup<'a, D> {
    /// 创建新的路径查找器
    pub fn new(bdev: &'a mut BlockDev<D>, sb: &'a Superblock) -> Self {
        Self { bdev, sb }
    }

    /// 根据路径查找 inode
    ///
    /// # 参数
    ///
    /// * `path` - 以 `/` 分隔的路径，总是从根目录开始解析
    ///
    /// # 返回
    ///
    /// 找到的 inode。组件不存在返回 `NotFound`，中间组件不是目录返回 `InvalidInput`
    ///
    /// # 示例
    ///
    /// ```ignore
    /// let mut lookup = PathLookup::new(&mut bdev, &sb);
    /// let inode = lookup.find_inode("/bin/ls")?;
    /// ```
    pub fn find_inode(&mut self, path: &str) -> Result<Inode> {
        if path.is_empty() {
            return Err(Error::new(ErrorKind::InvalidInput, "Empty path"));
        }

        let mut current = read_inode(self.bdev, self.sb, self.sb.root_nid())?;

        for component in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
            if !current.is_dir() {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    "Not a directory",
                ));
            }

            let nid = self.find_in_dir(&current, component.as_bytes())?;
            log::trace!("[DIR] lookup {:?} -> nid {}", component, nid);
            current = read_inode(self.bdev, self.sb, nid)?;
        }

        Ok(current)
    }

    /// 根据路径查找 nid
    pub fn find_nid(&mut self, path: &str) -> Result<u64> {
        Ok(self.find_inode(path)?.nid())
    }

    fn find_in_dir(&mut self, dir: &Inode, name: &[u8]) -> Result<u64> {
        let mut iter = DirIterator::new(self.sb, dir)?;
        while let Some(entry) = iter.next(self.bdev, self.sb)? {
            if entry.name == name {
                return Ok(entry.nid);
            }
        }
        Err(Error::new(
            ErrorKind::NotFound,
            "Path component not found",
        ))
    }
}

/// 便捷函数：根据路径查找 inode
///
/// # 参数
///
/// * `bdev` - 块设备引用
/// * `sb` - superblock 引用
/// * `path` - 路径字符串
pub fn lookup_path<D: BlockDevice>(
    bdev: &mut BlockDev<D>,
    sb: &Superblock,
    path: &str,
) -> Result<Inode> {
    PathLookup::new(bdev, sb).find_inode(path)
}
