//! EROFS 文件系统核心结构

use crate::{
    block::{BlockDev, BlockDevice},
    dir::{lookup_path, read_dir, DirEntry, DirIterator},
    error::Result,
    inode::{read_inode, Inode},
    superblock::Superblock,
    zmap::{self, CompressedInode, ExtentMap},
};
use alloc::vec::Vec;

use super::types::FsConfig;

/// 只读 EROFS 文件系统
///
/// 持有块设备、superblock 和挂载配置。所有查询都是同步的，按调用顺序读取镜像。
///
/// # 示例
///
/// ```rust,ignore
/// use erofs_core::{ErofsFileSystem, MemDevice};
///
/// let device = MemDevice::new(image, 4096);
/// let mut fs = ErofsFileSystem::mount_with_config(device, FsConfig::default())?;
///
/// let root = fs.root_inode()?;
/// for entry in fs.read_dir(&root)? {
///     println!("{}", entry.name_lossy());
/// }
///
/// let inode = fs.lookup("/usr/lib/libc.so")?;
/// println!("occupied: {} bytes", fs.occupied_size(&inode)?);
/// ```
pub struct ErofsFileSystem<D: BlockDevice> {
    pub(crate) bdev: BlockDev<D>,
    sb: Superblock,
    config: FsConfig,
}

impl<D: BlockDevice> ErofsFileSystem<D> {
    /// 挂载文件系统（默认配置，沿用块设备已有的缓存设置）
    ///
    /// # 参数
    ///
    /// * `bdev` - 块设备包装器
    ///
    /// # 错误
    ///
    /// - `ErrorKind::Corrupted` - 无效的 superblock 或校验和不匹配
    /// - `ErrorKind::Unsupported` - 块大小或特性不受支持
    /// - `ErrorKind::Io` - 设备读取失败
    pub fn mount(mut bdev: BlockDev<D>) -> Result<Self> {
        let config = FsConfig::default();
        let sb = Superblock::load(&mut bdev, config.verify_checksum)?;
        Ok(Self { bdev, sb, config })
    }

    /// 按配置挂载文件系统
    ///
    /// # 参数
    ///
    /// * `device` - 底层设备
    /// * `config` - 挂载配置；`bcache_size` 为 0 时不启用块缓存
    pub fn mount_with_config(device: D, config: FsConfig) -> Result<Self> {
        let mut bdev = BlockDev::new_with_cache(device, config.bcache_size)?;
        let sb = Superblock::load(&mut bdev, config.verify_checksum)?;

        log::debug!(
            "[SB] mounted: block_size={} blocks={} root_nid={} cache={}",
            sb.block_size(),
            sb.blocks(),
            sb.root_nid(),
            config.bcache_size
        );

        Ok(Self { bdev, sb, config })
    }

    /// 获取 superblock 引用
    pub fn superblock(&self) -> &Superblock {
        &self.sb
    }

    /// 挂载配置
    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// 根目录 nid
    pub fn root_nid(&self) -> u64 {
        self.sb.root_nid()
    }

    /// 获取块设备引用
    pub fn block_device(&self) -> &BlockDev<D> {
        &self.bdev
    }

    /// 获取可变块设备引用
    pub fn block_device_mut(&mut self) -> &mut BlockDev<D> {
        &mut self.bdev
    }

    /// 取回块设备
    pub fn into_block_device(self) -> BlockDev<D> {
        self.bdev
    }

    /// 读取 inode
    pub fn read_inode(&mut self, nid: u64) -> Result<Inode> {
        read_inode(&mut self.bdev, &self.sb, nid)
    }

    /// 读取根目录 inode
    pub fn root_inode(&mut self) -> Result<Inode> {
        let nid = self.sb.root_nid();
        self.read_inode(nid)
    }

    /// 创建目录迭代器
    ///
    /// 迭代器不借用文件系统；用 [`ErofsFileSystem::next_entry`] 推进。
    pub fn dir_iter(&self, dir: &Inode) -> Result<DirIterator> {
        DirIterator::new(&self.sb, dir)
    }

    /// 推进目录迭代器
    pub fn next_entry(&mut self, iter: &mut DirIterator) -> Result<Option<DirEntry>> {
        iter.next(&mut self.bdev, &self.sb)
    }

    /// 读取目录中的所有条目
    pub fn read_dir(&mut self, dir: &Inode) -> Result<Vec<DirEntry>> {
        read_dir(&mut self.bdev, &self.sb, dir)
    }

    /// 根据路径查找 inode
    pub fn lookup(&mut self, path: &str) -> Result<Inode> {
        lookup_path(&mut self.bdev, &self.sb, path)
    }

    /// 读取压缩映射头
    pub fn resolve_compression(&mut self, inode: Inode) -> Result<CompressedInode> {
        CompressedInode::resolve(&mut self.bdev, &self.sb, inode)
    }

    /// 遍历压缩文件的物理簇
    pub fn compressed_extents(&mut self, zi: &CompressedInode) -> Result<ExtentMap> {
        zmap::walk_extents(&mut self.bdev, &self.sb, zi)
    }

    /// 计算文件在磁盘上占用的字节数
    ///
    /// 平铺布局直接返回 `i_size`；压缩布局遍历 lcluster 表并恢复最后一个物理簇的长度。
    pub fn occupied_size(&mut self, inode: &Inode) -> Result<u64> {
        if !inode.is_compressed() {
            return Ok(inode.size());
        }
        if inode.size() == 0 {
            return Ok(0);
        }

        let zi = self.resolve_compression(inode.clone())?;
        zmap::occupied_size(&mut self.bdev, &self.sb, &zi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::MemDevice;
    use crate::consts::*;
    use crate::error::ErrorKind;
    use crate::testing::{sample_text, ImageBuilder, InodeSpec, MapHeaderSpec, RawLcluster};

    fn image() -> MemDevice {
        let mut builder = ImageBuilder::new(12);
        let len = builder.put_dir_block(
            10,
            &[
                (32, EROFS_FT_DIR, b"."),
                (32, EROFS_FT_DIR, b".."),
                (40, EROFS_FT_REG_FILE, b"plain"),
                (44, EROFS_FT_REG_FILE, b"packed"),
            ],
        );
        builder.put_inode(32, &InodeSpec::dir(len as u64, 10));
        builder.put_inode(40, &InodeSpec::regular(5000, 11));

        let packed = lz4_flex::block::compress(&sample_text(3000));
        let spec = InodeSpec::compressed(3000, EROFS_INODE_FLAT_COMPRESSION_LEGACY, 1);
        builder.put_full_indexes(
            44,
            &spec,
            MapHeaderSpec::default(),
            &[RawLcluster::Head { clusterofs: 0, blkaddr: 20 }],
        );
        builder.write_at(builder.blk_addr(20), &packed);
        builder.write_at(builder.blk_addr(21) - 1, &[0]);
        builder.build()
    }

    #[test]
    fn test_mount_and_browse() {
        let mut fs = ErofsFileSystem::mount_with_config(image(), FsConfig::default()).unwrap();
        assert_eq!(fs.root_nid(), 32);
        assert!(fs.block_device().has_cache());
        assert_eq!(fs.superblock().volume_name(), Some("test"));

        let root = fs.root_inode().unwrap();
        let entries = fs.read_dir(&root).unwrap();
        assert_eq!(entries.len(), 4);

        let mut iter = fs.dir_iter(&root).unwrap();
        let mut count = 0;
        while fs.next_entry(&mut iter).unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 4);
    }

    #[test]
    fn test_occupied_sizes() {
        let mut fs = ErofsFileSystem::mount(BlockDev::new(image()).unwrap()).unwrap();

        let plain = fs.lookup("/plain").unwrap();
        assert_eq!(fs.occupied_size(&plain).unwrap(), 5000);

        let packed = fs.lookup("/packed").unwrap();
        let expected = lz4_flex::block::compress(&sample_text(3000)).len() as u64;
        assert_eq!(fs.occupied_size(&packed).unwrap(), expected);

        let zi = fs.resolve_compression(packed).unwrap();
        let map = fs.compressed_extents(&zi).unwrap();
        assert_eq!(map.total_blocks(), 1);
    }

    #[test]
    fn test_uncached_mount_and_bad_checksum() {
        let config = FsConfig {
            bcache_size: 0,
            ..FsConfig::default()
        };
        let fs = ErofsFileSystem::mount_with_config(image(), config).unwrap();
        assert!(!fs.block_device().has_cache());

        let mut builder = ImageBuilder::new(12);
        builder.corrupt_checksum();
        let err = ErofsFileSystem::mount_with_config(builder.build(), FsConfig::default())
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Corrupted);

        let mut builder = ImageBuilder::new(12);
        builder.corrupt_checksum();
        let config = FsConfig {
            verify_checksum: false,
            ..FsConfig::default()
        };
        assert!(ErofsFileSystem::mount_with_config(builder.build(), config).is_ok());
    }

    #[test]
    fn test_occupied_size_rejects_unaddressable_size() {
        let mut builder = ImageBuilder::new(12);
        let mut spec = InodeSpec::compressed(u64::MAX, EROFS_INODE_FLAT_COMPRESSION_LEGACY, 1);
        spec.extended = true;
        builder.put_full_indexes(
            40,
            &spec,
            MapHeaderSpec::default(),
            &[RawLcluster::Head { clusterofs: 0, blkaddr: 20 }],
        );
        let mut fs = ErofsFileSystem::mount_with_config(builder.build(), FsConfig::default()).unwrap();
        let inode = fs.read_inode(40).unwrap();
        assert!(fs.occupied_size(&inode).unwrap_err().is_corrupted());
    }
}
