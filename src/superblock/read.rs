//! Superblock 读取和验证

use super::checksum;
use crate::{
    block::{BlockDev, BlockDevice},
    consts::*,
    error::{Error, ErrorKind, Result},
    types::{erofs_super_block, FeatureCompat, FeatureIncompat},
};

/// 从块设备读取 superblock
///
/// # 参数
///
/// * `bdev` - 块设备引用
///
/// # 返回
///
/// 成功返回 superblock 结构，魔数不匹配返回 `Corrupted`
pub fn read_superblock<D: BlockDevice>(bdev: &mut BlockDev<D>) -> Result<erofs_super_block> {
    let mut sb_buf = [0u8; EROFS_SUPER_SIZE];

    // 读取 superblock（从偏移 1024 开始）
    bdev.read_bytes(EROFS_SUPER_OFFSET, &mut sb_buf)?;

    let sb = erofs_super_block::parse(&sb_buf)?;

    if !sb.is_valid() {
        log::error!("[SB] bad magic {:#010x}", sb.magic);
        return Err(Error::new(
            ErrorKind::Corrupted,
            "Invalid EROFS superblock magic number",
        ));
    }

    Ok(sb)
}

/// Superblock 包装器，提供几何信息和特性查询
///
/// 挂载时读取一次，之后只读共享。
#[derive(Debug, Clone)]
pub struct Superblock {
    pub(super) inner: erofs_super_block,
}

impl Superblock {
    /// 从 erofs_super_block 创建 Superblock（主要用于测试）
    pub fn new(inner: erofs_super_block) -> Self {
        Self { inner }
    }

    /// 从块设备加载 superblock
    ///
    /// # 参数
    ///
    /// * `bdev` - 块设备引用
    /// * `verify_checksum` - 设置了 `SB_CHKSUM` 时是否校验 CRC32C
    pub fn load<D: BlockDevice>(bdev: &mut BlockDev<D>, verify_checksum: bool) -> Result<Self> {
        let inner = read_superblock(bdev)?;
        let sb = Self { inner };
        sb.check()?;

        if verify_checksum && sb.has_sb_checksum() {
            checksum::verify_checksum(bdev, &sb)?;
        }

        log::debug!(
            "[SB] block_size={} blocks={} meta_blkaddr={} root_nid={} inos={} compat={:?} incompat={:?}",
            sb.block_size(),
            sb.blocks(),
            sb.meta_blkaddr(),
            sb.root_nid(),
            sb.inos(),
            sb.feature_compat(),
            sb.feature_incompat()
        );

        Ok(sb)
    }

    /// 获取内部 superblock 结构的引用
    pub fn inner(&self) -> &erofs_super_block {
        &self.inner
    }

    /// 块大小位数
    pub fn blkszbits(&self) -> u8 {
        self.inner.blkszbits
    }

    /// 获取块大小
    pub fn block_size(&self) -> u32 {
        1u32 << self.inner.blkszbits
    }

    /// 获取总块数
    pub fn blocks(&self) -> u32 {
        self.inner.blocks
    }

    /// 元数据区起始块
    pub fn meta_blkaddr(&self) -> u32 {
        self.inner.meta_blkaddr
    }

    /// 共享 xattr 区起始块
    pub fn xattr_blkaddr(&self) -> u32 {
        self.inner.xattr_blkaddr
    }

    /// 根目录 nid
    pub fn root_nid(&self) -> u64 {
        self.inner.root_nid as u64
    }

    /// 有效 inode 数
    pub fn inos(&self) -> u64 {
        self.inner.inos
    }

    /// 构建时间（秒）
    pub fn build_time(&self) -> u64 {
        self.inner.build_time
    }

    /// 构建时间（纳秒部分）
    pub fn build_time_nsec(&self) -> u32 {
        self.inner.build_time_nsec
    }

    /// 获取 UUID
    pub fn uuid(&self) -> &[u8; 16] {
        &self.inner.uuid
    }

    /// 获取卷名称
    ///
    /// 卷名为空或不是有效 UTF-8 时返回 `None`
    pub fn volume_name(&self) -> Option<&str> {
        let raw = &self.inner.volume_name;
        let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        if len == 0 {
            return None;
        }
        core::str::from_utf8(&raw[..len]).ok()
    }

    /// LZ4 最大匹配距离
    pub fn lz4_max_distance(&self) -> u16 {
        self.inner.lz4_max_distance
    }

    /// 兼容特性
    pub fn feature_compat(&self) -> FeatureCompat {
        FeatureCompat::from_bits_retain(self.inner.feature_compat)
    }

    /// 不兼容特性
    pub fn feature_incompat(&self) -> FeatureIncompat {
        FeatureIncompat::from_bits_retain(self.inner.feature_incompat)
    }

    /// 检查是否带 superblock 校验和
    pub fn has_sb_checksum(&self) -> bool {
        self.feature_compat().contains(FeatureCompat::SB_CHKSUM)
    }

    /// 检查是否启用 LZ4 零填充
    pub fn has_lz4_0padding(&self) -> bool {
        self.feature_incompat().contains(FeatureIncompat::LZ4_0PADDING)
    }

    /// 检查是否启用大物理簇
    pub fn has_big_pcluster(&self) -> bool {
        self.feature_incompat().contains(FeatureIncompat::BIG_PCLUSTER)
    }

    /// 块号转换为字节偏移
    pub fn blknr_to_addr(&self, blkaddr: u64) -> u64 {
        blkaddr << self.inner.blkszbits
    }

    /// 字节偏移转换为块号
    pub fn addr_to_blknr(&self, addr: u64) -> u64 {
        addr >> self.inner.blkszbits
    }

    /// 字节偏移在块内的偏移
    pub fn blkoff(&self, addr: u64) -> u64 {
        addr & (self.block_size() as u64 - 1)
    }

    /// 计算 nid 对应 inode 的字节偏移
    ///
    /// # 返回
    ///
    /// 偏移超出 64 位范围时返回 `Corrupted`
    pub fn iloc(&self, nid: u64) -> Result<u64> {
        nid.checked_mul(1u64 << EROFS_ISLOTBITS)
            .and_then(|off| off.checked_add(self.blknr_to_addr(self.inner.meta_blkaddr as u64)))
            .ok_or(Error::new(ErrorKind::Corrupted, "Inode nid out of range"))
    }

    /// 检查 superblock 的有效性
    ///
    /// # 返回
    ///
    /// 块大小超出支持范围或使用多设备表时返回 `Unsupported`
    pub fn check(&self) -> Result<()> {
        if !self.inner.is_valid() {
            return Err(Error::new(
                ErrorKind::Corrupted,
                "Invalid EROFS superblock magic number",
            ));
        }

        let bits = self.inner.blkszbits;
        if !(EROFS_MIN_BLOCK_BITS..=EROFS_MAX_BLOCK_BITS).contains(&bits) {
            log::error!("[SB] unsupported blkszbits {}", bits);
            return Err(Error::new(
                ErrorKind::Unsupported,
                "Unsupported block size",
            ));
        }

        if self.feature_incompat().contains(FeatureIncompat::DEVICE_TABLE)
            && self.inner.extra_devices > 0
        {
            return Err(Error::new(
                ErrorKind::Unsupported,
                "Multi-device images are not supported",
            ));
        }

        let known = FeatureIncompat::all().bits();
        let unknown = self.inner.feature_incompat & !known;
        if unknown != 0 {
            log::warn!("[SB] unidentified incompatible features {:#x}", unknown);
        }

        if self.inner.meta_blkaddr != 0 && self.inner.meta_blkaddr >= self.inner.blocks {
            log::warn!(
                "[SB] meta_blkaddr {} outside of {} blocks",
                self.inner.meta_blkaddr,
                self.inner.blocks
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ImageBuilder;

    #[test]
    fn test_load_superblock() {
        let image = ImageBuilder::new(12).build();
        let mut bd = BlockDev::new(image).unwrap();
        let sb = Superblock::load(&mut bd, true).unwrap();

        assert_eq!(sb.block_size(), 4096);
        assert_eq!(sb.blocks(), 1000);
        assert_eq!(sb.root_nid(), 32);
        assert_eq!(sb.iloc(32).unwrap(), sb.blknr_to_addr(sb.meta_blkaddr() as u64) + 32 * 32);
        assert!(sb.has_sb_checksum());
        assert_eq!(sb.volume_name(), Some("test"));
    }

    #[test]
    fn test_bad_magic_is_corrupted() {
        let mut builder = ImageBuilder::new(12);
        builder.sb_mut().magic = 0x1234_5678;
        let mut bd = BlockDev::new(builder.build()).unwrap();
        let err = Superblock::load(&mut bd, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
    }

    #[test]
    fn test_block_size_out_of_range_is_unsupported() {
        let mut builder = ImageBuilder::new(12);
        builder.sb_mut().blkszbits = 20;
        let mut bd = BlockDev::new(builder.build()).unwrap();
        let err = Superblock::load(&mut bd, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_small_block_size() {
        let image = ImageBuilder::new(9).build();
        let mut bd = BlockDev::new(image).unwrap();
        let sb = Superblock::load(&mut bd, true).unwrap();
        assert_eq!(sb.block_size(), 512);
        assert_eq!(sb.blkoff(1000), 1000 - 512);
        assert_eq!(sb.addr_to_blknr(1536), 3);
    }
}
