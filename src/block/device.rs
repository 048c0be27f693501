//! 块设备核心类型

use crate::error::{Error, ErrorKind, Result};

/// 块设备接口
///
/// 实现此 trait 以提供底层镜像的只读访问。
///
/// # 示例
///
/// ```rust,ignore
/// use erofs_core::{BlockDevice, Result};
///
/// struct MyDevice {
///     // ...
/// }
///
/// impl BlockDevice for MyDevice {
///     fn block_size(&self) -> u32 {
///         4096
///     }
///
///     fn total_blocks(&self) -> u64 {
///         1000
///     }
///
///     fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
///         // 实现块读取
///         Ok(count as usize * self.block_size() as usize)
///     }
/// }
/// ```
pub trait BlockDevice {
    /// 设备读取粒度（字节）
    fn block_size(&self) -> u32;

    /// 总块数
    fn total_blocks(&self) -> u64;

    /// 设备字节大小
    ///
    /// 默认为 `total_blocks * block_size`，镜像长度不是块大小整数倍时可覆盖
    fn size(&self) -> u64 {
        self.total_blocks() * self.block_size() as u64
    }

    /// 读取块
    ///
    /// # 参数
    ///
    /// * `lba` - 起始块地址（以设备块为单位）
    /// * `count` - 要读取的块数
    /// * `buf` - 目标缓冲区（大小至少为 count * block_size）
    ///
    /// # 返回
    ///
    /// 成功返回实际读取的字节数
    fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize>;

    /// 打开设备
    ///
    /// 默认实现什么都不做，设备可以根据需要覆盖此方法。
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// 关闭设备
    ///
    /// 默认实现什么都不做，设备可以根据需要覆盖此方法。
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// 块设备包装器
///
/// 为 EROFS 解码器提供字节级只读访问，包含统计信息和可选的块缓存。
///
/// # 并发使用
///
/// BlockDev 本身不包含内部锁，整个解码过程是单线程顺序读取。
pub struct BlockDev<D> {
    /// 底层设备
    pub(super) device: D,
    /// 逻辑读取次数（包括缓存命中）
    pub(super) read_count: u64,
    /// 物理读取次数（实际设备操作）
    pub(super) physical_read_count: u64,
    /// 块缓存（可选）
    pub(super) bcache: Option<crate::cache::BlockCache>,
}

impl<D: BlockDevice> BlockDev<D> {
    /// 创建新的块设备包装器（无缓存）
    pub fn new(device: D) -> Result<Self> {
        let block_size = device.block_size();

        if block_size == 0 || !block_size.is_power_of_two() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Device block size must be a power of two",
            ));
        }

        Ok(Self {
            device,
            read_count: 0,
            physical_read_count: 0,
            bcache: None,
        })
    }

    /// 创建带缓存的块设备包装器
    ///
    /// # 参数
    ///
    /// * `device` - 底层块设备
    /// * `cache_blocks` - 缓存块数量，为 0 时不启用缓存
    pub fn new_with_cache(device: D, cache_blocks: usize) -> Result<Self> {
        let mut bd = Self::new(device)?;
        let block_size = bd.block_size() as usize;
        bd.bcache = crate::cache::BlockCache::new(cache_blocks, block_size);
        Ok(bd)
    }

    /// 创建使用默认缓存大小的块设备包装器
    pub fn with_default_cache(device: D) -> Result<Self> {
        Self::new_with_cache(device, crate::cache::DEFAULT_CACHE_SIZE)
    }

    /// 获取底层设备的引用
    pub fn device(&self) -> &D {
        &self.device
    }

    /// 获取底层设备的可变引用
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// 取回底层设备
    pub fn into_inner(self) -> D {
        self.device
    }

    /// 获取设备块大小
    pub fn block_size(&self) -> u32 {
        self.device.block_size()
    }

    /// 获取设备字节大小
    pub fn size(&self) -> u64 {
        self.device.size()
    }

    /// 获取逻辑读取次数（包括缓存命中）
    pub fn read_count(&self) -> u64 {
        self.read_count
    }

    /// 获取物理读取次数（实际设备操作）
    pub fn physical_read_count(&self) -> u64 {
        self.physical_read_count
    }

    /// 检查是否启用了缓存
    pub fn has_cache(&self) -> bool {
        self.bcache.is_some()
    }

    /// 获取缓存统计信息
    pub fn cache_stats(&self) -> Option<crate::cache::CacheStats> {
        self.bcache.as_ref().map(|cache| cache.stats())
    }

    /// 打开底层设备
    pub fn open(&mut self) -> Result<()> {
        self.device.open()
    }

    /// 关闭底层设备
    pub fn close(&mut self) -> Result<()> {
        if let Some(cache) = &mut self.bcache {
            cache.clear();
        }
        self.device.close()
    }

    // 内部辅助方法

    /// 检查读取范围是否在设备内
    pub(super) fn check_range(&self, offset: u64, len: usize) -> Result<()> {
        let end = offset
            .checked_add(len as u64)
            .ok_or(Error::new(ErrorKind::Io, "Read range overflows"))?;
        if end > self.device.size() {
            return Err(Error::new(ErrorKind::Io, "Read beyond end of device"));
        }
        Ok(())
    }

    /// 从设备读取完整的块，短读视为 I/O 错误
    pub(super) fn read_device_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<()> {
        self.physical_read_count += 1;
        read_exact_blocks(&mut self.device, lba, count, buf)
    }
}

/// 读取完整的块，短读视为 I/O 错误
pub(super) fn read_exact_blocks<D: BlockDevice>(
    device: &mut D,
    lba: u64,
    count: u32,
    buf: &mut [u8],
) -> Result<()> {
    let want = count as usize * device.block_size() as usize;
    if buf.len() < want {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "Buffer too small for requested blocks",
        ));
    }
    let got = device.read_blocks(lba, count, &mut buf[..want])?;
    if got < want {
        return Err(Error::new(ErrorKind::Io, "Short read from device"));
    }
    Ok(())
}
