//! 字节级读取实现

use super::device::read_exact_blocks;
use super::{BlockDev, BlockDevice};
use crate::error::{Error, ErrorKind, Result};
use alloc::vec::Vec;

impl<D: BlockDevice> BlockDev<D> {
    /// 从任意字节偏移读取
    ///
    /// 如果启用了缓存，按块经过缓存读取；否则直接从设备读取。
    ///
    /// # 参数
    ///
    /// * `offset` - 镜像内的字节偏移
    /// * `buf` - 目标缓冲区，读取 `buf.len()` 字节
    ///
    /// # 返回
    ///
    /// 读取范围超出设备末尾时返回 `Io` 错误
    pub fn read_bytes(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.check_range(offset, buf.len())?;
        self.read_count += 1;

        if buf.is_empty() {
            return Ok(());
        }

        if self.bcache.is_none() {
            return self.read_range(offset, buf);
        }

        let block_size = self.block_size() as u64;
        let mut done = 0usize;

        while done < buf.len() {
            let pos = offset + done as u64;
            let lba = pos / block_size;
            let in_block = (pos % block_size) as usize;
            let n = core::cmp::min(block_size as usize - in_block, buf.len() - done);

            let data = self.cached_block(lba)?;
            buf[done..done + n].copy_from_slice(&data[in_block..in_block + n]);
            done += n;
        }

        Ok(())
    }

    /// 绕过缓存直接读取
    ///
    /// 用于一次性读取的大块数据（例如末尾物理簇），避免挤出缓存中的元数据块。
    ///
    /// # 参数
    ///
    /// * `offset` - 镜像内的字节偏移
    /// * `buf` - 目标缓冲区
    pub fn read_bytes_direct(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.check_range(offset, buf.len())?;
        self.read_count += 1;

        if buf.is_empty() {
            return Ok(());
        }

        self.read_range(offset, buf)
    }

    /// 按块对齐读取一段范围，再拷贝出需要的部分
    fn read_range(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let block_size = self.block_size() as u64;
        let start_lba = offset / block_size;
        let end = offset + buf.len() as u64;
        let end_lba = (end + block_size - 1) / block_size;
        let count = u32::try_from(end_lba - start_lba)
            .map_err(|_| Error::new(ErrorKind::InvalidInput, "Read range too large"))?;

        let head = (offset - start_lba * block_size) as usize;
        if head == 0 && buf.len() as u64 == count as u64 * block_size {
            return self.read_device_blocks(start_lba, count, buf);
        }

        let mut tmp = Vec::new();
        tmp.try_reserve_exact(count as usize * block_size as usize)?;
        tmp.resize(count as usize * block_size as usize, 0);
        self.read_device_blocks(start_lba, count, &mut tmp)?;
        buf.copy_from_slice(&tmp[head..head + buf.len()]);
        Ok(())
    }

    /// 获取缓存中的块，未命中时从设备读入
    fn cached_block(&mut self, lba: u64) -> Result<&[u8]> {
        let block_size = self.block_size() as usize;
        let cache = self
            .bcache
            .as_mut()
            .ok_or(Error::new(ErrorKind::InvalidInput, "Block cache not enabled"))?;

        if !cache.touch(lba) {
            let mut data = Vec::new();
            data.try_reserve_exact(block_size)?;
            data.resize(block_size, 0);
            self.physical_read_count += 1;
            read_exact_blocks(&mut self.device, lba, 1, &mut data)?;
            cache.insert(lba, data);
        }

        cache
            .peek(lba)
            .ok_or(Error::new(ErrorKind::Io, "Block evicted before use"))
    }
}
