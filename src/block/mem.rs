//! 内存镜像设备

use super::BlockDevice;
use crate::error::{Error, ErrorKind, Result};
use alloc::vec::Vec;

/// 以 `Vec<u8>` 承载整个镜像的设备
///
/// 镜像长度不必是块大小的整数倍，最后一个不完整的块读取时以零补齐。
#[derive(Debug, Clone)]
pub struct MemDevice {
    data: Vec<u8>,
    block_size: u32,
}

impl MemDevice {
    /// 创建内存设备
    ///
    /// # 参数
    ///
    /// * `data` - 镜像内容
    /// * `block_size` - 读取粒度（2 的幂）
    pub fn new(data: Vec<u8>, block_size: u32) -> Self {
        Self { data, block_size }
    }

    /// 镜像内容
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl BlockDevice for MemDevice {
    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn total_blocks(&self) -> u64 {
        let bs = self.block_size as u64;
        (self.data.len() as u64 + bs - 1) / bs
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
        let bs = self.block_size as usize;
        let len = count as usize * bs;
        let start = usize::try_from(lba)
            .ok()
            .and_then(|lba| lba.checked_mul(bs))
            .ok_or(Error::new(ErrorKind::Io, "Block address out of range"))?;

        if start >= self.data.len() || buf.len() < len {
            return Err(Error::new(ErrorKind::Io, "Read beyond end of image"));
        }

        let end = core::cmp::min(start + len, self.data.len());
        let avail = end - start;
        buf[..avail].copy_from_slice(&self.data[start..end]);
        buf[avail..len].fill(0);
        Ok(len)
    }
}
