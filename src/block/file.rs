//! 文件镜像设备（std + unix）

use super::BlockDevice;
use crate::error::{Error, ErrorKind, Result};
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::Path;

/// 基于 `std::fs::File` 的只读设备
///
/// 每次读取都使用 `read_at` 指定偏移，不依赖共享的文件游标。
#[derive(Debug)]
pub struct FileDevice {
    file: File,
    len: u64,
    block_size: u32,
}

impl FileDevice {
    /// 以只读方式打开镜像文件
    ///
    /// # 参数
    ///
    /// * `path` - 镜像路径
    /// * `block_size` - 读取粒度（2 的幂）
    pub fn open<P: AsRef<Path>>(path: P, block_size: u32) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_file(file, block_size)
    }

    /// 从已打开的文件创建
    pub fn from_file(file: File, block_size: u32) -> Result<Self> {
        let len = file.metadata()?.len();
        log::debug!("[SB] image file length {} bytes", len);
        Ok(Self {
            file,
            len,
            block_size,
        })
    }
}

impl BlockDevice for FileDevice {
    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn total_blocks(&self) -> u64 {
        let bs = self.block_size as u64;
        (self.len + bs - 1) / bs
    }

    fn size(&self) -> u64 {
        self.len
    }

    fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
        let bs = self.block_size as u64;
        let len = count as usize * bs as usize;
        let start = lba
            .checked_mul(bs)
            .ok_or(Error::new(ErrorKind::Io, "Block address out of range"))?;

        if start >= self.len || buf.len() < len {
            return Err(Error::new(ErrorKind::Io, "Read beyond end of image"));
        }

        let avail = core::cmp::min(len as u64, self.len - start) as usize;
        self.file.read_exact_at(&mut buf[..avail], start)?;
        buf[avail..len].fill(0);
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_device_reads_at_offset() {
        let path = std::env::temp_dir().join("erofs_core_file_device_test.img");
        {
            let mut f = File::create(&path).unwrap();
            let data: std::vec::Vec<u8> = (0..1500u32).map(|i| (i % 256) as u8).collect();
            f.write_all(&data).unwrap();
        }

        let mut dev = FileDevice::open(&path, 512).unwrap();
        assert_eq!(dev.total_blocks(), 3);

        let mut buf = [0u8; 512];
        dev.read_blocks(2, 1, &mut buf).unwrap();
        assert_eq!(buf[0], (1024 % 256) as u8);
        assert!(buf[1500 - 1024..].iter().all(|&b| b == 0));

        std::fs::remove_file(&path).unwrap();
    }
}
