//! Superblock 校验和计算
//!
//! 校验范围从偏移 1024 开始，计算时 checksum 字段按零处理。
//! 块大于 1024 字节时长度为 `block_size - 1024`，否则为整块。

use super::Superblock;
use crate::{
    block::{BlockDev, BlockDevice},
    consts::*,
    crc::{erofs_crc32c, erofs_crc32c_parts},
    error::{Error, ErrorKind, Result},
};
use alloc::vec::Vec;

/// 校验范围长度
pub fn checksum_len(block_size: u32) -> usize {
    let bs = block_size as usize;
    if bs > EROFS_SUPER_OFFSET as usize {
        bs - EROFS_SUPER_OFFSET as usize
    } else {
        bs
    }
}

/// 计算 superblock 的 CRC32C 校验和
///
/// # 参数
///
/// * `data` - 从偏移 1024 开始的校验范围
///
/// # 返回
///
/// 32 位校验和
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut tmp = [0u8; EROFS_SUPER_SIZE];
    let head = core::cmp::min(data.len(), EROFS_SUPER_SIZE);
    tmp[..head].copy_from_slice(&data[..head]);
    tmp[EROFS_SUPER_CHECKSUM_OFFSET..EROFS_SUPER_CHECKSUM_OFFSET + 4].fill(0);

    // 先计算清零后的头部，再接上剩余部分
    erofs_crc32c_parts(&[&tmp[..head], &data[head..]])
}

/// 从设备读取校验范围并验证
///
/// # 返回
///
/// 校验和不匹配返回 `Corrupted`
pub fn verify_checksum<D: BlockDevice>(bdev: &mut BlockDev<D>, sb: &Superblock) -> Result<()> {
    let len = checksum_len(sb.block_size());
    let mut data = Vec::new();
    data.try_reserve_exact(len)?;
    data.resize(len, 0);
    bdev.read_bytes(EROFS_SUPER_OFFSET, &mut data)?;

    let computed = compute_checksum(&data);
    let stored = sb.inner().checksum;
    if computed != stored {
        log::error!(
            "[SB] checksum mismatch: stored {:#010x}, computed {:#010x}",
            stored,
            computed
        );
        return Err(Error::new(
            ErrorKind::Corrupted,
            "Superblock checksum mismatch",
        ));
    }

    Ok(())
}
