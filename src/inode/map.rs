//! 平铺数据映射
//!
//! 把 FLAT_PLAIN / FLAT_INLINE inode 的逻辑块转换为镜像中的字节范围。

use super::{DataLayout, Inode};
use crate::{
    error::{Error, ErrorKind, Result},
    superblock::Superblock,
};

/// 一个逻辑块在镜像中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatMapping {
    /// 物理字节偏移
    pub offset: u64,
    /// 有效字节数（不超过块大小）
    pub len: u32,
    /// 是否为内联尾块
    pub inline: bool,
}

/// 映射平铺 inode 的逻辑块
///
/// # 参数
///
/// * `sb` - superblock 引用
/// * `inode` - 平铺布局的 inode
/// * `lblk` - 逻辑块号
///
/// # 返回
///
/// 内联尾块跨越元数据块边界时返回 `Corrupted`，压缩布局返回 `Unsupported`
pub fn map_flat(sb: &Superblock, inode: &Inode, lblk: u64) -> Result<FlatMapping> {
    let bs = sb.block_size() as u64;
    let nblocks = inode.nblocks(sb)?;

    if lblk >= nblocks {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "Logical block beyond end of file",
        ));
    }

    let len = core::cmp::min(bs, inode.size() - lblk * bs) as u32;

    match inode.layout() {
        DataLayout::FlatPlain => {}
        DataLayout::FlatInline => {
            if lblk == nblocks - 1 {
                let offset = inode.inline_data_offset();
                if sb.blkoff(offset) + len as u64 > bs {
                    log::warn!(
                        "[INODE] nid {} inline tail crosses block boundary (offset {}, len {})",
                        inode.nid(),
                        offset,
                        len
                    );
                    return Err(Error::new(
                        ErrorKind::Corrupted,
                        "Inline data crosses metadata block boundary",
                    ));
                }
                return Ok(FlatMapping {
                    offset,
                    len,
                    inline: true,
                });
            }
        }
        DataLayout::CompressedFull | DataLayout::CompressedCompact => {
            return Err(Error::new(
                ErrorKind::Unsupported,
                "Flat mapping of a compressed inode",
            ));
        }
    }

    let blkaddr = inode.raw_blkaddr().ok_or(Error::new(
        ErrorKind::InvalidInput,
        "Inode has no data blocks",
    ))?;

    Ok(FlatMapping {
        offset: sb.blknr_to_addr(blkaddr as u64 + lblk),
        len,
        inline: false,
    })
}
