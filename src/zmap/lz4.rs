//! 末尾物理簇大小恢复使用的编解码器
//!
//! 恢复需要两种 LZ4 块格式操作：
//!
//! - 部分解压：只解出前 `target_len` 字节，忽略之后的数据
//! - 定长压缩：在给定输出预算内压缩尽可能长的输入前缀
//!
//! 部分解压在这里直接实现块格式解码；压缩交给 `lz4_flex`。

use super::header::CompressionAlgorithm;
use crate::{
    consts::*,
    error::{Error, ErrorKind, Result},
};
use alloc::vec::Vec;

/// 物理簇编解码接口
///
/// 每种压缩算法实现一次。目前只有 [`Lz4Codec`]。
pub trait ClusterCodec {
    /// 算法名称（用于日志）
    fn name(&self) -> &'static str;

    /// 部分解压
    ///
    /// # 参数
    ///
    /// * `src` - 原始物理簇数据，末尾可以有无关字节
    /// * `target_len` - 需要解出的字节数
    ///
    /// # 返回
    ///
    /// 恰好 `target_len` 字节的明文；输入不足或格式错误返回 `Corrupted`
    fn decompress_partial(&self, src: &[u8], target_len: usize) -> Result<Vec<u8>>;

    /// 定长压缩
    ///
    /// # 参数
    ///
    /// * `src` - 明文
    /// * `dst_capacity` - 输出预算（字节）
    ///
    /// # 返回
    ///
    /// `(消耗的输入字节数, 产生的输出字节数)`
    fn compress_destsize(&self, src: &[u8], dst_capacity: usize) -> Result<(usize, usize)>;
}

/// LZ4 块格式编解码器
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Codec;

/// 按算法选择编解码器
///
/// # 返回
///
/// 没有实现的算法返回 `Unsupported`
pub fn codec_for(algorithm: CompressionAlgorithm) -> Result<&'static dyn ClusterCodec> {
    match algorithm {
        CompressionAlgorithm::Lz4 => Ok(&Lz4Codec),
        CompressionAlgorithm::Lzma => Err(Error::new(
            ErrorKind::Unsupported,
            "LZMA pcluster size recovery is not supported",
        )),
    }
}

/// 读取 LZ4 的扩展长度（连续的 255 字节加最后一个字节）
fn read_ext_len(src: &[u8], ip: &mut usize, mut len: usize) -> Result<usize> {
    loop {
        let b = *src
            .get(*ip)
            .ok_or(Error::new(ErrorKind::Corrupted, "Truncated LZ4 length"))?;
        *ip += 1;
        len = len
            .checked_add(b as usize)
            .ok_or(Error::new(ErrorKind::Corrupted, "LZ4 length overflow"))?;
        if b != 255 {
            return Ok(len);
        }
    }
}

fn corrupted(message: &'static str) -> Error {
    Error::new(ErrorKind::Corrupted, message)
}

impl ClusterCodec for Lz4Codec {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn decompress_partial(&self, src: &[u8], target_len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.try_reserve_exact(target_len)?;

        let mut ip = 0usize;
        while out.len() < target_len {
            let token = *src.get(ip).ok_or(corrupted("LZ4 input ended before target length"))?;
            ip += 1;

            // 字面量
            let mut lit_len = (token >> 4) as usize;
            if lit_len == 15 {
                lit_len = read_ext_len(src, &mut ip, lit_len)?;
            }
            let take = core::cmp::min(lit_len, target_len - out.len());
            let lit = src
                .get(ip..ip + take)
                .ok_or(corrupted("LZ4 literals run past input"))?;
            out.extend_from_slice(lit);
            ip += lit_len;
            if out.len() == target_len {
                break;
            }

            // 匹配
            let off = src
                .get(ip..ip + 2)
                .ok_or(corrupted("LZ4 input ended before match offset"))?;
            let offset = u16::from_le_bytes([off[0], off[1]]) as usize;
            ip += 2;
            if offset == 0 || offset > out.len() {
                return Err(corrupted("LZ4 match offset out of range"));
            }

            let mut match_len = (token & 0xf) as usize;
            if match_len == 15 {
                match_len = read_ext_len(src, &mut ip, match_len)?;
            }
            match_len += 4;

            let take = core::cmp::min(match_len, target_len - out.len());
            let start = out.len() - offset;
            // 匹配可以与输出重叠，逐字节复制
            for k in 0..take {
                let b = out[start + k];
                out.push(b);
            }
        }

        log::trace!("[LZ4] partial decode {} -> {} bytes (input used {})", src.len(), out.len(), ip);
        Ok(out)
    }

    fn compress_destsize(&self, src: &[u8], dst_capacity: usize) -> Result<(usize, usize)> {
        let bound = lz4_flex::block::get_maximum_output_size(src.len());
        let mut buf = Vec::new();
        buf.try_reserve_exact(bound)?;
        buf.resize(bound, 0);

        let compress = |len: usize, buf: &mut [u8]| -> Result<usize> {
            lz4_flex::block::compress_into(&src[..len], buf)
                .map_err(|_| Error::new(ErrorKind::InvalidInput, "LZ4 output buffer too small"))
        };

        let full = compress(src.len(), &mut buf)?;
        if full <= dst_capacity {
            return Ok((src.len(), full));
        }

        // 二分查找能放进预算的最长前缀：lo 总是可行，hi 总是不可行
        let empty = compress(0, &mut buf)?;
        if empty > dst_capacity {
            return Ok((0, 0));
        }
        let (mut lo, mut hi) = (0usize, src.len());
        let mut best = (0usize, empty);
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            let n = compress(mid, &mut buf)?;
            if n <= dst_capacity {
                lo = mid;
                best = (mid, n);
            } else {
                hi = mid;
            }
        }

        log::trace!(
            "[LZ4] destsize {} bytes into {}: consumed {} produced {}",
            src.len(),
            dst_capacity,
            best.0,
            best.1
        );
        Ok(best)
    }
}

/// 部分解压时允许的最大输出长度
///
/// 超出 `raw_len * 255` 的长度不可能由 `raw_len` 字节的 LZ4 数据产生
pub fn max_decoded_len(raw_len: usize) -> usize {
    raw_len.saturating_mul(LZ4_MAX_COMPRESSION_RATIO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_text;

    #[test]
    fn test_partial_roundtrip_with_trailing_garbage() {
        let plain = sample_text(3000);
        let mut packed = lz4_flex::block::compress(&plain);
        let clen = packed.len();
        packed.extend_from_slice(&[0xAA; 500]);

        let out = Lz4Codec.decompress_partial(&packed, plain.len()).unwrap();
        assert_eq!(out, plain);

        // 只要前缀
        let prefix = Lz4Codec.decompress_partial(&packed[..clen], 1234).unwrap();
        assert_eq!(&prefix[..], &plain[..1234]);
    }

    #[test]
    fn test_partial_short_input_is_corrupted() {
        let plain = sample_text(2000);
        let packed = lz4_flex::block::compress(&plain);
        let err = Lz4Codec.decompress_partial(&packed, plain.len() + 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupted);

        let err = Lz4Codec.decompress_partial(&packed[..packed.len() / 2], plain.len()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
    }

    #[test]
    fn test_partial_bad_offset_is_corrupted() {
        // token: 1 个字面量 + 匹配，偏移 5 超出已有输出
        let src = [0x10, b'a', 0x05, 0x00];
        let err = Lz4Codec.decompress_partial(&src, 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupted);

        let zero = [0x10, b'a', 0x00, 0x00];
        assert!(Lz4Codec.decompress_partial(&zero, 10).is_err());
    }

    #[test]
    fn test_partial_overlapping_match() {
        // 字面量 "ab"，随后偏移 2 长度 6 的匹配
        let src = [0x22, b'a', b'b', 0x02, 0x00];
        let out = Lz4Codec.decompress_partial(&src, 8).unwrap();
        assert_eq!(&out[..], b"abababab");
    }

    #[test]
    fn test_destsize_fits_whole_input() {
        let plain = sample_text(4000);
        let expected = lz4_flex::block::compress(&plain).len();
        let (consumed, produced) = Lz4Codec.compress_destsize(&plain, Z_EROFS_PCLUSTER_MAX_SIZE).unwrap();
        assert_eq!(consumed, plain.len());
        assert_eq!(produced, expected);
    }

    #[test]
    fn test_destsize_respects_budget() {
        let plain: Vec<u8> = (0..5000u32).map(|i| (i.wrapping_mul(2654435761) >> 13) as u8).collect();
        let (consumed, produced) = Lz4Codec.compress_destsize(&plain, 1000).unwrap();
        assert!(produced <= 1000);
        assert!(consumed < plain.len());
        assert!(consumed > 0);

        // 消耗的前缀确实可以放进预算
        let check = lz4_flex::block::compress(&plain[..consumed]);
        assert_eq!(check.len(), produced);
    }

    #[test]
    fn test_recompressed_length_not_larger() {
        let plain = sample_text(4096);
        let packed = lz4_flex::block::compress(&plain);
        let mut raw = packed.clone();
        raw.resize(4096, 0);

        let decoded = Lz4Codec.decompress_partial(&raw, plain.len()).unwrap();
        let (_, produced) = Lz4Codec.compress_destsize(&decoded, raw.len()).unwrap();
        assert!(produced <= packed.len());
    }

    #[test]
    fn test_codec_selection() {
        assert_eq!(codec_for(CompressionAlgorithm::Lz4).unwrap().name(), "lz4");
        let err = codec_for(CompressionAlgorithm::Lzma).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert_eq!(max_decoded_len(4096), 4096 * 255);
    }
}
