//! CRC32C 校验和计算
//!
//! 为 EROFS superblock 提供 CRC32C 校验和计算功能

use crc::{Crc, CRC_32_ISCSI};

const CASTAGNOLI: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// 计算 EROFS 使用的 CRC32C
///
/// EROFS 以 `!0` 为种子且不做最终取反，
/// 等于标准 CRC32C 结果按位取反。
///
/// # 参数
/// * `data` - 要计算校验和的数据
///
/// # 返回
/// 与磁盘上 `checksum` 字段可比较的值
#[inline]
pub fn erofs_crc32c(data: &[u8]) -> u32 {
    !CASTAGNOLI.checksum(data)
}

/// 对多段连续数据计算 EROFS CRC32C
///
/// 结果等于把各段拼接后调用 [`erofs_crc32c`]
pub fn erofs_crc32c_parts(parts: &[&[u8]]) -> u32 {
    let mut digest = CASTAGNOLI.digest();
    for part in parts {
        digest.update(part);
    }
    !digest.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32c_check_value() {
        // CRC32C("123456789") = 0xE3069283
        assert_eq!(!erofs_crc32c(b"123456789"), 0xE306_9283);
    }

    #[test]
    fn test_crc32c_sensitive_to_input() {
        assert_ne!(erofs_crc32c(b"hello world"), erofs_crc32c(b"hello worle"));
        assert_ne!(erofs_crc32c(b""), 0);
    }

    #[test]
    fn test_crc32c_parts_equals_whole() {
        assert_eq!(
            erofs_crc32c_parts(&[b"1234", b"", b"56789"]),
            erofs_crc32c(b"123456789")
        );
    }
}
