//! 测试用镜像构造工具
//!
//! 在内存中拼出最小的 EROFS 镜像：superblock、inode、目录块、
//! 完整/紧凑压缩索引。只在 `cfg(test)` 下编译。

use crate::block::MemDevice;
use crate::consts::*;
use crate::crc::erofs_crc32c_parts;
use crate::superblock::checksum::{checksum_len, compute_checksum};
use crate::types::erofs_super_block;
use alloc::vec;
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

/// 测试 inode 描述
#[derive(Debug, Clone)]
pub struct InodeSpec {
    pub extended: bool,
    pub layout: u16,
    pub mode: u16,
    pub size: u64,
    pub i_u: u32,
    pub ino: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    pub ctime: u64,
    pub ctime_nsec: u32,
    pub xattr_icount: u16,
}

impl InodeSpec {
    fn base(mode: u16, size: u64, i_u: u32) -> Self {
        Self {
            extended: false,
            layout: EROFS_INODE_FLAT_PLAIN,
            mode,
            size,
            i_u,
            ino: 1,
            uid: 0,
            gid: 0,
            nlink: 1,
            ctime: 0,
            ctime_nsec: 0,
            xattr_icount: 0,
        }
    }

    /// 普通文件
    pub fn regular(size: u64, blkaddr: u32) -> Self {
        Self::base(S_IFREG | 0o644, size, blkaddr)
    }

    /// 目录
    pub fn dir(size: u64, blkaddr: u32) -> Self {
        let mut spec = Self::base(S_IFDIR | 0o755, size, blkaddr);
        spec.nlink = 2;
        spec
    }

    /// 设备节点 / FIFO / Socket
    pub fn device(mode: u16, rdev: u32) -> Self {
        Self::base(mode, 0, rdev)
    }

    /// 压缩普通文件
    pub fn compressed(size: u64, layout: u16, blocks: u32) -> Self {
        let mut spec = Self::base(S_IFREG | 0o644, size, blocks);
        spec.layout = layout;
        spec
    }

    fn xattr_isize(&self) -> u64 {
        crate::inode::xattr_ibody_size(self.xattr_icount) as u64
    }

    fn core_size(&self) -> u64 {
        if self.extended {
            EROFS_INODE_EXTENDED_SIZE as u64
        } else {
            EROFS_INODE_COMPACT_SIZE as u64
        }
    }

    fn encode(&self) -> Vec<u8> {
        let version = if self.extended {
            EROFS_INODE_LAYOUT_EXTENDED
        } else {
            EROFS_INODE_LAYOUT_COMPACT
        };
        let format = version | (self.layout << EROFS_I_DATALAYOUT_BIT);

        if self.extended {
            let mut b = vec![0u8; EROFS_INODE_EXTENDED_SIZE];
            LittleEndian::write_u16(&mut b[0..], format);
            LittleEndian::write_u16(&mut b[2..], self.xattr_icount);
            LittleEndian::write_u16(&mut b[4..], self.mode);
            LittleEndian::write_u64(&mut b[8..], self.size);
            LittleEndian::write_u32(&mut b[16..], self.i_u);
            LittleEndian::write_u32(&mut b[20..], self.ino);
            LittleEndian::write_u32(&mut b[24..], self.uid);
            LittleEndian::write_u32(&mut b[28..], self.gid);
            LittleEndian::write_u64(&mut b[32..], self.ctime);
            LittleEndian::write_u32(&mut b[40..], self.ctime_nsec);
            LittleEndian::write_u32(&mut b[44..], self.nlink);
            b
        } else {
            let mut b = vec![0u8; EROFS_INODE_COMPACT_SIZE];
            LittleEndian::write_u16(&mut b[0..], format);
            LittleEndian::write_u16(&mut b[2..], self.xattr_icount);
            LittleEndian::write_u16(&mut b[4..], self.mode);
            LittleEndian::write_u16(&mut b[6..], self.nlink as u16);
            LittleEndian::write_u32(&mut b[8..], self.size as u32);
            LittleEndian::write_u32(&mut b[16..], self.i_u);
            LittleEndian::write_u32(&mut b[20..], self.ino);
            LittleEndian::write_u16(&mut b[24..], self.uid as u16);
            LittleEndian::write_u16(&mut b[26..], self.gid as u16);
            b
        }
    }
}

/// 测试用 lcluster 描述
#[derive(Debug, Clone, Copy)]
pub enum RawLcluster {
    Plain { clusterofs: u16, blkaddr: u32 },
    Head { clusterofs: u16, blkaddr: u32 },
    NonHead { delta0: u16, delta1: u16 },
    Raw { advise: u16, clusterofs: u16, union: u32 },
}

impl RawLcluster {
    fn encode_full(&self) -> [u8; 8] {
        let (advise, clusterofs, union) = match *self {
            RawLcluster::Plain { clusterofs, blkaddr } => {
                (Z_EROFS_LCLUSTER_TYPE_PLAIN as u16, clusterofs, blkaddr)
            }
            RawLcluster::Head { clusterofs, blkaddr } => {
                (Z_EROFS_LCLUSTER_TYPE_HEAD as u16, clusterofs, blkaddr)
            }
            RawLcluster::NonHead { delta0, delta1 } => (
                Z_EROFS_LCLUSTER_TYPE_NONHEAD as u16,
                0,
                delta0 as u32 | ((delta1 as u32) << 16),
            ),
            RawLcluster::Raw {
                advise,
                clusterofs,
                union,
            } => (advise, clusterofs, union),
        };
        let mut b = [0u8; 8];
        LittleEndian::write_u16(&mut b[0..], advise);
        LittleEndian::write_u16(&mut b[2..], clusterofs);
        LittleEndian::write_u32(&mut b[4..], union);
        b
    }
}

/// 紧凑索引中的一个条目：类型和低位值
#[derive(Debug, Clone, Copy)]
pub struct CompactEntry {
    pub kind: u8,
    pub lo: u16,
}

impl CompactEntry {
    pub fn head(clusterofs: u16) -> Self {
        Self { kind: Z_EROFS_LCLUSTER_TYPE_HEAD, lo: clusterofs }
    }

    pub fn plain(clusterofs: u16) -> Self {
        Self { kind: Z_EROFS_LCLUSTER_TYPE_PLAIN, lo: clusterofs }
    }

    pub fn nonhead(lo: u16) -> Self {
        Self { kind: Z_EROFS_LCLUSTER_TYPE_NONHEAD, lo }
    }
}

/// 压缩映射头描述
#[derive(Debug, Clone, Copy)]
pub struct MapHeaderSpec {
    pub advise: u16,
    pub algorithmtype: u8,
    pub clusterbits: u8,
}

impl Default for MapHeaderSpec {
    fn default() -> Self {
        Self {
            advise: 0,
            algorithmtype: Z_EROFS_COMPRESSION_LZ4,
            clusterbits: 0,
        }
    }
}

/// 内存镜像构造器
pub struct ImageBuilder {
    sb: erofs_super_block,
    data: Vec<u8>,
    corrupt_checksum: bool,
}

impl ImageBuilder {
    /// 创建给定块大小位数的空镜像
    pub fn new(blkszbits: u8) -> Self {
        let block_size = 1usize << blkszbits;
        let meta_blkaddr = core::cmp::max(1, 2048 >> blkszbits) as u32;
        let mut volume_name = [0u8; 16];
        volume_name[..4].copy_from_slice(b"test");

        let sb = erofs_super_block {
            magic: EROFS_SUPER_MAGIC_V1,
            checksum: 0,
            feature_compat: EROFS_FEATURE_COMPAT_SB_CHKSUM,
            blkszbits,
            reserved: 0,
            root_nid: 32,
            inos: 16,
            build_time: 1_600_000_000,
            build_time_nsec: 7,
            blocks: 1000,
            meta_blkaddr,
            xattr_blkaddr: 0,
            uuid: [0x11; 16],
            volume_name,
            feature_incompat: 0,
            lz4_max_distance: 0,
            extra_devices: 0,
            devt_slotoff: 0,
        };

        Self {
            sb,
            data: vec![0u8; core::cmp::max(8 * block_size, 16 * 1024)],
            corrupt_checksum: false,
        }
    }

    pub fn block_size(&self) -> u32 {
        1u32 << self.sb.blkszbits
    }

    pub fn sb_mut(&mut self) -> &mut erofs_super_block {
        &mut self.sb
    }

    /// 构建时写入错误的校验和
    pub fn corrupt_checksum(&mut self) {
        self.corrupt_checksum = true;
    }

    pub fn iloc(&self, nid: u64) -> u64 {
        ((self.sb.meta_blkaddr as u64) << self.sb.blkszbits) + (nid << EROFS_ISLOTBITS)
    }

    pub fn blk_addr(&self, blkaddr: u32) -> u64 {
        (blkaddr as u64) << self.sb.blkszbits
    }

    /// 在任意偏移写入字节，必要时扩展镜像
    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) {
        let start = offset as usize;
        let end = start + bytes.len();
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(bytes);
    }

    /// 写入 inode，返回 inode 之后（含 xattr）的偏移
    pub fn put_inode(&mut self, nid: u64, spec: &InodeSpec) -> u64 {
        let iloc = self.iloc(nid);
        let raw = spec.encode();
        self.write_at(iloc, &raw);
        iloc + spec.core_size() + spec.xattr_isize()
    }

    /// 写入目录块，返回目录块字节数
    pub fn put_dir_block(&mut self, blkaddr: u32, entries: &[(u64, u8, &[u8])]) -> usize {
        let block = dir_block(entries);
        let offset = self.blk_addr(blkaddr);
        self.write_at(offset, &block);
        block.len()
    }

    fn put_map_header(&mut self, nid: u64, spec: &InodeSpec, header: &MapHeaderSpec) -> u64 {
        let end = self.put_inode(nid, spec);
        let pos = (end + 7) & !7;
        let mut h = [0u8; Z_EROFS_MAP_HEADER_SIZE];
        LittleEndian::write_u16(&mut h[4..], header.advise);
        h[6] = header.algorithmtype;
        h[7] = header.clusterbits;
        self.write_at(pos, &h);
        pos + Z_EROFS_MAP_HEADER_SIZE as u64
    }

    /// 写入完整索引压缩 inode（映射头 + 索引表）
    pub fn put_full_indexes(
        &mut self,
        nid: u64,
        spec: &InodeSpec,
        header: MapHeaderSpec,
        indexes: &[RawLcluster],
    ) {
        let header_end = self.put_map_header(nid, spec, &header);
        let mut pos = header_end + Z_EROFS_LEGACY_HEADER_PADDING;
        for idx in indexes {
            let raw = idx.encode_full();
            self.write_at(pos, &raw);
            pos += Z_EROFS_FULL_INDEX_SIZE as u64;
        }
    }

    /// 写入紧凑索引压缩 inode
    ///
    /// `bases` 按包的顺序给出每个包末尾的起始块地址
    pub fn put_compact_indexes(
        &mut self,
        nid: u64,
        spec: &InodeSpec,
        header: MapHeaderSpec,
        lclusterbits: u8,
        entries: &[CompactEntry],
        bases: &[u32],
    ) {
        let ebase = self.put_map_header(nid, spec, &header);
        let total = entries.len();
        let initial_4b = (((32 - (ebase % 32)) / 4) & 7) as usize;
        let initial_4b = core::cmp::min(initial_4b, total);
        let compacted_2b = if header.advise & 0x1 != 0 && initial_4b < total {
            (total - initial_4b) & !15
        } else {
            0
        };

        let lobits = core::cmp::max(lclusterbits as usize, 12);
        let mut pos = ebase;
        let mut idx = 0usize;
        let mut pack_no = 0usize;

        let mut emit = |builder: &mut Self, pos: &mut u64, chunk: &[CompactEntry], vcnt: usize| {
            let pack_size = if vcnt == 2 { 8 } else { 32 };
            let encodebits = ((pack_size - 4) * 8) / vcnt;
            let mut pack = vec![0u8; pack_size];
            for (i, e) in chunk.iter().enumerate() {
                let v = (e.lo as u32) | ((e.kind as u32) << lobits);
                let bitpos = encodebits * i;
                let byte = bitpos / 8;
                let shift = bitpos % 8;
                let mut word = LittleEndian::read_u32(&pack[byte..byte + 4]);
                word |= v << shift;
                LittleEndian::write_u32(&mut pack[byte..byte + 4], word);
            }
            let base = bases.get(pack_no).copied().unwrap_or(0);
            LittleEndian::write_u32(&mut pack[pack_size - 4..], base);
            builder.write_at(*pos, &pack);
            *pos += pack_size as u64;
            pack_no += 1;
        };

        while idx < initial_4b {
            let end = core::cmp::min(idx + 2, total);
            emit(self, &mut pos, &entries[idx..end], 2);
            idx = end;
        }
        let end_2b = idx + compacted_2b;
        while idx < end_2b {
            emit(self, &mut pos, &entries[idx..idx + 16], 16);
            idx += 16;
        }
        while idx < total {
            let end = core::cmp::min(idx + 2, total);
            emit(self, &mut pos, &entries[idx..end], 2);
            idx = end;
        }
    }

    /// 生成镜像
    pub fn build(mut self) -> MemDevice {
        let block_size = self.block_size();
        let sb_end = EROFS_SUPER_OFFSET as usize + checksum_len(block_size);
        if self.data.len() < sb_end {
            self.data.resize(sb_end, 0);
        }

        let raw = encode_superblock(&self.sb);
        self.write_at(EROFS_SUPER_OFFSET, &raw);

        if self.sb.feature_compat & EROFS_FEATURE_COMPAT_SB_CHKSUM != 0 {
            let start = EROFS_SUPER_OFFSET as usize;
            let mut crc = compute_checksum(&self.data[start..sb_end]);
            if self.corrupt_checksum {
                crc ^= 1;
            }
            LittleEndian::write_u32(&mut self.data[start + EROFS_SUPER_CHECKSUM_OFFSET..], crc);
        }

        MemDevice::new(self.data, core::cmp::min(block_size, 4096))
    }
}

/// 编码一个目录块（不补齐到块大小）
pub fn dir_block(entries: &[(u64, u8, &[u8])]) -> Vec<u8> {
    let names_start = entries.len() * EROFS_DIRENT_SIZE;
    let mut out = vec![0u8; names_start];
    let mut nameoff = names_start;
    for (i, (nid, ft, name)) in entries.iter().enumerate() {
        let h = &mut out[i * EROFS_DIRENT_SIZE..(i + 1) * EROFS_DIRENT_SIZE];
        LittleEndian::write_u64(&mut h[0..], *nid);
        LittleEndian::write_u16(&mut h[8..], nameoff as u16);
        h[10] = *ft;
        nameoff += name.len();
    }
    for (_, _, name) in entries {
        out.extend_from_slice(name);
    }
    out
}

fn encode_superblock(sb: &erofs_super_block) -> [u8; EROFS_SUPER_SIZE] {
    let mut b = [0u8; EROFS_SUPER_SIZE];
    LittleEndian::write_u32(&mut b[0..], sb.magic);
    LittleEndian::write_u32(&mut b[4..], sb.checksum);
    LittleEndian::write_u32(&mut b[8..], sb.feature_compat);
    b[12] = sb.blkszbits;
    b[13] = sb.reserved;
    LittleEndian::write_u16(&mut b[14..], sb.root_nid);
    LittleEndian::write_u64(&mut b[16..], sb.inos);
    LittleEndian::write_u64(&mut b[24..], sb.build_time);
    LittleEndian::write_u32(&mut b[32..], sb.build_time_nsec);
    LittleEndian::write_u32(&mut b[36..], sb.blocks);
    LittleEndian::write_u32(&mut b[40..], sb.meta_blkaddr);
    LittleEndian::write_u32(&mut b[44..], sb.xattr_blkaddr);
    b[48..64].copy_from_slice(&sb.uuid);
    b[64..80].copy_from_slice(&sb.volume_name);
    LittleEndian::write_u32(&mut b[80..], sb.feature_incompat);
    LittleEndian::write_u16(&mut b[84..], sb.lz4_max_distance);
    LittleEndian::write_u16(&mut b[86..], sb.extra_devices);
    LittleEndian::write_u16(&mut b[88..], sb.devt_slotoff);
    b
}

/// 生成可压缩的测试数据
pub fn sample_text(len: usize) -> Vec<u8> {
    let words: [&[u8]; 6] = [b"erofs ", b"lcluster ", b"pcluster ", b"head ", b"plain ", b"nonhead "];
    let mut out = Vec::with_capacity(len);
    let mut i = 0usize;
    while out.len() < len {
        // 混入序号避免数据过于规则
        let w = words[(i * 7 + i / 3) % words.len()];
        out.extend_from_slice(w);
        out.push(b'0' + (i % 10) as u8);
        i += 1;
    }
    out.truncate(len);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_block_layout() {
        let block = dir_block(&[(1, EROFS_FT_DIR, b"."), (2, EROFS_FT_DIR, b"..")]);
        assert_eq!(block.len(), 24 + 3);
        assert_eq!(LittleEndian::read_u16(&block[8..]), 24);
        assert_eq!(LittleEndian::read_u16(&block[20..]), 25);
    }

    #[test]
    fn test_superblock_checksum_written() {
        let dev = ImageBuilder::new(12).build();
        let data = dev.data();
        let start = EROFS_SUPER_OFFSET as usize;
        let stored = LittleEndian::read_u32(&data[start + 4..]);
        let mut copy = data[start..start + 3072].to_vec();
        copy[4..8].fill(0);
        assert_eq!(stored, erofs_crc32c_parts(&[&copy]));
    }
}
