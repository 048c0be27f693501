//! 块设备抽象
//!
//! 提供只读块设备接口和字节级读取。
//! block/device.rs 定义设备 trait 与 BlockDev 包装器（计数、可选缓存）
//!
//! block/io.rs 提供按字节偏移读取的接口：元数据读取经过 LRU 缓存，
//! 大块原始数据（物理簇）直接读设备，不污染缓存
//!
//! block/mem.rs 与 block/file.rs 提供内存镜像和文件镜像两种设备

mod device;
mod io;
mod mem;
#[cfg(all(feature = "std", unix))]
mod file;

pub use device::{BlockDevice, BlockDev};
pub use mem::MemDevice;
#[cfg(all(feature = "std", unix))]
pub use file::FileDevice;
