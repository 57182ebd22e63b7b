#![cfg_attr(not(test), no_std)]
//! UVFS - VFS 适配层
//!
//! 本模块定义文件描述符子系统与具体文件系统之间的契约：
//! - [`VfsOps`] / [`VfsNode`]: 路径解析与字节区间读写
//! - [`OpenFile`]: 带引用计数和偏移锁的打开文件对象
//! - [`RamFs`]: 内存文件系统，用于测试和模拟

extern crate alloc;

mod file_wrapper;
mod flags;
mod ramfs;
mod vfs_ops;

pub use file_wrapper::{OffsetGuard, OpenFile};
pub use flags::{AccessMode, OpenFlags, O_ACCMODE, O_RDONLY, O_RDWR, O_WRONLY};
pub use ramfs::{RamFile, RamFs, RAMFS_MAX_FILE_SIZE};
pub use vfs_ops::{NodeStat, VfsNode, VfsNodeRef, VfsOps};

/// 初始化 VFS 适配层
pub fn init() {
    log::info!("Initializing UVFS adapter...");
}
