#![cfg_attr(not(test), no_std)]
//! 核心抽象层：文件描述符表、进程上下文与用户内存拷贝

extern crate alloc;

pub mod config;
pub mod fd_table;
pub mod memory;
pub mod process;

pub use fd_table::{FdTable, FileRef};
pub use memory::{UserPtr, UserRegion, UserSpace};
pub use process::Process;

/// 核心抽象层初始化
pub fn init() {
    log::info!(
        "Initializing unfound core abstractions (MAX_FDS={}, PATH_MAX={})...",
        config::MAX_FDS,
        config::PATH_MAX
    );
}
