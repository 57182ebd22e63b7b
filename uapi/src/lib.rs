#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod syscall;
pub mod utils;

use axerrno::LinuxResult;

pub use syscall::{dispatch, SyscallContext};

/// 系统调用初始化
pub fn init() {
    log::info!("Initializing unfound UAPI...");
    ucore::init();
    uvfs::init();
}

/// 系统调用错误码转换：成功返回值本身，失败返回负的 errno
pub fn to_errno(result: LinuxResult<usize>) -> isize {
    match result {
        Ok(v) => v as isize,
        Err(e) => -(e.code() as isize),
    }
}
