//! 集成测试公共设施：一个进程 + 一个内存文件系统

#![allow(dead_code)]

use std::sync::Arc;

use axerrno::LinuxResult;
use uapi::syscall::{self, SyscallContext};
use ucore::{FdTable, Process, UserPtr, UserRegion};
use uvfs::RamFs;

pub const USER_BASE: usize = 0x1000_0000;

pub struct Sandbox {
    pub fs: Arc<RamFs>,
    pub mem: Arc<UserRegion>,
    pub process: Process,
}

impl Sandbox {
    pub fn new() -> Self {
        Self::with_capacity(ucore::config::MAX_FDS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mem = Arc::new(UserRegion::new(USER_BASE, 1 << 20));
        let process = Process::with_fd_table(1, mem.clone(), FdTable::with_capacity(capacity));
        Self {
            fs: Arc::new(RamFs::new()),
            mem,
            process,
        }
    }

    pub fn ctx(&self) -> SyscallContext<'_> {
        SyscallContext::new(&self.process, self.fs.as_ref())
    }

    pub fn path(&self, path: &str) -> UserPtr {
        self.mem.push_str(path).unwrap()
    }

    pub fn open(&self, path: &str, flags: u32) -> LinuxResult<usize> {
        syscall::sys_open(&self.ctx(), self.path(path), flags, 0o664)
    }

    pub fn write(&self, fd: usize, data: &[u8]) -> LinuxResult<usize> {
        let ubuf = self.mem.push_bytes(data).unwrap();
        syscall::sys_write(&self.ctx(), fd, ubuf, data.len())
    }

    pub fn read(&self, fd: usize, len: usize) -> LinuxResult<Vec<u8>> {
        let ubuf = self.mem.alloc(len).unwrap();
        let n = syscall::sys_read(&self.ctx(), fd, ubuf, len)?;
        Ok(self.mem.read_bytes(ubuf, n).unwrap())
    }

    pub fn close(&self, fd: usize) -> LinuxResult {
        syscall::sys_close(&self.ctx(), fd)
    }

    pub fn meld(&self, p1: &str, p2: &str, p3: &str) -> LinuxResult<usize> {
        syscall::sys_meld(&self.ctx(), self.path(p1), self.path(p2), self.path(p3))
    }
}
