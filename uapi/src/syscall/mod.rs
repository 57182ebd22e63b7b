/// 系统调用入口与分发

mod fs;
mod meld;

pub use fs::{
    sys_close, sys_dup2, sys_fstat, sys_lseek, sys_open, sys_read, sys_write, Stat, SEEK_CUR,
    SEEK_END, SEEK_SET, STAT_SIZE,
};
pub use meld::{sys_meld, MELD_CHUNK};

use axerrno::{LinuxError, LinuxResult};
use ucore::{FdTable, Process, UserSpace};
use uvfs::VfsOps;

use crate::to_errno;

// 系统调用号定义
pub const SYS_DUP2: usize = 24;
pub const SYS_OPEN: usize = 56;
pub const SYS_CLOSE: usize = 57;
pub const SYS_LSEEK: usize = 62;
pub const SYS_READ: usize = 63;
pub const SYS_WRITE: usize = 64;
pub const SYS_FSTAT: usize = 80;
pub const SYS_MELD: usize = 253; // 自定义系统调用

/// 一次系统调用的执行上下文：调用进程和它所使用的文件系统
pub struct SyscallContext<'a> {
    process: &'a Process,
    vfs: &'a dyn VfsOps,
}

impl<'a> SyscallContext<'a> {
    pub fn new(process: &'a Process, vfs: &'a dyn VfsOps) -> Self {
        Self { process, vfs }
    }

    pub fn process(&self) -> &'a Process {
        self.process
    }

    pub fn fd_table(&self) -> &'a FdTable {
        self.process.fd_table()
    }

    pub fn aspace(&self) -> &'a dyn UserSpace {
        self.process.aspace()
    }

    pub fn vfs(&self) -> &'a dyn VfsOps {
        self.vfs
    }
}

/// 系统调用处理函数：按调用号分发，失败返回负的 errno
pub fn dispatch(ctx: &SyscallContext<'_>, sysno: usize, args: [usize; 6]) -> isize {
    let ret = match sysno {
        SYS_OPEN => arg_u32(args[1]).and_then(|flags| {
            let mode = arg_u32(args[2])?;
            sys_open(ctx, args[0].into(), flags, mode)
        }),
        SYS_READ => sys_read(ctx, args[0], args[1].into(), args[2]),
        SYS_WRITE => sys_write(ctx, args[0], args[1].into(), args[2]),
        SYS_CLOSE => sys_close(ctx, args[0]).map(|_| 0),
        SYS_LSEEK => sys_lseek(ctx, args[0], args[1] as isize as i64, args[2]),
        SYS_DUP2 => sys_dup2(ctx, args[0], args[1]),
        SYS_FSTAT => sys_fstat(ctx, args[0], args[1].into()).map(|_| 0),
        SYS_MELD => sys_meld(ctx, args[0].into(), args[1].into(), args[2].into()),
        _ => {
            log::warn!("Unknown syscall: {}", sysno);
            Err(LinuxError::ENOSYS)
        }
    };
    if let Err(e) = ret {
        log::debug!(
            "syscall {} failed for pid {}: {:?}",
            sysno,
            ctx.process().pid(),
            e
        );
    }
    to_errno(ret)
}

/// 32 位参数的高位必须为零
fn arg_u32(arg: usize) -> LinuxResult<u32> {
    u32::try_from(arg).map_err(|_| LinuxError::EINVAL)
}
