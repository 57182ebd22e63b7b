/// 文件相关系统调用实现

use alloc::vec;

use axerrno::{LinuxError, LinuxResult};
use axio::{Seek, SeekFrom};
use ucore::UserPtr;
use uvfs::{NodeStat, OpenFile};

use super::SyscallContext;
use crate::utils::{copy_in_path, parse_flags};

pub const SEEK_SET: usize = 0;
pub const SEEK_CUR: usize = 1;
pub const SEEK_END: usize = 2;

/// [`Stat`] 在用户内存中的字节数
pub const STAT_SIZE: usize = 24;

/// 拷贝给用户的文件状态
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub st_ino: u64,
    pub st_mode: u32,
    pub st_pad: u32,
    pub st_size: u64,
}

impl Stat {
    pub fn to_bytes(&self) -> [u8; STAT_SIZE] {
        let mut buf = [0u8; STAT_SIZE];
        buf[0..8].copy_from_slice(&self.st_ino.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.st_mode.to_ne_bytes());
        buf[12..16].copy_from_slice(&self.st_pad.to_ne_bytes());
        buf[16..24].copy_from_slice(&self.st_size.to_ne_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; STAT_SIZE]) -> Self {
        let u64_at = |i: usize| u64::from_ne_bytes(buf[i..i + 8].try_into().unwrap_or_default());
        let u32_at = |i: usize| u32::from_ne_bytes(buf[i..i + 4].try_into().unwrap_or_default());
        Self {
            st_ino: u64_at(0),
            st_mode: u32_at(8),
            st_pad: u32_at(12),
            st_size: u64_at(16),
        }
    }
}

impl From<NodeStat> for Stat {
    fn from(st: NodeStat) -> Self {
        Self {
            st_ino: st.ino,
            st_mode: st.mode,
            st_pad: 0,
            st_size: st.size,
        }
    }
}

/// sys_open - 打开文件，返回编号最小的空闲描述符
pub fn sys_open(ctx: &SyscallContext<'_>, upath: UserPtr, flags: u32, mode: u32) -> LinuxResult<usize> {
    let path = copy_in_path(ctx.aspace(), upath)?;
    let flags = parse_flags(flags)?;
    log::debug!("sys_open: path={}, flags={:?}, mode={:#o}", path, flags, mode);

    let file = OpenFile::open(ctx.vfs(), &path, flags, mode)?;
    // place 失败时会释放这个新对象的引用
    ctx.fd_table().place(file)
}

/// sys_read - 读取文件
pub fn sys_read(ctx: &SyscallContext<'_>, fd: usize, ubuf: UserPtr, len: usize) -> LinuxResult<usize> {
    log::trace!("sys_read: fd={}, buf={:?}, len={}", fd, ubuf, len);
    let file = ctx.fd_table().get(fd)?;
    ctx.aspace().check_range(ubuf, len)?;

    let mut kbuf = vec![0u8; len];
    let n = file.lock().read_at_offset(&mut kbuf)?;
    ctx.aspace().copy_out(ubuf, &kbuf[..n])?;
    Ok(n)
}

/// sys_write - 写入文件
pub fn sys_write(ctx: &SyscallContext<'_>, fd: usize, ubuf: UserPtr, len: usize) -> LinuxResult<usize> {
    log::trace!("sys_write: fd={}, buf={:?}, len={}", fd, ubuf, len);
    let file = ctx.fd_table().get(fd)?;
    ctx.aspace().check_range(ubuf, len)?;

    let mut kbuf = vec![0u8; len];
    ctx.aspace().copy_in(ubuf, &mut kbuf)?;
    let n = file.lock().write_at_offset(&kbuf)?;
    Ok(n)
}

/// sys_close - 关闭文件
pub fn sys_close(ctx: &SyscallContext<'_>, fd: usize) -> LinuxResult {
    log::debug!("sys_close: fd={}", fd);
    ctx.fd_table().close(fd)
}

/// sys_lseek - 重新定位偏移，返回新的偏移
pub fn sys_lseek(ctx: &SyscallContext<'_>, fd: usize, offset: i64, whence: usize) -> LinuxResult<usize> {
    log::trace!("sys_lseek: fd={}, offset={}, whence={}", fd, offset, whence);
    let pos = match whence {
        SEEK_SET => SeekFrom::Start(u64::try_from(offset).map_err(|_| LinuxError::EINVAL)?),
        SEEK_CUR => SeekFrom::Current(offset),
        SEEK_END => SeekFrom::End(offset),
        _ => return Err(LinuxError::EINVAL),
    };
    let file = ctx.fd_table().get(fd)?;
    let new = file.lock().seek(pos)?;
    usize::try_from(new).map_err(|_| LinuxError::EOVERFLOW)
}

/// sys_dup2 - 让 `newfd` 指向 `oldfd` 的打开文件
pub fn sys_dup2(ctx: &SyscallContext<'_>, oldfd: usize, newfd: usize) -> LinuxResult<usize> {
    log::debug!("sys_dup2: oldfd={}, newfd={}", oldfd, newfd);
    let table = ctx.fd_table();
    if !table.is_valid(newfd) {
        return Err(LinuxError::EBADF);
    }
    let file = table.get(oldfd)?;
    if oldfd == newfd {
        return Ok(newfd);
    }
    if let Some(prev) = table.replace_at(newfd, Some(file.share())) {
        prev.decref();
    }
    Ok(newfd)
}

/// sys_fstat - 获取文件状态
pub fn sys_fstat(ctx: &SyscallContext<'_>, fd: usize, ustat: UserPtr) -> LinuxResult {
    log::trace!("sys_fstat: fd={}, statbuf={:?}", fd, ustat);
    let file = ctx.fd_table().get(fd)?;
    let stat = Stat::from(file.stat()?);
    ctx.aspace().copy_out(ustat, &stat.to_bytes())
}
