/// sys_meld - 把两个文件按块交错合并到一个新文件

use alloc::vec::Vec;

use axerrno::LinuxResult;
use axio::Write;
use ucore::{FdTable, UserPtr};
use uvfs::{OpenFile, OpenFlags};

use super::SyscallContext;
use crate::utils::copy_in_path;

/// 每次从一个源文件取出的字节数
pub const MELD_CHUNK: usize = 4;

/// 新建目标文件的权限位
const MELD_MODE: u32 = 0o664;

/// 合并过程中放入描述符表的文件，任何退出路径都会被关闭
struct MeldFds<'a> {
    table: &'a FdTable,
    fds: Vec<usize>,
}

impl<'a> MeldFds<'a> {
    fn new(table: &'a FdTable) -> Self {
        Self {
            table,
            fds: Vec::with_capacity(3),
        }
    }

    fn open(&mut self, ctx: &SyscallContext<'_>, path: &str, flags: OpenFlags) -> LinuxResult<usize> {
        let file = OpenFile::open(ctx.vfs(), path, flags, MELD_MODE)?;
        let fd = self.table.place(file)?;
        self.fds.push(fd);
        Ok(fd)
    }

    /// 正常结束时关闭全部描述符，返回遇到的第一个错误
    fn finish(mut self) -> LinuxResult {
        let mut result = Ok(());
        for fd in self.fds.drain(..) {
            let closed = self.table.close(fd);
            if result.is_ok() {
                result = closed;
            }
        }
        result
    }
}

impl Drop for MeldFds<'_> {
    fn drop(&mut self) {
        for fd in self.fds.drain(..) {
            if let Err(e) = self.table.close(fd) {
                log::warn!("sys_meld: cleanup close(fd={}) failed: {:?}", fd, e);
            }
        }
    }
}

pub fn sys_meld(
    ctx: &SyscallContext<'_>,
    upath1: UserPtr,
    upath2: UserPtr,
    upath3: UserPtr,
) -> LinuxResult<usize> {
    let path1 = copy_in_path(ctx.aspace(), upath1)?;
    let path2 = copy_in_path(ctx.aspace(), upath2)?;
    let path3 = copy_in_path(ctx.aspace(), upath3)?;
    log::debug!("sys_meld: {} + {} -> {}", path1, path2, path3);

    let table = ctx.fd_table();
    let mut fds = MeldFds::new(table);
    let fd1 = fds.open(ctx, &path1, OpenFlags::RDWR)?;
    let fd2 = fds.open(ctx, &path2, OpenFlags::RDWR)?;
    let fd3 = fds.open(ctx, &path3, OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::EXCL)?;

    let src1 = table.get(fd1)?;
    let src2 = table.get(fd2)?;
    let dst = table.get(fd3)?;

    // 每轮从两个源各取一块，进度按单块计，达到总长度一半时结束
    let half = (src1.stat()?.size + src2.stat()?.size) / 2;
    let mut buf1 = [0u8; MELD_CHUNK];
    let mut buf2 = [0u8; MELD_CHUNK];
    let mut progress = 0u64;
    while progress < half {
        let n1 = src1.lock().read_at_offset(&mut buf1)?;
        let n2 = src2.lock().read_at_offset(&mut buf2)?;

        let mut out = dst.lock();
        out.write_all(&buf1[..n1])?;
        out.write_all(&buf2[..n2])?;
        drop(out);

        progress += MELD_CHUNK as u64;
    }

    let written = dst.lock().offset() as usize;
    log::trace!("sys_meld: wrote {} bytes to {}", written, path3);

    drop((src1, src2, dst));
    fds.finish()?;
    Ok(written)
}
