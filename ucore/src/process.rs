/// 进程管理抽象
///
/// 系统调用不通过全局的“当前进程”访问状态，而是由调用者显式传入
/// [`Process`]。

use alloc::sync::Arc;

use crate::fd_table::FdTable;
use crate::memory::UserSpace;

/// 进程控制块（只包含文件子系统关心的部分）
pub struct Process {
    pid: usize,
    fd_table: FdTable,
    aspace: Arc<dyn UserSpace>,
}

impl Process {
    pub fn new(pid: usize, aspace: Arc<dyn UserSpace>) -> Self {
        Self::with_fd_table(pid, aspace, FdTable::new())
    }

    pub fn with_fd_table(pid: usize, aspace: Arc<dyn UserSpace>, fd_table: FdTable) -> Self {
        log::debug!("Process {} created ({} fd slots)", pid, fd_table.capacity());
        Self {
            pid,
            fd_table,
            aspace,
        }
    }

    pub fn pid(&self) -> usize {
        self.pid
    }

    pub fn fd_table(&self) -> &FdTable {
        &self.fd_table
    }

    pub fn aspace(&self) -> &dyn UserSpace {
        self.aspace.as_ref()
    }

    /// 复制进程：子进程的描述符共享父进程的打开文件（包括偏移）。
    ///
    /// 地址空间的复制不在本模块范围内，子进程使用 `aspace`。
    pub fn fork(&self, child_pid: usize, aspace: Arc<dyn UserSpace>) -> Self {
        log::debug!("Process {} forked -> {}", self.pid, child_pid);
        Self::with_fd_table(child_pid, aspace, self.fd_table.fork())
    }

    /// 进程退出时释放所有描述符
    pub fn exit(&self) {
        log::debug!("Process {} exiting", self.pid);
        self.fd_table.close_all();
    }
}
