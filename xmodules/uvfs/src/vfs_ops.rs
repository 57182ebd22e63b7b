/// VFS 操作抽象层
///
/// 文件描述符子系统只通过这里的两个 trait 访问具体文件系统。

use alloc::sync::Arc;
use axerrno::AxResult;

use crate::OpenFlags;

/// 节点属性（`stat` 的结果）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStat {
    /// Inode number.
    pub ino: u64,
    /// Permission bits recorded at creation.
    pub mode: u32,
    /// Total size, in bytes.
    pub size: u64,
}

/// vnode：一个可按字节区间读写的底层文件资源
pub trait VfsNode: Send + Sync {
    /// 从 `offset` 处读取，返回实际读取的字节数（文件末尾可能少于请求）
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> AxResult<usize>;

    /// 在 `offset` 处写入，返回实际写入的字节数
    fn write_at(&self, offset: u64, buf: &[u8]) -> AxResult<usize>;

    fn stat(&self) -> AxResult<NodeStat>;

    /// 最后一个引用释放时调用一次
    fn release(&self) -> AxResult {
        Ok(())
    }
}

pub type VfsNodeRef = Arc<dyn VfsNode>;

/// 路径解析入口
pub trait VfsOps: Send + Sync {
    /// 按 `flags` 解析或创建 `path`，`mode` 为新建文件的权限位。
    ///
    /// 错误原样返回给调用者：`NotFound`、`AlreadyExists`、`InvalidInput` 等。
    fn resolve_or_create(&self, path: &str, flags: OpenFlags, mode: u32) -> AxResult<VfsNodeRef>;
}
