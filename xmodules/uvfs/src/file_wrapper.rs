/// 打开文件对象
///
/// 包装一个 vnode、当前偏移、访问模式和引用计数。多个文件描述符表
/// （例如 fork 之后的父子进程）可以共享同一个对象，从而共享偏移。

use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering};

use axerrno::{AxError, AxResult};
use axio::{Seek, SeekFrom};
use spin::{Mutex, MutexGuard};

use crate::{AccessMode, NodeStat, OpenFlags, VfsNodeRef, VfsOps};

pub struct OpenFile {
    node: VfsNodeRef,
    flags: OpenFlags,
    access: AccessMode,
    /// 偏移只能在持有此锁时修改
    offset: Mutex<u64>,
    refcount: AtomicUsize,
}

impl OpenFile {
    /// 包装一个已解析的 vnode，引用计数为 1
    pub fn new(node: VfsNodeRef, flags: OpenFlags) -> AxResult<Arc<Self>> {
        let access = flags.access_mode()?;
        Ok(Arc::new(Self {
            node,
            flags,
            access,
            offset: Mutex::new(0),
            refcount: AtomicUsize::new(1),
        }))
    }

    /// 通过 VFS 打开（或创建）`path`
    pub fn open(vfs: &dyn VfsOps, path: &str, flags: OpenFlags, mode: u32) -> AxResult<Arc<Self>> {
        // 先校验访问模式，避免为非法请求创建文件
        flags.access_mode()?;
        let node = vfs.resolve_or_create(path, flags, mode)?;
        log::trace!("OpenFile::open: {} (flags={:?}, mode={:#o})", path, flags, mode);
        Self::new(node, flags)
    }

    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    pub fn access_mode(&self) -> AccessMode {
        self.access
    }

    pub fn node(&self) -> &VfsNodeRef {
        &self.node
    }

    pub fn stat(&self) -> AxResult<NodeStat> {
        self.node.stat()
    }

    /// 当前引用计数（仅用于诊断）
    pub fn refcount(&self) -> usize {
        self.refcount.load(Ordering::Acquire)
    }

    /// 获取偏移锁，守卫析构时释放
    pub fn lock(&self) -> OffsetGuard<'_> {
        OffsetGuard {
            file: self,
            offset: self.offset.lock(),
        }
    }

    /// 在当前偏移处读取并推进偏移
    pub fn read(&self, buf: &mut [u8]) -> AxResult<usize> {
        self.lock().read_at_offset(buf)
    }

    /// 在当前偏移处写入并推进偏移
    pub fn write(&self, buf: &[u8]) -> AxResult<usize> {
        self.lock().write_at_offset(buf)
    }

    /// 增加一个计数引用，返回新的所有权句柄
    pub fn incref(self: &Arc<Self>) -> Arc<Self> {
        let prev = self.refcount.fetch_add(1, Ordering::Relaxed);
        debug_assert!(prev > 0, "incref on a released open file");
        self.clone()
    }

    /// 放弃一个计数引用；计数归零时释放底层 vnode
    pub fn decref(self: Arc<Self>) {
        let prev = self.refcount.fetch_sub(1, Ordering::AcqRel);
        assert!(prev > 0, "open file refcount underflow");
        if prev == 1 {
            log::trace!("OpenFile: last reference dropped, releasing vnode");
            if let Err(e) = self.node.release() {
                log::warn!("vnode release failed: {:?}", e);
            }
        }
    }
}

impl Drop for OpenFile {
    fn drop(&mut self) {
        let count = *self.refcount.get_mut();
        if count != 0 {
            log::warn!("OpenFile dropped with {} counted references outstanding", count);
        }
    }
}

/// 持有偏移锁期间的文件游标
///
/// 读写在锁内完成 I/O 并更新偏移；任何返回路径（包括错误）都会随守卫
/// 析构释放锁。
pub struct OffsetGuard<'a> {
    file: &'a OpenFile,
    offset: MutexGuard<'a, u64>,
}

impl OffsetGuard<'_> {
    pub fn offset(&self) -> u64 {
        *self.offset
    }

    pub fn read_at_offset(&mut self, buf: &mut [u8]) -> AxResult<usize> {
        if !self.file.access.readable() {
            return Err(AxError::PermissionDenied);
        }
        let n = self.file.node.read_at(*self.offset, buf)?;
        self.advance(n)?;
        log::trace!("read {} bytes, offset now {}", n, *self.offset);
        Ok(n)
    }

    pub fn write_at_offset(&mut self, buf: &[u8]) -> AxResult<usize> {
        if !self.file.access.writable() {
            return Err(AxError::PermissionDenied);
        }
        if self.file.flags.contains(OpenFlags::APPEND) {
            *self.offset = self.file.node.stat()?.size;
        }
        // 写入结束位置必须能用 u64 表示，否则不触碰 vnode
        if self.offset.checked_add(buf.len() as u64).is_none() {
            return Err(AxError::InvalidInput);
        }
        let n = self.file.node.write_at(*self.offset, buf)?;
        self.advance(n)?;
        log::trace!("wrote {} bytes, offset now {}", n, *self.offset);
        Ok(n)
    }

    fn advance(&mut self, n: usize) -> AxResult {
        *self.offset = self
            .offset
            .checked_add(n as u64)
            .ok_or(AxError::InvalidInput)?;
        Ok(())
    }
}

impl axio::Write for OffsetGuard<'_> {
    fn write(&mut self, buf: &[u8]) -> AxResult<usize> {
        self.write_at_offset(buf)
    }

    fn flush(&mut self) -> AxResult {
        Ok(())
    }
}

impl Seek for OffsetGuard<'_> {
    /// 重新定位偏移，结果为负或溢出时返回 `InvalidInput`
    fn seek(&mut self, pos: SeekFrom) -> AxResult<u64> {
        let new = match pos {
            SeekFrom::Start(off) => Some(off),
            SeekFrom::Current(delta) => self.offset.checked_add_signed(delta),
            SeekFrom::End(delta) => self.file.node.stat()?.size.checked_add_signed(delta),
        };
        let new = new.ok_or(AxError::InvalidInput)?;
        *self.offset = new;
        Ok(new)
    }
}
