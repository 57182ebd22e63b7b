/// 文件描述符表
///
/// 每个进程一张表，槽位要么为空，要么持有一个计入 [`OpenFile`] 引用计数的
/// 引用。表锁只串行化槽位的分配和替换，I/O 由打开文件对象自己的偏移锁
/// 串行化。

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::ops::Deref;

use axerrno::{LinuxError, LinuxResult};
use spin::Mutex;
use uvfs::OpenFile;

use crate::config::{MAX_FDS, STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO};

pub struct FdTable {
    slots: Mutex<Vec<Option<Arc<OpenFile>>>>,
}

impl FdTable {
    pub fn new() -> Self {
        Self::with_capacity(MAX_FDS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots: Mutex::new(slots),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.lock().len()
    }

    /// 已占用的槽位数
    pub fn open_count(&self) -> usize {
        self.slots.lock().iter().filter(|s| s.is_some()).count()
    }

    pub fn is_valid(&self, fd: usize) -> bool {
        fd < self.capacity()
    }

    /// 把 `file` 放入编号最小的空槽位，返回该编号。
    ///
    /// 表接管传入的那一个引用；没有空槽位时该引用被释放并返回 `EMFILE`。
    pub fn place(&self, file: Arc<OpenFile>) -> LinuxResult<usize> {
        let mut slots = self.slots.lock();
        match slots.iter().position(Option::is_none) {
            Some(fd) => {
                slots[fd] = Some(file);
                log::trace!("FdTable::place -> fd={}", fd);
                Ok(fd)
            }
            None => {
                drop(slots);
                log::debug!("FdTable::place: table full");
                file.decref();
                Err(LinuxError::EMFILE)
            }
        }
    }

    /// 借用 `fd` 对应的打开文件。
    ///
    /// 借用期间持有一个额外的计数引用，因此并发的 `close` 不会在 I/O 进行中
    /// 释放底层 vnode。返回的守卫析构即为 `put`。
    pub fn get(&self, fd: usize) -> LinuxResult<FileRef> {
        let slots = self.slots.lock();
        let file = slots
            .get(fd)
            .and_then(Option::as_ref)
            .ok_or(LinuxError::EBADF)?;
        Ok(FileRef {
            fd,
            file: file.incref(),
        })
    }

    /// 结束一次借用，等价于丢弃守卫
    pub fn put(&self, file: FileRef) {
        drop(file);
    }

    /// 把槽位 `fd` 设为 `new`，返回原来的内容。
    ///
    /// # Panics
    ///
    /// `fd` 越界是调用者的编程错误。
    pub fn replace_at(&self, fd: usize, new: Option<Arc<OpenFile>>) -> Option<Arc<OpenFile>> {
        let mut slots = self.slots.lock();
        assert!(fd < slots.len(), "replace_at: fd {} out of range", fd);
        core::mem::replace(&mut slots[fd], new)
    }

    /// 关闭 `fd`：越界返回 `EBADF`，槽位已空返回 `ENOENT`
    pub fn close(&self, fd: usize) -> LinuxResult {
        if !self.is_valid(fd) {
            return Err(LinuxError::EBADF);
        }
        let file = self.replace_at(fd, None).ok_or(LinuxError::ENOENT)?;
        file.decref();
        Ok(())
    }

    /// 用同一个打开文件填充 0/1/2 三个标准流槽位
    pub fn install_stdio(&self, file: Arc<OpenFile>) -> LinuxResult {
        let mut slots = self.slots.lock();
        if slots.len() <= STDERR_FILENO {
            drop(slots);
            file.decref();
            return Err(LinuxError::EMFILE);
        }
        let fds = [STDIN_FILENO, STDOUT_FILENO, STDERR_FILENO];
        if fds.iter().any(|&fd| slots[fd].is_some()) {
            drop(slots);
            file.decref();
            return Err(LinuxError::EBUSY);
        }
        slots[STDIN_FILENO] = Some(file.incref());
        slots[STDOUT_FILENO] = Some(file.incref());
        slots[STDERR_FILENO] = Some(file);
        Ok(())
    }

    /// 复制整张表：新表的每个槽位共享同一个打开文件（引用计数加一）
    pub fn fork(&self) -> Self {
        let slots = self.slots.lock();
        let copied = slots
            .iter()
            .map(|slot| slot.as_ref().map(|file| file.incref()))
            .collect();
        Self {
            slots: Mutex::new(copied),
        }
    }

    /// 释放所有槽位（进程退出）
    pub fn close_all(&self) {
        let files: Vec<_> = {
            let mut slots = self.slots.lock();
            slots.iter_mut().filter_map(Option::take).collect()
        };
        if !files.is_empty() {
            log::debug!("FdTable::close_all: releasing {} descriptors", files.len());
        }
        for file in files {
            file.decref();
        }
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FdTable {
    fn drop(&mut self) {
        self.close_all();
    }
}

/// [`FdTable::get`] 返回的借用守卫
pub struct FileRef {
    fd: usize,
    file: Arc<OpenFile>,
}

impl FileRef {
    pub fn fd(&self) -> usize {
        self.fd
    }

    /// 取得一个新的计数引用，用于把同一对象放入另一个槽位
    pub fn share(&self) -> Arc<OpenFile> {
        self.file.incref()
    }
}

impl Deref for FileRef {
    type Target = OpenFile;

    fn deref(&self) -> &OpenFile {
        &self.file
    }
}

impl Drop for FileRef {
    fn drop(&mut self) {
        // 归还借用时持有的那个计数引用，Arc 本身随字段一起释放
        self.file.clone().decref();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uvfs::{OpenFlags, RamFs, O_RDWR};

    fn open(fs: &RamFs, path: &str) -> Arc<OpenFile> {
        if !fs.exists(path) {
            fs.create_file(path, b"");
        }
        OpenFile::open(fs, path, OpenFlags::parse(O_RDWR).unwrap(), 0).unwrap()
    }

    #[test]
    fn test_lowest_free_slot() {
        let fs = RamFs::new();
        let table = FdTable::with_capacity(4);
        assert_eq!(table.place(open(&fs, "a")), Ok(0));
        assert_eq!(table.place(open(&fs, "b")), Ok(1));
        assert_eq!(table.place(open(&fs, "c")), Ok(2));
        table.close(1).unwrap();
        assert_eq!(table.place(open(&fs, "d")), Ok(1));
        assert_eq!(table.place(open(&fs, "e")), Ok(3));
    }

    #[test]
    fn test_full_table_releases_reference() {
        let fs = RamFs::new();
        let table = FdTable::with_capacity(1);
        table.place(open(&fs, "a")).unwrap();
        assert_eq!(table.place(open(&fs, "b")), Err(LinuxError::EMFILE));
        assert_eq!(fs.file("b").unwrap().open_count(), 0);
    }

    #[test]
    fn test_get_errors() {
        let table = FdTable::with_capacity(2);
        assert_eq!(table.get(0).err(), Some(LinuxError::EBADF));
        assert_eq!(table.get(7).err(), Some(LinuxError::EBADF));
    }

    #[test]
    fn test_close_errors() {
        let fs = RamFs::new();
        let table = FdTable::with_capacity(2);
        assert_eq!(table.close(5), Err(LinuxError::EBADF));
        assert_eq!(table.close(0), Err(LinuxError::ENOENT));
        table.place(open(&fs, "a")).unwrap();
        assert_eq!(table.close(0), Ok(()));
        assert_eq!(table.close(0), Err(LinuxError::ENOENT));
        assert_eq!(fs.file("a").unwrap().open_count(), 0);
    }

    #[test]
    fn test_borrow_outlives_close() {
        let fs = RamFs::new();
        let table = FdTable::with_capacity(2);
        let fd = table.place(open(&fs, "a")).unwrap();

        let borrowed = table.get(fd).unwrap();
        assert_eq!(borrowed.refcount(), 2);
        table.close(fd).unwrap();
        // vnode 仍被借用者持有
        assert_eq!(fs.file("a").unwrap().open_count(), 1);
        assert_eq!(borrowed.write(b"late"), Ok(4));
        table.put(borrowed);
        assert_eq!(fs.file("a").unwrap().open_count(), 0);
        assert_eq!(fs.contents("a").unwrap(), b"late");
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_replace_at_out_of_range() {
        let table = FdTable::with_capacity(2);
        table.replace_at(2, None);
    }

    #[test]
    fn test_replace_at_returns_previous() {
        let fs = RamFs::new();
        let table = FdTable::with_capacity(2);
        let a = open(&fs, "a");
        assert!(table.replace_at(1, Some(a)).is_none());
        let prev = table.replace_at(1, None).unwrap();
        assert_eq!(prev.refcount(), 1);
        prev.decref();
        assert_eq!(table.open_count(), 0);
    }

    #[test]
    fn test_fork_shares_objects() {
        let fs = RamFs::new();
        let parent = FdTable::with_capacity(4);
        let fd = parent.place(open(&fs, "a")).unwrap();
        let child = parent.fork();
        assert_eq!(parent.get(fd).unwrap().refcount(), 3);

        child.get(fd).unwrap().write(b"xy").unwrap();
        assert_eq!(parent.get(fd).unwrap().lock().offset(), 2);

        drop(child);
        assert_eq!(fs.file("a").unwrap().open_count(), 1);
        parent.close_all();
        assert_eq!(fs.file("a").unwrap().open_count(), 0);
    }

    #[test]
    fn test_install_stdio() {
        let fs = RamFs::new();
        let table = FdTable::new();
        table.install_stdio(open(&fs, "console")).unwrap();
        assert_eq!(table.open_count(), 3);
        assert_eq!(table.get(1).unwrap().refcount(), 4);
        assert_eq!(table.install_stdio(open(&fs, "console")), Err(LinuxError::EBUSY));
        assert_eq!(table.place(open(&fs, "f")), Ok(3));
    }
}
