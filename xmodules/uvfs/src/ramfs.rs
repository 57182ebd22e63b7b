/// 内存文件系统
///
/// 扁平命名空间（没有目录），实现 [`VfsOps`] 供测试和模拟使用。

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use axerrno::{ax_err, AxError, AxResult};
use spin::RwLock;

use crate::{NodeStat, OpenFlags, VfsNode, VfsNodeRef, VfsOps};

/// 单个内存文件的最大长度，超出的写入返回 `StorageFull`
pub const RAMFS_MAX_FILE_SIZE: usize = 16 << 20;

/// 内存文件节点
pub struct RamFile {
    ino: u64,
    mode: u32,
    content: RwLock<Vec<u8>>,
    /// 尚未 release 的打开次数
    opens: AtomicUsize,
    /// 置位后所有读写返回 `Io`，用于模拟设备故障
    faulty: AtomicBool,
}

impl RamFile {
    fn new(ino: u64, mode: u32, content: &[u8]) -> Self {
        Self {
            ino,
            mode,
            content: RwLock::new(content.to_vec()),
            opens: AtomicUsize::new(0),
            faulty: AtomicBool::new(false),
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        self.content.read().clone()
    }

    pub fn truncate(&self) {
        self.content.write().clear();
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::Acquire)
    }

    pub fn set_faulty(&self, faulty: bool) {
        self.faulty.store(faulty, Ordering::Release);
    }

    fn check_fault(&self) -> AxResult {
        if self.faulty.load(Ordering::Acquire) {
            return ax_err!(Io, "simulated device failure");
        }
        Ok(())
    }
}

impl VfsNode for RamFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> AxResult<usize> {
        self.check_fault()?;
        let content = self.content.read();
        let start = match usize::try_from(offset) {
            Ok(start) if start < content.len() => start,
            _ => return Ok(0),
        };
        let end = start.saturating_add(buf.len()).min(content.len());
        buf[..end - start].copy_from_slice(&content[start..end]);
        Ok(end - start)
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> AxResult<usize> {
        self.check_fault()?;
        let end = usize::try_from(offset)
            .ok()
            .and_then(|start| start.checked_add(buf.len()))
            .filter(|&end| end <= RAMFS_MAX_FILE_SIZE);
        let Some(end) = end else {
            return ax_err!(StorageFull, "write past ramfs file size limit");
        };
        let start = end - buf.len();
        let mut content = self.content.write();
        if end > content.len() {
            content.resize(end, 0);
        }
        content[start..end].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn stat(&self) -> AxResult<NodeStat> {
        Ok(NodeStat {
            ino: self.ino,
            mode: self.mode,
            size: self.content.read().len() as u64,
        })
    }

    fn release(&self) -> AxResult {
        self.opens
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map(|_| ())
            .map_err(|_| AxError::BadState)
    }
}

/// 内存文件系统
pub struct RamFs {
    files: RwLock<BTreeMap<String, Arc<RamFile>>>,
    next_ino: AtomicU64,
}

impl RamFs {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(BTreeMap::new()),
            next_ino: AtomicU64::new(1),
        }
    }

    /// 创建（或覆盖）一个带初始内容的文件
    pub fn create_file(&self, path: &str, content: &[u8]) -> Arc<RamFile> {
        let file = Arc::new(RamFile::new(self.alloc_ino(), 0o644, content));
        self.files
            .write()
            .insert(normalize(path).to_string(), file.clone());
        file
    }

    pub fn file(&self, path: &str) -> Option<Arc<RamFile>> {
        self.files.read().get(normalize(path)).cloned()
    }

    pub fn exists(&self, path: &str) -> bool {
        self.files.read().contains_key(normalize(path))
    }

    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.file(path).map(|f| f.contents())
    }

    fn alloc_ino(&self) -> u64 {
        self.next_ino.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for RamFs {
    fn default() -> Self {
        Self::new()
    }
}

impl VfsOps for RamFs {
    fn resolve_or_create(&self, path: &str, flags: OpenFlags, mode: u32) -> AxResult<VfsNodeRef> {
        let name = normalize(path);
        if name.is_empty() {
            return ax_err!(InvalidInput, "empty path");
        }
        let access = flags.access_mode()?;
        if flags.contains(OpenFlags::TRUNC) && !access.writable() {
            return ax_err!(InvalidInput, "O_TRUNC on a read-only open");
        }

        let file = {
            let mut files = self.files.write();
            let existing = files.get(name).cloned();
            match existing {
                Some(_) if flags.contains(OpenFlags::CREAT | OpenFlags::EXCL) => {
                    return Err(AxError::AlreadyExists);
                }
                Some(file) => file,
                None if flags.contains(OpenFlags::CREAT) => {
                    log::debug!("RamFs: creating {} (mode={:#o})", name, mode);
                    let file = Arc::new(RamFile::new(self.alloc_ino(), mode, &[]));
                    files.insert(name.to_string(), file.clone());
                    file
                }
                None => return Err(AxError::NotFound),
            }
        };

        if flags.contains(OpenFlags::TRUNC) {
            file.truncate();
        }
        file.opens.fetch_add(1, Ordering::AcqRel);
        Ok(file)
    }
}

/// 去掉前导 `/`，命名空间是扁平的
fn normalize(path: &str) -> &str {
    path.trim_start_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{O_RDONLY, O_WRONLY};

    fn flags(raw: u32) -> OpenFlags {
        OpenFlags::parse(raw).unwrap()
    }

    #[test]
    fn test_resolve_missing() {
        let fs = RamFs::new();
        assert_eq!(
            fs.resolve_or_create("nope", flags(O_RDONLY), 0).err(),
            Some(AxError::NotFound)
        );
        assert_eq!(
            fs.resolve_or_create("", flags(O_RDONLY), 0).err(),
            Some(AxError::InvalidInput)
        );
    }

    #[test]
    fn test_create_and_exclusive() {
        let fs = RamFs::new();
        let creat = OpenFlags::WRONLY | OpenFlags::CREAT;
        let node = fs.resolve_or_create("/a", creat, 0o664).unwrap();
        assert_eq!(node.stat().unwrap().mode, 0o664);
        assert!(fs.exists("a"));

        assert_eq!(
            fs.resolve_or_create("a", creat | OpenFlags::EXCL, 0o664).err(),
            Some(AxError::AlreadyExists)
        );
        // 不带 EXCL 时打开已有文件
        assert!(fs.resolve_or_create("a", creat, 0o664).is_ok());
        assert_eq!(fs.file("a").unwrap().open_count(), 2);
    }

    #[test]
    fn test_truncate() {
        let fs = RamFs::new();
        fs.create_file("t", b"stale");
        assert_eq!(
            fs.resolve_or_create("t", OpenFlags::TRUNC, 0).err(),
            Some(AxError::InvalidInput)
        );
        let node = fs
            .resolve_or_create("t", flags(O_WRONLY) | OpenFlags::TRUNC, 0)
            .unwrap();
        assert_eq!(node.stat().unwrap().size, 0);
    }

    #[test]
    fn test_sparse_write() {
        let fs = RamFs::new();
        let file = fs.create_file("s", b"ab");
        assert_eq!(file.write_at(4, b"cd"), Ok(2));
        assert_eq!(file.contents(), b"ab\0\0cd");
        let mut buf = [0u8; 8];
        assert_eq!(file.read_at(3, &mut buf), Ok(3));
        assert_eq!(file.read_at(6, &mut buf), Ok(0));
    }

    #[test]
    fn test_write_beyond_size_limit() {
        let fs = RamFs::new();
        let file = fs.create_file("big", b"abc");
        assert_eq!(
            file.write_at(RAMFS_MAX_FILE_SIZE as u64, b"x"),
            Err(AxError::StorageFull)
        );
        assert_eq!(file.write_at(i64::MAX as u64, b"x"), Err(AxError::StorageFull));
        assert_eq!(file.write_at(u64::MAX, b""), Err(AxError::StorageFull));
        assert_eq!(file.contents(), b"abc");

        let mut buf = [0u8; 4];
        assert_eq!(file.read_at(u64::MAX, &mut buf), Ok(0));
    }

    #[test]
    fn test_release_balance() {
        let fs = RamFs::new();
        let file = fs.create_file("r", b"");
        assert_eq!(file.release(), Err(AxError::BadState));
        fs.resolve_or_create("r", flags(O_RDONLY), 0).unwrap();
        assert_eq!(file.release(), Ok(()));
        assert_eq!(file.open_count(), 0);
    }
}
