/// 用户地址空间访问
///
/// 内核从不直接解引用用户指针，所有访问都经过 [`UserSpace`]，非法地址
/// 返回 `EFAULT` 而不是触发内核错误。

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

use axerrno::{LinuxError, LinuxResult};
use spin::Mutex;

/// 用户空间地址
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct UserPtr(usize);

impl UserPtr {
    pub const NULL: Self = Self(0);

    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    pub const fn addr(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    pub fn add(self, count: usize) -> Self {
        Self(self.0.wrapping_add(count))
    }
}

impl fmt::Debug for UserPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserPtr({:#x})", self.0)
    }
}

impl From<usize> for UserPtr {
    fn from(addr: usize) -> Self {
        Self(addr)
    }
}

/// 用户/内核地址拷贝例程
pub trait UserSpace: Send + Sync {
    /// 检查 `[ptr, ptr + len)` 是否是合法的用户区间
    fn check_range(&self, ptr: UserPtr, len: usize) -> LinuxResult;

    /// 从用户空间拷贝 `dst.len()` 个字节
    fn copy_in(&self, src: UserPtr, dst: &mut [u8]) -> LinuxResult;

    /// 向用户空间拷贝 `src.len()` 个字节
    fn copy_out(&self, dst: UserPtr, src: &[u8]) -> LinuxResult;

    /// 拷贝以 NUL 结尾的字符串，`max_len` 包含结尾的 NUL。
    ///
    /// 超长返回 `ENAMETOOLONG`，非法指针返回 `EFAULT`。
    fn copy_in_str(&self, src: UserPtr, max_len: usize) -> LinuxResult<String> {
        let mut bytes = Vec::new();
        let mut byte = [0u8; 1];
        for i in 0..max_len {
            self.copy_in(src.add(i), &mut byte)?;
            if byte[0] == 0 {
                return String::from_utf8(bytes).map_err(|_| LinuxError::EINVAL);
            }
            bytes.push(byte[0]);
        }
        Err(LinuxError::ENAMETOOLONG)
    }
}

/// 一段连续的模拟用户内存
///
/// 地址 `[base, base + size)` 合法，其余地址（包括 NULL）都返回 `EFAULT`。
/// 提供一个简单的递增分配器，方便构造系统调用参数。
pub struct UserRegion {
    base: usize,
    mem: Mutex<Vec<u8>>,
    brk: AtomicUsize,
}

impl UserRegion {
    pub fn new(base: usize, size: usize) -> Self {
        assert!(base != 0, "user region must not contain NULL");
        Self {
            base,
            mem: Mutex::new(vec![0; size]),
            brk: AtomicUsize::new(0),
        }
    }

    pub fn size(&self) -> usize {
        self.mem.lock().len()
    }

    /// 分配 `len` 个清零字节
    pub fn alloc(&self, len: usize) -> LinuxResult<UserPtr> {
        let size = self.size();
        let start = self
            .brk
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |brk| {
                brk.checked_add(len).filter(|&end| end <= size)
            })
            .map_err(|_| LinuxError::ENOMEM)?;
        Ok(UserPtr::new(self.base + start))
    }

    /// 分配并写入 `data`
    pub fn push_bytes(&self, data: &[u8]) -> LinuxResult<UserPtr> {
        let ptr = self.alloc(data.len())?;
        self.copy_out(ptr, data)?;
        Ok(ptr)
    }

    /// 分配并写入以 NUL 结尾的字符串
    pub fn push_str(&self, s: &str) -> LinuxResult<UserPtr> {
        let ptr = self.alloc(s.len() + 1)?;
        self.copy_out(ptr, s.as_bytes())?;
        Ok(ptr)
    }

    /// 读取用户内存（内核侧视角）
    pub fn read_bytes(&self, ptr: UserPtr, len: usize) -> LinuxResult<Vec<u8>> {
        let mut buf = vec![0; len];
        self.copy_in(ptr, &mut buf)?;
        Ok(buf)
    }

    fn translate(&self, ptr: UserPtr, len: usize) -> LinuxResult<core::ops::Range<usize>> {
        if ptr.is_null() || ptr.addr() < self.base {
            return Err(LinuxError::EFAULT);
        }
        let start = ptr.addr() - self.base;
        let end = start.checked_add(len).ok_or(LinuxError::EFAULT)?;
        if end > self.size() {
            return Err(LinuxError::EFAULT);
        }
        Ok(start..end)
    }
}

impl UserSpace for UserRegion {
    fn check_range(&self, ptr: UserPtr, len: usize) -> LinuxResult {
        if len == 0 {
            return Ok(());
        }
        self.translate(ptr, len).map(|_| ())
    }

    fn copy_in(&self, src: UserPtr, dst: &mut [u8]) -> LinuxResult {
        if dst.is_empty() {
            return Ok(());
        }
        let range = self.translate(src, dst.len())?;
        dst.copy_from_slice(&self.mem.lock()[range]);
        Ok(())
    }

    fn copy_out(&self, dst: UserPtr, src: &[u8]) -> LinuxResult {
        if src.is_empty() {
            return Ok(());
        }
        let range = self.translate(dst, src.len())?;
        self.mem.lock()[range].copy_from_slice(src);
        Ok(())
    }
}
