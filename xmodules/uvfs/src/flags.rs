/// open 标志位定义与校验

use axerrno::{AxError, AxResult};

/// 只读访问（访问模式字段为 0）
pub const O_RDONLY: u32 = 0;
/// 只写访问
pub const O_WRONLY: u32 = 1;
/// 读写访问
pub const O_RDWR: u32 = 2;
/// 访问模式字段掩码
pub const O_ACCMODE: u32 = 3;

bitflags::bitflags! {
    /// `open` 接受的标志位。
    ///
    /// 访问模式占用低两位，`O_RDONLY` 为空集。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        /// Open for writing only.
        const WRONLY = O_WRONLY;
        /// Open for reading and writing.
        const RDWR = O_RDWR;
        /// Create the file if it does not exist.
        const CREAT = 4;
        /// With `CREAT`, fail if the file already exists.
        const EXCL = 8;
        /// Truncate the file to zero length on open.
        const TRUNC = 16;
        /// Every write goes to the end of the file.
        const APPEND = 32;
        /// Do not make the file the controlling terminal.
        const NOCTTY = 64;
    }
}

/// 打开文件的访问模式，创建后不可变
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn readable(self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    pub fn writable(self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }
}

impl OpenFlags {
    /// 从用户传入的原始标志构造，拒绝未知位和矛盾的访问模式
    pub fn parse(raw: u32) -> AxResult<Self> {
        let flags = Self::from_bits(raw).ok_or(AxError::InvalidInput)?;
        flags.access_mode()?;
        Ok(flags)
    }

    /// 访问模式字段必须恰好选择只读、只写、读写之一
    pub fn access_mode(&self) -> AxResult<AccessMode> {
        match self.bits() & O_ACCMODE {
            O_RDONLY => Ok(AccessMode::ReadOnly),
            O_WRONLY => Ok(AccessMode::WriteOnly),
            O_RDWR => Ok(AccessMode::ReadWrite),
            _ => Err(AxError::InvalidInput),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_mode() {
        assert_eq!(OpenFlags::parse(O_RDONLY).unwrap().access_mode(), Ok(AccessMode::ReadOnly));
        assert_eq!(OpenFlags::parse(O_WRONLY).unwrap().access_mode(), Ok(AccessMode::WriteOnly));
        assert_eq!(OpenFlags::parse(O_RDWR).unwrap().access_mode(), Ok(AccessMode::ReadWrite));
    }

    #[test]
    fn test_contradictory_access_bits() {
        assert_eq!(OpenFlags::parse(O_ACCMODE), Err(AxError::InvalidInput));
        let all = O_ACCMODE | OpenFlags::CREAT.bits() | OpenFlags::EXCL.bits() | OpenFlags::TRUNC.bits();
        assert_eq!(OpenFlags::parse(all), Err(AxError::InvalidInput));
    }

    #[test]
    fn test_unknown_bits() {
        assert_eq!(OpenFlags::parse(0x1000), Err(AxError::InvalidInput));
    }

    #[test]
    fn test_every_modifier_accepted() {
        let flags = OpenFlags::RDWR
            | OpenFlags::CREAT
            | OpenFlags::EXCL
            | OpenFlags::TRUNC
            | OpenFlags::APPEND
            | OpenFlags::NOCTTY;
        assert_eq!(OpenFlags::parse(flags.bits()), Ok(flags));
        assert!(AccessMode::ReadWrite.readable() && AccessMode::ReadWrite.writable());
        assert!(!AccessMode::WriteOnly.readable());
        assert!(!AccessMode::ReadOnly.writable());
    }
}
