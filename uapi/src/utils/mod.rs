/// 工具函数模块

use alloc::string::String;

use axerrno::{LinuxError, LinuxResult};
use ucore::config::PATH_MAX;
use ucore::{UserPtr, UserSpace};
use uvfs::OpenFlags;

/// 从用户空间拷贝路径，长度受 `PATH_MAX` 限制
pub fn copy_in_path(aspace: &dyn UserSpace, upath: UserPtr) -> LinuxResult<String> {
    let path = aspace.copy_in_str(upath, PATH_MAX)?;
    if path.is_empty() {
        return Err(LinuxError::ENOENT);
    }
    Ok(path)
}

/// 校验 open 标志：未知位或矛盾的访问模式返回 `EINVAL`
pub fn parse_flags(flags: u32) -> LinuxResult<OpenFlags> {
    Ok(OpenFlags::parse(flags)?)
}
