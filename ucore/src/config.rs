//! 编译期配置常量

/// 每个进程文件描述符表的默认容量
pub const MAX_FDS: usize = 64;

/// 路径最大长度（含结尾的 NUL）
pub const PATH_MAX: usize = 1024;

pub const STDIN_FILENO: usize = 0;
pub const STDOUT_FILENO: usize = 1;
pub const STDERR_FILENO: usize = 2;
