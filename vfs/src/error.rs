use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    NotFound,
    AlreadyExists,
    NotADirectory,
    IsADirectory,
    DirectoryNotEmpty,
    /// 需要目录项名时给出了空名、超长名，或是 `.` 与 `..`
    InvalidName,
    /// 空闲位图中已无可用扇区
    NoSpace,
    /// 偏移超出索引所能寻址的最大文件
    OutOfRange,
    /// 磁盘上的记录未通过校验
    Corrupted,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::NotFound => "no such file or directory",
            Self::AlreadyExists => "entry already exists",
            Self::NotADirectory => "not a directory",
            Self::IsADirectory => "is a directory",
            Self::DirectoryNotEmpty => "directory not empty",
            Self::InvalidName => "invalid entry name",
            Self::NoSpace => "no space left on device",
            Self::OutOfRange => "offset out of range",
            Self::Corrupted => "corrupted on-disk record",
        };
        f.write_str(msg)
    }
}
