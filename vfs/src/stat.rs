use crate::DirEntryType;

#[derive(Debug, Clone, PartialEq, Eq)]
#[repr(C, align(32))]
pub struct Stat {
    pub mode: DirEntryType,
    /// 索引节点号
    pub inode: u64,
    /// 最佳 I/O 块大小
    pub block_size: u64,
    /// 占用块数
    pub blocks: u64,
    /// 文件大小
    pub size: u64,
}
