//! # 磁盘数据结构层
//!
//! 卷的布局（按扇区）：
//! 超级块 | 根目录索引节点 | 空闲位图 | 索引节点、索引扇区与数据扇区

mod super_block;
pub use super_block::SuperBlock;

mod disk_inode;
pub use disk_inode::{
    DIRECT_CAP, DIRECT_COUNT, DOUBLE_INDIRECT_CAP, DiskInode, DiskInodeKind, INDIRECT_CAP,
};

/// 目录项，存放在目录索引节点的数据中
mod dir_entry;
pub use dir_entry::{DirEntry, NAME_MAX};

use crate::SECTOR_SIZE;

/// 装满扇区号的扇区
pub type IndexBlock = [u32; INDEX_COUNT];

/// 一个索引扇区可存放的扇区号个数
pub const INDEX_COUNT: usize = SECTOR_SIZE / 4;

pub type DataBlock = [u8; SECTOR_SIZE];
