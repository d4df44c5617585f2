//! # 简单文件系统
//!
//! 以扇区寻址的存储引擎，自底向上：
//!
//! - [`FreeMap`]：已用扇区位图
//! - [`BufferCache`]：文件数据的定长扇区缓冲池
//! - [`index`]：逻辑扇区到物理扇区的映射，访问时分配
//! - [`Inode`]：带引用计数与延迟删除的打开索引节点表
//! - [`Dir`] / [`File`]：已打开索引节点上的句柄
//! - [`FileSystem`]：相对 [`Cwd`] 的路径操作

#![no_std]

extern crate alloc;

mod cache;
mod dir;
mod file;
mod free_map;
mod fs;
pub mod index;
mod inode;
pub mod layout;
pub mod path;
mod sector;
mod volume;

pub use self::{
    cache::{BufferCache, Clock, Placement, Slot, SlotFlag},
    dir::Dir,
    file::File,
    free_map::{FreeMap, SectorAllocator},
    fs::{Cwd, FileSystem, Handle},
    inode::{Inode, Lifecycle, MAX_FILE_SIZE},
    sector::SectorId,
    volume::Volume,
};

/// 扇区字节数
pub const SECTOR_SIZE: usize = 512;
/// 空闲位图一个扇区的位数
pub const SECTOR_BITS: usize = SECTOR_SIZE * 8;

/// 超级块魔数
pub const MAGIC: u32 = 0x5346_5321;
/// 索引节点魔数
pub const INODE_MAGIC: u32 = 0x494e_4f44;

pub const SUPER_BLOCK_SECTOR: SectorId = SectorId::new(0);
pub const ROOT_DIR_SECTOR: SectorId = SectorId::new(1);
pub const FREE_MAP_START: SectorId = SectorId::new(2);

/// 新目录在增长前可容纳的目录项数
pub const DIR_INITIAL_ENTRIES: usize = 16;
