//! 磁盘索引节点，恰好占一个扇区。
//!
//! 数据扇区经由逻辑索引的三个区域定位：
//! - 直接：记录内存放的 [`DIRECT_COUNT`] 个扇区号
//! - 一级间接：一个索引扇区，存放 [`INDEX_COUNT`] 个扇区号
//! - 二级间接：一个存放索引扇区号的索引扇区
//!
//! 值为 [`SectorId::UNALLOCATED`] 的槽位在首次访问时才分配，
//! 见 [`crate::index`]。

use core::{ptr, slice};

use super::INDEX_COUNT;
use crate::{INODE_MAGIC, ROOT_DIR_SECTOR, SECTOR_SIZE, SectorId};

/// 记录内直接存放的扇区号个数
pub const DIRECT_COUNT: usize = 122;
/// 只用直接槽位时的容量
pub const DIRECT_CAP: usize = DIRECT_COUNT;
/// 用上一级间接扇区后的容量
pub const INDIRECT_CAP: usize = DIRECT_CAP + INDEX_COUNT;
/// 用上二级间接扇区后的容量
pub const DOUBLE_INDIRECT_CAP: usize = INDIRECT_CAP + INDEX_COUNT * INDEX_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskInodeKind {
    File,
    Directory,
}

#[derive(Debug, Clone)]
#[repr(C)]
pub struct DiskInode {
    /// 文件字节数
    pub length: i32,
    magic: u32,
    pub direct: [u32; DIRECT_COUNT],
    /// 指向一个索引扇区
    pub indirect: u32,
    /// 指向存放索引扇区号的索引扇区
    pub double_indirect: u32,
    // 记录直接来自磁盘，故用 u8 而非 bool
    is_dir: u8,
    _pad: [u8; 3],
    /// 上一级目录的索引节点
    pub parent: u32,
}

const _: () = assert!(size_of::<DiskInode>() == SECTOR_SIZE);

impl DiskInode {
    pub fn new(length: i32, kind: DiskInodeKind) -> Self {
        Self {
            length,
            magic: INODE_MAGIC,
            direct: [0; DIRECT_COUNT],
            indirect: 0,
            double_indirect: 0,
            is_dir: (kind == DiskInodeKind::Directory) as u8,
            _pad: [0; 3],
            parent: ROOT_DIR_SECTOR.into(),
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == INODE_MAGIC
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.is_dir != 0
    }

    #[inline]
    pub fn kind(&self) -> DiskInodeKind {
        if self.is_dir() {
            DiskInodeKind::Directory
        } else {
            DiskInodeKind::File
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.length.max(0) as usize
    }

    #[inline]
    pub fn parent(&self) -> SectorId {
        SectorId::new(self.parent)
    }

    /// 容纳 `size` 字节数据所需的扇区数
    #[inline]
    pub fn count_data_sectors(size: usize) -> usize {
        size.div_ceil(SECTOR_SIZE)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; SECTOR_SIZE] {
        unsafe { &*ptr::from_ref(self).cast() }
    }

    pub fn from_bytes(bytes: &[u8; SECTOR_SIZE]) -> Self {
        let mut inode = Self::new(0, DiskInodeKind::File);
        let dst = unsafe {
            slice::from_raw_parts_mut(ptr::from_mut(&mut inode).cast::<u8>(), SECTOR_SIZE)
        };
        dst.copy_from_slice(bytes);
        inode
    }
}
