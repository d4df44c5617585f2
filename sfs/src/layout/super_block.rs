use core::{ptr, slice};

use crate::{MAGIC, SECTOR_SIZE};

/// 超级块：
/// - 校验设备上是否为本文件系统；
/// - 定位空闲位图
#[derive(Debug, Clone, Default)]
#[repr(C)]
pub struct SuperBlock {
    magic: u32,
    /// 卷占据的扇区数
    pub total_sectors: u32,
    /// 空闲位图占据的扇区数
    pub free_map_sectors: u32,
}

impl SuperBlock {
    #[inline]
    pub fn new(total_sectors: u32, free_map_sectors: u32) -> Self {
        Self {
            magic: MAGIC,
            total_sectors,
            free_map_sectors,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }

    pub fn to_sector(&self) -> [u8; SECTOR_SIZE] {
        let mut sector = [0; SECTOR_SIZE];
        let bytes = unsafe {
            slice::from_raw_parts(ptr::from_ref(self).cast::<u8>(), size_of::<Self>())
        };
        sector[..bytes.len()].copy_from_slice(bytes);
        sector
    }

    pub fn from_sector(sector: &[u8; SECTOR_SIZE]) -> Self {
        let mut sb = Self::default();
        let bytes = unsafe {
            slice::from_raw_parts_mut(ptr::from_mut(&mut sb).cast::<u8>(), size_of::<Self>())
        };
        bytes.copy_from_slice(&sector[..bytes.len()]);
        sb
    }
}
