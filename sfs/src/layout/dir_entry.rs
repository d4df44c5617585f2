use core::{ptr, slice};

use crate::SectorId;

/// 目录项名的最大字节数
pub const NAME_MAX: usize = 27;

/// 目录数据中的一个槽位
#[derive(Debug, Default, Clone)]
#[repr(C)]
pub struct DirEntry {
    // 末字节留给 NUL
    name: [u8; NAME_MAX + 1],
    sector: u32,
}

impl DirEntry {
    /// 目录项大小恒为32字节
    pub const SIZE: usize = 32;

    /// 由调用者保证 `name` 不超过 [`NAME_MAX`]
    #[inline]
    pub fn new(name: &str, sector: SectorId) -> Self {
        let bytes = name.as_bytes();
        let mut name = [0; NAME_MAX + 1];
        name[..bytes.len()].copy_from_slice(bytes);

        Self {
            name,
            sector: sector.into(),
        }
    }

    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|&c| c == 0).unwrap_or(NAME_MAX);
        core::str::from_utf8(&self.name[..len]).unwrap_or("")
    }

    /// 空槽位
    #[inline]
    pub fn is_free(&self) -> bool {
        self.name[0] == 0
    }

    #[inline]
    pub fn sector(&self) -> SectorId {
        SectorId::new(self.sector)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(ptr::from_ref(self).cast(), Self::SIZE) }
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(ptr::from_mut(self).cast(), Self::SIZE) }
    }
}
