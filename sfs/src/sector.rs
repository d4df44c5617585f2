//! 扇区地址

use core::fmt;

use derive_more::{Add, From, Into};

/// 块设备上的扇区号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Add, From, Into)]
#[repr(transparent)]
pub struct SectorId(u32);

impl core::ops::Add<u32> for SectorId {
    type Output = Self;

    fn add(self, rhs: u32) -> Self::Output {
        self + Self(rhs)
    }
}

impl SectorId {
    /// 尚未分配扇区的索引槽位
    pub const UNALLOCATED: Self = Self(0);

    /// 所求偏移无扇区可容纳
    pub const INVALID: Self = Self(u32::MAX);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn is_allocated(self) -> bool {
        self != Self::UNALLOCATED && self != Self::INVALID
    }

    /// 交给 [`block_dev::BlockDevice`] 的块号
    #[inline]
    pub fn block(self) -> usize {
        self.0 as usize
    }
}

impl From<SectorId> for u64 {
    fn from(id: SectorId) -> Self {
        id.0 as u64
    }
}

impl fmt::Display for SectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
