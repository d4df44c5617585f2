//! 缓冲区缓存的置换策略。
//!
//! 策略只记录每个槽位对应的扇区及其标记；
//! 缓冲区本身存放在 [`super::BufferCache`] 中。

use alloc::vec;
use alloc::vec::Vec;

use enumflags2::{BitFlags, bitflags};

use crate::SectorId;

#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotFlag {
    /// 已绑定扇区
    Used,
    /// 是否为脏块
    Dirty,
    /// 指针上次经过后被访问过
    Access,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Slot {
    pub sector: Option<SectorId>,
    pub flags: BitFlags<SlotFlag>,
}

/// [`Clock::place`] 为扇区找到的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// 已缓存在此槽位
    Hit(usize),
    /// 绑定到从未使用过的槽位
    Vacant(usize),
    /// 绑定到从 `evicted` 手中夺来的槽位；
    /// `dirty` 时须先写回旧内容
    Evicted {
        slot: usize,
        evicted: SectorId,
        dirty: bool,
    },
}

/// 在固定数量的槽位上做时钟扫描。
///
/// 指针下的槽位访问标记**已置位**时即被选中；
/// 否则清除标记，指针前移。
#[derive(Debug)]
pub struct Clock {
    hand: usize,
    slots: Vec<Slot>,
}

impl Clock {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "a cache needs at least one slot");
        Self {
            hand: 0,
            slots: vec![Slot::default(); capacity],
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn hand(&self) -> usize {
        self.hand
    }

    #[inline]
    pub fn slot(&self, slot: usize) -> &Slot {
        &self.slots[slot]
    }

    pub fn find(&self, sector: SectorId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.sector == Some(sector))
    }

    /// 为 `sector` 找到槽位，未缓存时绑定一个
    pub fn place(&mut self, sector: SectorId) -> Placement {
        if let Some(slot) = self.find(sector) {
            return Placement::Hit(slot);
        }

        if let Some(slot) = self
            .slots
            .iter()
            .position(|slot| !slot.flags.contains(SlotFlag::Used))
        {
            self.bind(slot, sector);
            return Placement::Vacant(slot);
        }

        let slot = self.select_victim();
        let victim = self.slots[slot];
        self.bind(slot, sector);
        Placement::Evicted {
            slot,
            evicted: victim.sector.unwrap_or(SectorId::INVALID),
            dirty: victim.flags.contains(SlotFlag::Dirty),
        }
    }

    /// 标记槽位被读或被写
    pub fn touch(&mut self, slot: usize, write: bool) {
        let flags = &mut self.slots[slot].flags;
        flags.insert(SlotFlag::Access);
        if write {
            flags.insert(SlotFlag::Dirty);
        }
    }

    pub fn clean(&mut self, slot: usize) {
        self.slots[slot].flags.remove(SlotFlag::Dirty);
    }

    /// 解除 `slot` 与扇区的绑定，返回该扇区及其脏标记
    pub fn unbind(&mut self, slot: usize) -> Option<(SectorId, bool)> {
        let old = core::mem::take(&mut self.slots[slot]);
        old.sector
            .map(|sector| (sector, old.flags.contains(SlotFlag::Dirty)))
    }

    fn bind(&mut self, slot: usize, sector: SectorId) {
        self.slots[slot] = Slot {
            sector: Some(sector),
            flags: SlotFlag::Used.into(),
        };
    }

    fn select_victim(&mut self) -> usize {
        // 转满一圈仍无置位标记，就取指针下的槽位
        for _ in 0..self.capacity() {
            let slot = self.hand;
            self.hand = (self.hand + 1) % self.capacity();
            let flags = &mut self.slots[slot].flags;
            if flags.contains(SlotFlag::Access) {
                return slot;
            }
            flags.remove(SlotFlag::Access);
        }

        let slot = self.hand;
        self.hand = (self.hand + 1) % self.capacity();
        slot
    }
}
