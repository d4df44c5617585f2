//! # 块缓存层
//!
//! 块设备读写速度一般慢于内存读写速度，因此在索引节点层与块设备之间
//! 开辟固定数量的扇区缓冲区，文件数据都在这里读写。
//! 扇区在首次访问时从设备读入，只在槽位被回收、扇区被同步
//! 或缓存销毁时写回。
//!
//! 查找、选择牺牲者与写回都在同一把锁下进行。

mod clock;

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use block_dev::BlockDevice;
use spin::Mutex;

pub use self::clock::{Clock, Placement, Slot, SlotFlag};
use crate::layout::DataBlock;
use crate::{SECTOR_SIZE, SectorId};

#[derive(Debug)]
pub struct BufferCache {
    dev: Arc<dyn BlockDevice>,
    inner: Mutex<CacheInner>,
}

#[derive(Debug)]
struct CacheInner {
    clock: Clock,
    buffers: Vec<Box<DataBlock>>,
}

impl BufferCache {
    /// 缓冲区个数
    pub const CAPACITY: usize = 64;

    pub fn new(dev: Arc<dyn BlockDevice>) -> Self {
        Self::with_capacity(dev, Self::CAPACITY)
    }

    pub fn with_capacity(dev: Arc<dyn BlockDevice>, capacity: usize) -> Self {
        Self {
            dev,
            inner: Mutex::new(CacheInner {
                clock: Clock::new(capacity),
                buffers: (0..capacity).map(|_| Box::new([0; SECTOR_SIZE])).collect(),
            }),
        }
    }

    /// 把 `sector` 内 `offset` 处的 `buf.len()` 个字节复制到 `buf`
    pub fn read(&self, sector: SectorId, offset: usize, buf: &mut [u8]) {
        assert!(offset + buf.len() <= SECTOR_SIZE);
        self.map(sector, |data| buf.copy_from_slice(&data[offset..offset + buf.len()]));
    }

    /// 把 `buf` 复制到 `sector` 内的 `offset` 处
    pub fn write(&self, sector: SectorId, offset: usize, buf: &[u8]) {
        assert!(offset + buf.len() <= SECTOR_SIZE);
        self.map_mut(sector, |data| data[offset..offset + buf.len()].copy_from_slice(buf));
    }

    pub fn map<V>(&self, sector: SectorId, f: impl FnOnce(&DataBlock) -> V) -> V {
        let mut inner = self.inner.lock();
        let slot = self.acquire(&mut inner, sector);
        inner.clock.touch(slot, false);
        f(&*inner.buffers[slot])
    }

    pub fn map_mut<V>(&self, sector: SectorId, f: impl FnOnce(&mut DataBlock) -> V) -> V {
        let mut inner = self.inner.lock();
        let slot = self.acquire(&mut inner, sector);
        inner.clock.touch(slot, true);
        f(&mut *inner.buffers[slot])
    }

    /// `sector` 当前是否已缓存
    pub fn contains(&self, sector: SectorId) -> bool {
        self.inner.lock().clock.find(sector).is_some()
    }

    /// 写回所有脏块，但不移出缓存
    pub fn sync_all(&self) {
        let mut inner = self.inner.lock();
        let CacheInner { clock, buffers } = &mut *inner;
        for (slot, buffer) in buffers.iter().enumerate() {
            let state = clock.slot(slot);
            if let (Some(sector), true) = (state.sector, state.flags.contains(SlotFlag::Dirty)) {
                self.dev.write_block(sector.block(), &buffer[..]);
                clock.clean(slot);
            }
        }
    }

    /// 丢弃 `sector` 的缓冲区而不写回。
    ///
    /// 扇区归还空闲位图时调用，旧缓冲区不会覆盖扇区的下一个主人。
    pub fn invalidate(&self, sector: SectorId) {
        let mut inner = self.inner.lock();
        if let Some(slot) = inner.clock.find(sector) {
            inner.clock.unbind(slot);
            inner.buffers[slot].fill(0);
        }
    }

    fn acquire(&self, inner: &mut CacheInner, sector: SectorId) -> usize {
        match inner.clock.place(sector) {
            Placement::Hit(slot) => slot,
            Placement::Vacant(slot) => {
                self.dev.read_block(sector.block(), &mut inner.buffers[slot][..]);
                slot
            }
            Placement::Evicted {
                slot,
                evicted,
                dirty,
            } => {
                let buffer = &mut inner.buffers[slot];
                if dirty {
                    log::trace!("cache: write back {evicted} before reuse");
                    self.dev.write_block(evicted.block(), &buffer[..]);
                }
                buffer.fill(0);
                self.dev.read_block(sector.block(), &mut buffer[..]);
                slot
            }
        }
    }
}

impl Drop for BufferCache {
    fn drop(&mut self) {
        self.sync_all();
    }
}
