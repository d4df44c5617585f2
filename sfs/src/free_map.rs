//! 空闲空间分配器
//!
//! 每个设备扇区对应一位，使用中则置位。
//! 位图常驻内存，每次修改都直写到其所在扇区。

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use block_dev::BlockDevice;
use spin::Mutex;
use vfs::Error;

use crate::{SECTOR_BITS, SECTOR_SIZE, SectorId};

/// 以连续段为单位分配扇区
pub trait SectorAllocator {
    /// 把 `count` 个连续空闲扇区标为已用，返回第一个
    fn allocate(&self, count: usize) -> Result<SectorId, Error>;

    /// 归还从 `sector` 起的 `count` 个扇区
    fn release(&self, sector: SectorId, count: usize);
}

/// 一个扇区存放的位图字数
const WORDS_PER_SECTOR: usize = SECTOR_BITS / 64;

#[derive(Debug)]
pub struct FreeMap {
    dev: Arc<dyn BlockDevice>,
    /// 磁盘位图的起始扇区
    start: SectorId,
    bitmap: Mutex<Bitmap>,
}

#[derive(Debug)]
struct Bitmap {
    words: Vec<u64>,
    /// 有效位数，每个设备扇区一位
    capacity: usize,
}

impl FreeMap {
    /// 覆盖 `total_sectors` 所需的位图扇区数
    #[inline]
    pub fn sectors_for(total_sectors: usize) -> usize {
        total_sectors.div_ceil(SECTOR_BITS)
    }

    /// 建立覆盖 `total_sectors` 的空位图，前 `reserved` 个扇区标为已用，并写出
    pub fn create(
        dev: Arc<dyn BlockDevice>,
        start: SectorId,
        total_sectors: usize,
        reserved: usize,
    ) -> Self {
        let map_sectors = Self::sectors_for(total_sectors);
        let mut bitmap = Bitmap {
            words: vec![0; map_sectors * WORDS_PER_SECTOR],
            capacity: total_sectors,
        };
        bitmap.set_range(0, reserved, true);

        let free_map = Self {
            dev,
            start,
            bitmap: Mutex::new(bitmap),
        };
        free_map.flush_all();
        free_map
    }

    /// 载入由 [`FreeMap::create`] 写下的位图
    pub fn open(dev: Arc<dyn BlockDevice>, start: SectorId, total_sectors: usize) -> Self {
        let map_sectors = Self::sectors_for(total_sectors);
        let mut words = Vec::with_capacity(map_sectors * WORDS_PER_SECTOR);
        let mut buf = [0u8; SECTOR_SIZE];

        for i in 0..map_sectors {
            dev.read_block((start + i as u32).block(), &mut buf);
            words.extend(
                buf.chunks_exact(8)
                    .map(|w| u64::from_le_bytes(w.try_into().unwrap_or([0; 8]))),
            );
        }

        Self {
            dev,
            start,
            bitmap: Mutex::new(Bitmap {
                words,
                capacity: total_sectors,
            }),
        }
    }

    /// 剩余可用扇区数
    pub fn free_count(&self) -> usize {
        let bitmap = self.bitmap.lock();
        (0..bitmap.capacity).filter(|&bit| !bitmap.test(bit)).count()
    }

    /// 设备末尾之外的扇区一律视为未用
    pub fn is_used(&self, sector: SectorId) -> bool {
        let bitmap = self.bitmap.lock();
        let bit = sector.block();
        bit < bitmap.capacity && bitmap.test(bit)
    }

    fn flush_all(&self) {
        let bitmap = self.bitmap.lock();
        for index in 0..bitmap.words.len() / WORDS_PER_SECTOR {
            self.write_back(&bitmap, index);
        }
    }

    /// 写回覆盖 `first..first + count` 位的位图扇区
    fn flush_range(&self, bitmap: &Bitmap, first: usize, count: usize) {
        let (first_sector, ..) = decompose(first);
        let (last_sector, ..) = decompose(first + count - 1);
        for index in first_sector..=last_sector {
            self.write_back(bitmap, index);
        }
    }

    fn write_back(&self, bitmap: &Bitmap, index: usize) {
        let mut buf = [0u8; SECTOR_SIZE];
        let words = &bitmap.words[index * WORDS_PER_SECTOR..(index + 1) * WORDS_PER_SECTOR];
        for (dst, word) in buf.chunks_exact_mut(8).zip(words) {
            dst.copy_from_slice(&word.to_le_bytes());
        }
        self.dev.write_block((self.start + index as u32).block(), &buf);
    }
}

impl SectorAllocator for FreeMap {
    fn allocate(&self, count: usize) -> Result<SectorId, Error> {
        let mut bitmap = self.bitmap.lock();
        let first = bitmap.find_free_run(count).ok_or_else(|| {
            log::warn!("free map exhausted, {count} sector(s) requested");
            Error::NoSpace
        })?;
        bitmap.set_range(first, count, true);
        self.flush_range(&bitmap, first, count);

        Ok(SectorId::new(first as u32))
    }

    fn release(&self, sector: SectorId, count: usize) {
        if count == 0 {
            return;
        }
        let mut bitmap = self.bitmap.lock();
        let first = sector.block();
        // 释放的扇区必须已分配
        debug_assert!((first..first + count).all(|bit| bitmap.test(bit)));
        bitmap.set_range(first, count, false);
        self.flush_range(&bitmap, first, count);
    }
}

impl Bitmap {
    #[inline]
    fn test(&self, bit: usize) -> bool {
        let (sector, word, inner) = decompose(bit);
        self.words[sector * WORDS_PER_SECTOR + word] & (1 << inner) != 0
    }

    fn set_range(&mut self, first: usize, count: usize, used: bool) {
        for bit in first..first + count {
            let (sector, word, inner) = decompose(bit);
            let word = &mut self.words[sector * WORDS_PER_SECTOR + word];
            if used {
                *word |= 1 << inner;
            } else {
                *word &= !(1 << inner);
            }
        }
    }

    fn find_free_run(&self, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }

        if count == 1 {
            // 跳过已满的字
            return self
                .words
                .iter()
                .enumerate()
                .find_map(|(index, &bits)| {
                    (bits != u64::MAX).then_some(index * 64 + bits.trailing_ones() as usize)
                })
                .filter(|&bit| bit < self.capacity);
        }

        let mut run = 0;
        for bit in 0..self.capacity {
            if self.test(bit) {
                run = 0;
            } else {
                run += 1;
                if run == count {
                    return Some(bit + 1 - count);
                }
            }
        }
        None
    }
}

/// 把位号拆成（位图扇区, 扇区内字号, 字内位号）
#[inline]
fn decompose(mut bit: usize) -> (usize, usize, usize) {
    let sector = bit / SECTOR_BITS;
    bit %= SECTOR_BITS;
    (sector, bit / 64, bit % 64)
}
