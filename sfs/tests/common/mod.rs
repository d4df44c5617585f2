#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use block_dev::BlockDevice;
use sfs::SECTOR_SIZE;

/// 统计读写次数的内存磁盘
#[derive(Debug)]
pub struct MemDisk {
    sectors: Mutex<Vec<[u8; SECTOR_SIZE]>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemDisk {
    pub fn new(sectors: usize) -> Arc<Self> {
        Arc::new(Self {
            sectors: Mutex::new(vec![[0; SECTOR_SIZE]; sectors]),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        })
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn sector(&self, block_id: usize) -> [u8; SECTOR_SIZE] {
        self.sectors.lock().unwrap()[block_id]
    }

    pub fn fill(&self, block_id: usize, byte: u8) {
        self.sectors.lock().unwrap()[block_id] = [byte; SECTOR_SIZE];
    }
}

impl BlockDevice for MemDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        buf.copy_from_slice(&self.sectors.lock().unwrap()[block_id]);
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.sectors.lock().unwrap()[block_id].copy_from_slice(buf);
    }

    fn num_blocks(&self) -> usize {
        self.sectors.lock().unwrap().len()
    }
}

/// 逐扇区不同的确定性字节
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 511) as u8).collect()
}
