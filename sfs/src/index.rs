//! # 块索引层
//!
//! 把文件的逻辑扇区号映射到设备扇区。
//!
//! ## 逻辑扇区号的划分
//!
//! - 小于 [`DIRECT_CAP`]：`direct[n]`
//! - 小于 [`INDIRECT_CAP`]：一级间接扇区的第 `n - DIRECT_CAP` 个槽位
//! - 小于 [`DOUBLE_INDIRECT_CAP`]：记 `m = n - INDIRECT_CAP`，先取二级间接扇区
//!   第 `m / INDEX_COUNT` 个槽位处的索引扇区，再取其第 `m % INDEX_COUNT` 个槽位
//!
//! 途经的索引扇区或数据扇区若尚未分配，就先向分配器申请并清零，读取也不例外。
//! 索引扇区直接在设备上读写，只有文件数据经过块缓存。

use alloc::vec::Vec;

use block_dev::BlockDevice;
use vfs::Error;

use crate::free_map::SectorAllocator;
use crate::layout::{
    DIRECT_CAP, DOUBLE_INDIRECT_CAP, DiskInode, INDEX_COUNT, INDIRECT_CAP, IndexBlock,
};
use crate::{SECTOR_SIZE, SectorId};

const ZEROS: [u8; SECTOR_SIZE] = [0; SECTOR_SIZE];

/// `inode` 第 `index` 个逻辑扇区所在的设备扇区，途中缺什么就分配什么。
///
/// 超出可寻址的最大文件时返回 [`Error::OutOfRange`]，
/// 分配器耗尽时返回 [`Error::NoSpace`]。
pub fn translate(
    inode: &mut DiskInode,
    index: usize,
    dev: &dyn BlockDevice,
    alloc: &dyn SectorAllocator,
) -> Result<SectorId, Error> {
    if index >= DOUBLE_INDIRECT_CAP {
        return Err(Error::OutOfRange);
    }

    if index < DIRECT_CAP {
        return materialize(&mut inode.direct[index], dev, alloc).map(|(sector, _)| sector);
    }

    if index < INDIRECT_CAP {
        let (table, _) = materialize(&mut inode.indirect, dev, alloc)?;
        return slot_in(table, index - DIRECT_CAP, dev, alloc);
    }

    let index = index - INDIRECT_CAP;
    let (outer, _) = materialize(&mut inode.double_indirect, dev, alloc)?;
    let inner = slot_in(outer, index / INDEX_COUNT, dev, alloc)?;
    slot_in(inner, index % INDEX_COUNT, dev, alloc)
}

/// 同 [`translate`]，但从不分配；空洞返回 `None`
pub fn lookup(inode: &DiskInode, index: usize, dev: &dyn BlockDevice) -> Option<SectorId> {
    let present = |raw: u32| (raw != 0).then_some(SectorId::new(raw));

    if index < DIRECT_CAP {
        present(inode.direct[index])
    } else if index < INDIRECT_CAP {
        let table = present(inode.indirect)?;
        present(read_index(dev, table)[index - DIRECT_CAP])
    } else if index < DOUBLE_INDIRECT_CAP {
        let index = index - INDIRECT_CAP;
        let outer = present(inode.double_indirect)?;
        let inner = present(read_index(dev, outer)[index / INDEX_COUNT])?;
        present(read_index(dev, inner)[index % INDEX_COUNT])
    } else {
        None
    }
}

/// `inode` 可达的全部数据扇区与索引扇区，
/// 数据扇区排在引用它的索引扇区之前
pub fn collect(inode: &DiskInode, dev: &dyn BlockDevice) -> Vec<SectorId> {
    let mut sectors: Vec<SectorId> = inode
        .direct
        .iter()
        .filter(|&&raw| raw != 0)
        .map(|&raw| SectorId::new(raw))
        .collect();

    if inode.indirect != 0 {
        collect_table(SectorId::new(inode.indirect), dev, &mut sectors);
    }

    if inode.double_indirect != 0 {
        let outer = SectorId::new(inode.double_indirect);
        for &inner in read_index(dev, outer).iter().filter(|&&raw| raw != 0) {
            collect_table(SectorId::new(inner), dev, &mut sectors);
        }
        sectors.push(outer);
    }

    sectors
}

/// 把 [`collect`] 得到的扇区全部还给 `alloc` 并清空 `inode` 的索引，
/// 返回释放的扇区数
pub fn release_all(
    inode: &mut DiskInode,
    dev: &dyn BlockDevice,
    alloc: &dyn SectorAllocator,
) -> usize {
    let sectors = collect(inode, dev);
    for &sector in &sectors {
        alloc.release(sector, 1);
    }

    inode.direct.fill(0);
    inode.indirect = 0;
    inode.double_indirect = 0;
    sectors.len()
}

fn collect_table(table: SectorId, dev: &dyn BlockDevice, sectors: &mut Vec<SectorId>) {
    sectors.extend(
        read_index(dev, table)
            .iter()
            .filter(|&&raw| raw != 0)
            .map(|&raw| SectorId::new(raw)),
    );
    sectors.push(table);
}

/// 返回 `slot` 中的扇区，槽位为空时分配一个并清零；
/// 布尔值表示是否发生了分配
fn materialize(
    slot: &mut u32,
    dev: &dyn BlockDevice,
    alloc: &dyn SectorAllocator,
) -> Result<(SectorId, bool), Error> {
    if *slot != 0 {
        return Ok((SectorId::new(*slot), false));
    }

    let sector = alloc.allocate(1)?;
    dev.write_block(sector.block(), &ZEROS);
    *slot = sector.into();
    Ok((sector, true))
}

/// 落实索引扇区 `table` 的第 `at` 项
fn slot_in(
    table: SectorId,
    at: usize,
    dev: &dyn BlockDevice,
    alloc: &dyn SectorAllocator,
) -> Result<SectorId, Error> {
    let mut entries = read_index(dev, table);
    let (sector, fresh) = materialize(&mut entries[at], dev, alloc)?;
    if fresh {
        write_index(dev, table, &entries);
    }
    Ok(sector)
}

pub(crate) fn read_index(dev: &dyn BlockDevice, table: SectorId) -> IndexBlock {
    let mut buf = [0u8; SECTOR_SIZE];
    dev.read_block(table.block(), &mut buf);

    let mut entries = [0u32; INDEX_COUNT];
    for (entry, bytes) in entries.iter_mut().zip(buf.chunks_exact(4)) {
        *entry = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    }
    entries
}

fn write_index(dev: &dyn BlockDevice, table: SectorId, entries: &IndexBlock) {
    let mut buf = [0u8; SECTOR_SIZE];
    for (bytes, entry) in buf.chunks_exact_mut(4).zip(entries) {
        bytes.copy_from_slice(&entry.to_le_bytes());
    }
    dev.write_block(table.block(), &buf);
}
