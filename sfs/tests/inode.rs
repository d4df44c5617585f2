mod common;

use std::sync::Arc;

use common::{MemDisk, pattern};
use sfs::layout::{DiskInode, DiskInodeKind, INDIRECT_CAP};
use sfs::{Lifecycle, MAX_FILE_SIZE, SECTOR_SIZE, SectorAllocator, SectorId, Volume};
use vfs::Error;

fn volume(sectors: usize) -> (Arc<MemDisk>, Volume) {
    let dev = MemDisk::new(sectors);
    let vol = Volume::format(dev.clone());
    (dev, vol)
}

fn new_file(vol: &Volume) -> SectorId {
    let sector = vol.allocate(1).unwrap();
    vol.create_inode(sector, 0, DiskInodeKind::File);
    sector
}

fn record(dev: &MemDisk, sector: SectorId) -> DiskInode {
    DiskInode::from_bytes(&dev.sector(sector.block()))
}

#[test]
fn opening_twice_shares_the_instance() {
    let (_dev, vol) = volume(256);
    let sector = new_file(&vol);

    let a = vol.open_inode(sector).unwrap();
    let b = vol.open_inode(sector).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(2, a.open_count());
    assert_eq!(1, vol.open_inodes());

    let c = b.reopen();
    assert_eq!(3, a.open_count());

    vol.close_inode(a);
    vol.close_inode(b);
    assert_eq!(1, vol.open_inodes());
    vol.close_inode(c);
    assert_eq!(0, vol.open_inodes());
}

#[test]
fn ten_thousand_bytes_round_trip() {
    let (_dev, vol) = volume(256);
    let inode = vol.open_inode(new_file(&vol)).unwrap();
    let data = pattern(10_000);

    assert_eq!(10_000, inode.write_at(&vol, 0, &data));
    assert_eq!(10_000, inode.length());

    let mut back = vec![0; 10_000];
    assert_eq!(10_000, inode.read_at(&vol, 0, &mut back));
    assert_eq!(data, back);
    vol.close_inode(inode);
}

#[test]
fn growth_through_the_indirect_region() {
    let (_dev, vol) = volume(1024);
    let inode = vol.open_inode(new_file(&vol)).unwrap();
    let data = pattern(200 * SECTOR_SIZE + 17);

    assert_eq!(data.len(), inode.write_at(&vol, 0, &data));
    // 201 个数据扇区加一级间接表
    assert_eq!(202, inode.allocated_sectors(&vol));

    let mut back = vec![0; data.len()];
    assert_eq!(data.len(), inode.read_at(&vol, 0, &mut back));
    assert_eq!(data, back);
    vol.close_inode(inode);
}

#[test]
fn growth_into_the_double_indirect_region() {
    let (_dev, vol) = volume(1024);
    let inode = vol.open_inode(new_file(&vol)).unwrap();
    let offset = INDIRECT_CAP * SECTOR_SIZE + 700;

    assert_eq!(4, inode.write_at(&vol, offset, b"deep"));
    assert_eq!(offset + 4, inode.length());
    // 外层表、内层表、数据
    assert_eq!(3, inode.allocated_sectors(&vol));

    let mut back = [0; 4];
    assert_eq!(4, inode.read_at(&vol, offset, &mut back));
    assert_eq!(b"deep", &back);
    vol.close_inode(inode);
}

#[test]
fn gap_reads_as_zeros_and_gets_allocated() {
    let (_dev, vol) = volume(1024);
    let inode = vol.open_inode(new_file(&vol)).unwrap();
    let offset = 130 * SECTOR_SIZE + 3;

    inode.write_at(&vol, offset, b"tail");
    assert_eq!(offset + 4, inode.length());
    let before = inode.allocated_sectors(&vol);

    let mut gap = vec![0xFF; offset];
    assert_eq!(offset, inode.read_at(&vol, 0, &mut gap));
    assert!(gap.iter().all(|&b| b == 0));
    assert_eq!(before + 130, inode.allocated_sectors(&vol));
    vol.close_inode(inode);
}

#[test]
fn reads_stop_at_the_end_of_file() {
    let (_dev, vol) = volume(256);
    let inode = vol.open_inode(new_file(&vol)).unwrap();
    inode.write_at(&vol, 0, &pattern(100));

    let mut buf = [0; 100];
    assert_eq!(50, inode.read_at(&vol, 50, &mut buf));
    assert_eq!(0, inode.read_at(&vol, 100, &mut buf));
    assert_eq!(0, inode.read_at(&vol, 4000, &mut buf));
    assert_eq!(100, inode.read_at(&vol, 0, &mut buf));
    vol.close_inode(inode);
}

#[test]
fn length_is_persisted_after_every_write() {
    let (dev, vol) = volume(256);
    let sector = new_file(&vol);
    let inode = vol.open_inode(sector).unwrap();

    inode.write_at(&vol, 1000, b"x");
    assert_eq!(1001, record(&dev, sector).len());
    inode.write_at(&vol, 0, b"shorter");
    assert_eq!(1001, record(&dev, sector).len());
    vol.close_inode(inode);
}

#[test]
fn denied_writes_write_nothing() {
    let (_dev, vol) = volume(256);
    let inode = vol.open_inode(new_file(&vol)).unwrap();

    inode.deny_write();
    assert_eq!(0, inode.write_at(&vol, 0, b"nope"));
    assert_eq!(0, inode.length());

    inode.allow_write();
    assert_eq!(4, inode.write_at(&vol, 0, b"okay"));
    vol.close_inode(inode);
}

#[test]
fn denials_cannot_outnumber_openers() {
    let (_dev, vol) = volume(256);
    let inode = vol.open_inode(new_file(&vol)).unwrap();
    assert!(inode.deny_write());
    assert!(!inode.deny_write());
    assert_eq!(1, inode.deny_write_count());

    inode.allow_write();
    inode.allow_write();
    assert_eq!(0, inode.deny_write_count());
    assert_eq!(2, inode.write_at(&vol, 0, b"ok"));
    vol.close_inode(inode);
}

#[test]
fn removal_waits_for_the_last_close() {
    let (_dev, vol) = volume(1024);
    let free = vol.free_map().free_count();
    let sector = new_file(&vol);

    let a = vol.open_inode(sector).unwrap();
    let b = vol.open_inode(sector).unwrap();
    a.write_at(&vol, 0, &pattern(140 * SECTOR_SIZE));
    a.remove();
    assert_eq!(Lifecycle::PendingRemoval, b.lifecycle());

    vol.close_inode(a);
    assert!(vol.free_map().is_used(sector));
    let mut buf = [0; 16];
    assert_eq!(16, b.read_at(&vol, 0, &mut buf));

    vol.close_inode(Arc::clone(&b));
    assert_eq!(Lifecycle::Reclaimed, b.lifecycle());
    assert!(!vol.free_map().is_used(sector));
    assert_eq!(free, vol.free_map().free_count());
}

#[test]
fn closing_without_removal_keeps_the_data() {
    let (_dev, vol) = volume(256);
    let sector = new_file(&vol);

    let inode = vol.open_inode(sector).unwrap();
    inode.write_at(&vol, 0, b"persist");
    vol.close_inode(inode);

    let inode = vol.open_inode(sector).unwrap();
    let mut buf = [0; 7];
    assert_eq!(7, inode.read_at(&vol, 0, &mut buf));
    assert_eq!(b"persist", &buf);
    vol.close_inode(inode);
}

#[test]
fn sectors_off_the_device_are_not_in_use() {
    let (_dev, vol) = volume(256);
    assert!(vol.free_map().is_used(sfs::SUPER_BLOCK_SECTOR));
    assert!(!vol.free_map().is_used(SectorId::new(256)));
    assert!(!vol.free_map().is_used(SectorId::INVALID));
}

#[test]
fn sector_without_an_inode_is_rejected() {
    let (_dev, vol) = volume(256);
    let sector = vol.allocate(1).unwrap();
    assert_eq!(Some(Error::Corrupted), vol.open_inode(sector).err());
    assert_eq!(0, vol.open_inodes());
}

#[test]
fn parent_link_is_persisted() {
    let (dev, vol) = volume(256);
    let sector = new_file(&vol);
    assert_eq!(sfs::ROOT_DIR_SECTOR, record(&dev, sector).parent());

    vol.set_parent(sector, SectorId::new(77)).unwrap();
    assert_eq!(SectorId::new(77), record(&dev, sector).parent());

    let inode = vol.open_inode(sector).unwrap();
    assert_eq!(SectorId::new(77), inode.parent());
    vol.close_inode(inode);
}

#[test]
fn writes_stop_at_the_largest_file() {
    let (_dev, vol) = volume(256);
    let inode = vol.open_inode(new_file(&vol)).unwrap();

    assert_eq!(1, inode.write_at(&vol, MAX_FILE_SIZE - 1, &[1, 2]));
    assert_eq!(MAX_FILE_SIZE, inode.length());
    assert_eq!(0, inode.write_at(&vol, MAX_FILE_SIZE, &[3]));
    vol.close_inode(inode);
}

#[test]
fn writes_beyond_the_largest_file_leave_the_length_alone() {
    let (dev, vol) = volume(256);
    let sector = new_file(&vol);
    let inode = vol.open_inode(sector).unwrap();
    let free = vol.free_map().free_count();

    assert_eq!(0, inode.write_at(&vol, MAX_FILE_SIZE + 10, &[1]));
    assert_eq!(0, inode.write_at(&vol, usize::MAX, &[1, 2]));
    assert_eq!(0, inode.length());
    assert_eq!(0, record(&dev, sector).len());
    assert_eq!(free, vol.free_map().free_count());
    vol.close_inode(inode);
}

#[test]
fn failed_write_past_the_end_keeps_the_old_length() {
    let (dev, vol) = volume(64);
    let sector = new_file(&vol);
    let inode = vol.open_inode(sector).unwrap();
    assert_eq!(3, inode.write_at(&vol, 0, b"abc"));

    while vol.allocate(1).is_ok() {}
    assert_eq!(0, inode.write_at(&vol, 10 * SECTOR_SIZE, b"x"));
    assert_eq!(3, inode.length());
    assert_eq!(3, record(&dev, sector).len());
    vol.close_inode(inode);
}

#[test]
fn full_device_cuts_the_write_short() {
    let (_dev, vol) = volume(64);
    let inode = vol.open_inode(new_file(&vol)).unwrap();
    let free = vol.free_map().free_count();

    let written = inode.write_at(&vol, 0, &pattern(80 * SECTOR_SIZE));
    assert_eq!(free * SECTOR_SIZE, written);
    assert_eq!(written, inode.length());
    assert_eq!(0, vol.free_map().free_count());
    vol.close_inode(inode);
}
