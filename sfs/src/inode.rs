//! # 索引节点层
//!
//! 每个扇区至多对应一个 [`Inode`]；[`InodeTable`] 把同一实例交给每个打开者并计数。
//! 标记删除的索引节点在最后一个打开者关闭前保留其扇区。

use alloc::collections::BTreeMap;
use alloc::sync::Arc;

use spin::{Mutex, MutexGuard};
use vfs::Error;

use crate::free_map::SectorAllocator;
use crate::index;
use crate::layout::{DOUBLE_INDIRECT_CAP, DiskInode};
use crate::{SECTOR_SIZE, SectorId, Volume};

/// 索引节点可寻址的最大字节数
pub const MAX_FILE_SIZE: usize = DOUBLE_INDIRECT_CAP * SECTOR_SIZE;

/// 索引节点的删除状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    /// 已断开链接，最后一次关闭时归还扇区
    PendingRemoval,
    /// 扇区已释放，实例失效
    Reclaimed,
}

#[derive(Debug)]
pub struct Inode {
    sector: SectorId,
    inner: Mutex<InodeInner>,
    /// 目录先查找后修改的整个过程中持有
    entries: Mutex<()>,
}

#[derive(Debug)]
struct InodeInner {
    open_count: usize,
    deny_write_count: usize,
    lifecycle: Lifecycle,
    disk: DiskInode,
}

impl Inode {
    /// 索引节点所在扇区，兼作索引节点号
    #[inline]
    pub fn inumber(&self) -> SectorId {
        self.sector
    }

    /// 为已打开的索引节点再登记一个打开者
    pub fn reopen(self: &Arc<Self>) -> Arc<Self> {
        let mut inner = self.inner.lock();
        debug_assert!(inner.open_count > 0);
        inner.open_count += 1;
        Arc::clone(self)
    }

    /// 标记在最后一次关闭时删除
    pub fn remove(&self) {
        let mut inner = self.inner.lock();
        if inner.lifecycle == Lifecycle::Active {
            inner.lifecycle = Lifecycle::PendingRemoval;
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.lock().lifecycle
    }

    #[inline]
    pub fn is_removed(&self) -> bool {
        self.lifecycle() != Lifecycle::Active
    }

    pub fn open_count(&self) -> usize {
        self.inner.lock().open_count
    }

    pub fn deny_write_count(&self) -> usize {
        self.inner.lock().deny_write_count
    }

    pub fn length(&self) -> usize {
        self.inner.lock().disk.len()
    }

    pub fn is_dir(&self) -> bool {
        self.inner.lock().disk.is_dir()
    }

    pub fn parent(&self) -> SectorId {
        self.inner.lock().disk.parent()
    }

    /// 指向上一级目录并落盘
    pub fn set_parent(&self, vol: &Volume, parent: SectorId) {
        let mut inner = self.inner.lock();
        inner.disk.parent = parent.into();
        self.persist(vol, &inner.disk);
    }

    /// 拒绝写入，直到对应的 [`Inode::allow_write`]。
    ///
    /// 每个打开者至多拒绝一次；超出打开者个数的拒绝被忽略并返回 `false`。
    pub fn deny_write(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.deny_write_count >= inner.open_count {
            log::warn!("inode {}: more write denials than openers", self.sector);
            return false;
        }
        inner.deny_write_count += 1;
        true
    }

    pub fn allow_write(&self) {
        let mut inner = self.inner.lock();
        match inner.deny_write_count.checked_sub(1) {
            Some(count) => inner.deny_write_count = count,
            None => log::warn!("inode {}: allow_write without a denial", self.sector),
        }
    }

    /// 串行化对目录项的修改
    pub(crate) fn lock_entries(&self) -> MutexGuard<'_, ()> {
        self.entries.lock()
    }

    /// 当前分配给该索引节点的扇区数，含索引扇区
    pub fn allocated_sectors(&self, vol: &Volume) -> usize {
        index::collect(&self.inner.lock().disk, vol.device().as_ref()).len()
    }

    /// 从 `offset` 读入 `buf`，读到文件末尾为止。
    ///
    /// 文件内的空洞顺带分配扇区，读出全零。
    pub fn read_at(&self, vol: &Volume, offset: usize, buf: &mut [u8]) -> usize {
        let mut inner = self.inner.lock();
        let length = inner.disk.len();
        let mut offset = offset;
        let mut done = 0;

        while done < buf.len() && offset < length {
            let sector_offset = offset % SECTOR_SIZE;
            let chunk = (buf.len() - done)
                .min(length - offset)
                .min(SECTOR_SIZE - sector_offset);

            let sector = match self.translate(vol, &mut inner.disk, offset) {
                Ok(sector) => sector,
                Err(err) => {
                    log::warn!("inode {}: read stopped at {offset}: {err}", self.sector);
                    break;
                }
            };
            vol.cache()
                .read(sector, sector_offset, &mut buf[done..done + chunk]);

            offset += chunk;
            done += chunk;
        }

        self.persist(vol, &inner.disk);
        done
    }

    /// 在 `offset` 处写入 `buf`，写过文件末尾时扩展文件。
    /// 写入被拒绝或 `offset` 不小于 [`MAX_FILE_SIZE`] 时返回 0。
    pub fn write_at(&self, vol: &Volume, offset: usize, buf: &[u8]) -> usize {
        let mut inner = self.inner.lock();
        if inner.deny_write_count > 0 || offset >= MAX_FILE_SIZE {
            return 0;
        }

        let old_length = inner.disk.len();
        let end = offset.saturating_add(buf.len()).min(MAX_FILE_SIZE);
        if end > old_length {
            inner.disk.length = end as i32;
        }

        let mut offset = offset;
        let mut done = 0;
        while offset < end {
            let sector_offset = offset % SECTOR_SIZE;
            let chunk = (end - offset).min(SECTOR_SIZE - sector_offset);

            let sector = match self.translate(vol, &mut inner.disk, offset) {
                Ok(sector) => sector,
                Err(err) => {
                    log::warn!("inode {}: write stopped at {offset}: {err}", self.sector);
                    // 长度只算真正写下的部分
                    let landed = if done > 0 { offset } else { 0 };
                    inner.disk.length = old_length.max(landed) as i32;
                    break;
                }
            };
            vol.cache()
                .write(sector, sector_offset, &buf[done..done + chunk]);

            offset += chunk;
            done += chunk;
        }

        self.persist(vol, &inner.disk);
        done
    }

    fn translate(
        &self,
        vol: &Volume,
        disk: &mut DiskInode,
        offset: usize,
    ) -> Result<SectorId, Error> {
        index::translate(disk, offset / SECTOR_SIZE, vol.device().as_ref(), vol)
    }

    fn persist(&self, vol: &Volume, disk: &DiskInode) {
        vol.device().write_block(self.sector.block(), disk.as_bytes());
    }
}

/// 当前打开的索引节点，以扇区为键
#[derive(Debug, Default)]
pub(crate) struct InodeTable(Mutex<BTreeMap<SectorId, Arc<Inode>>>);

impl InodeTable {
    pub fn open(&self, vol: &Volume, sector: SectorId) -> Result<Arc<Inode>, Error> {
        let mut table = self.0.lock();
        if let Some(inode) = table.get(&sector) {
            inode.inner.lock().open_count += 1;
            return Ok(Arc::clone(inode));
        }

        let mut buf = [0; SECTOR_SIZE];
        vol.device().read_block(sector.block(), &mut buf);
        let disk = DiskInode::from_bytes(&buf);
        if !disk.is_valid() {
            log::error!("sector {sector} does not hold an inode");
            return Err(Error::Corrupted);
        }

        let inode = Arc::new(Inode {
            sector,
            inner: Mutex::new(InodeInner {
                open_count: 1,
                deny_write_count: 0,
                lifecycle: Lifecycle::Active,
                disk,
            }),
            entries: Mutex::new(()),
        });
        table.insert(sector, Arc::clone(&inode));
        Ok(inode)
    }

    /// 减少一个打开者。已删除的索引节点在最后一次关闭时
    /// 先归还全部数据与索引扇区，再归还自身所在扇区。
    pub fn close(&self, vol: &Volume, inode: Arc<Inode>) {
        let mut table = self.0.lock();
        let mut inner = inode.inner.lock();
        assert!(inner.open_count > 0, "inode {} closed too often", inode.sector);

        inner.open_count -= 1;
        if inner.open_count > 0 {
            return;
        }
        table.remove(&inode.sector);
        drop(table);

        if inner.lifecycle == Lifecycle::PendingRemoval {
            let released = index::release_all(&mut inner.disk, vol.device().as_ref(), vol);
            vol.release(inode.sector, 1);
            inner.lifecycle = Lifecycle::Reclaimed;
            log::debug!("inode {} reclaimed with {released} sector(s)", inode.sector);
        }
    }

    /// 打开的索引节点个数
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }
}
