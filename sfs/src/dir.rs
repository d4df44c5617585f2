//! # 目录
//!
//! 目录是数据为 [`DirEntry`] 槽位数组的索引节点。
//! 每个目录都有指向自身的 `.` 与指向上一级的 `..`；名字为空的槽位是空闲的。

use alloc::string::{String, ToString};
use alloc::sync::Arc;

use vfs::{DirEntryType, Error};

use crate::layout::{DirEntry, DiskInodeKind, NAME_MAX};
use crate::{Inode, SectorId, Volume};

pub const SELF_NAME: &str = ".";
pub const PARENT_NAME: &str = "..";

/// 在 `sector` 写入可容纳 `entry_count` 项的空目录，并挂到 `parent` 之下
pub fn create(
    vol: &Arc<Volume>,
    sector: SectorId,
    entry_count: usize,
    parent: SectorId,
) -> Result<(), Error> {
    vol.create_inode(sector, entry_count * DirEntry::SIZE, DiskInodeKind::Directory);

    let dir = Dir::open(Arc::clone(vol), vol.open_inode(sector)?)?;
    dir.inode.set_parent(vol, parent);
    dir.add(SELF_NAME, sector)?;
    dir.add(PARENT_NAME, parent)?;
    Ok(())
}

/// 能放入目录的名字
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= NAME_MAX && !name.contains('/')
}

/// 带读游标的已打开目录，析构时关闭
#[derive(Debug)]
pub struct Dir {
    vol: Arc<Volume>,
    inode: Arc<Inode>,
    /// [`Dir::read_next`] 下一次查看的字节偏移
    pos: usize,
}

impl Dir {
    /// 接管 `inode` 的一个打开者，`inode` 必须是目录
    pub fn open(vol: Arc<Volume>, inode: Arc<Inode>) -> Result<Self, Error> {
        if !inode.is_dir() {
            vol.close_inode(inode);
            return Err(Error::NotADirectory);
        }
        Ok(Self { vol, inode, pos: 0 })
    }

    pub fn open_root(vol: Arc<Volume>) -> Result<Self, Error> {
        let inode = vol.open_inode(crate::ROOT_DIR_SECTOR)?;
        Self::open(vol, inode)
    }

    /// 同一目录的另一个句柄，游标独立
    pub fn reopen(&self) -> Self {
        Self {
            vol: Arc::clone(&self.vol),
            inode: self.inode.reopen(),
            pos: 0,
        }
    }

    #[inline]
    pub fn close(self) {}

    #[inline]
    pub fn inode(&self) -> &Arc<Inode> {
        &self.inode
    }

    #[inline]
    pub fn inode_number(&self) -> SectorId {
        self.inode.inumber()
    }

    #[inline]
    pub fn volume(&self) -> &Arc<Volume> {
        &self.vol
    }

    /// 名为 `name` 的索引节点所在扇区
    pub fn lookup(&self, name: &str) -> Option<SectorId> {
        self.find(name).map(|(_, entry)| entry.sector())
    }

    /// 打开名为 `name` 的索引节点
    pub fn open_entry(&self, name: &str) -> Result<Arc<Inode>, Error> {
        let sector = self.lookup(name).ok_or(Error::NotFound)?;
        self.vol.open_inode(sector)
    }

    /// 打开上一级目录
    pub fn open_parent(&self) -> Result<Self, Error> {
        let parent = self.vol.open_parent(&self.inode)?;
        Self::open(Arc::clone(&self.vol), parent)
    }

    /// 把 `name` 链接到 `sector` 处的索引节点。
    ///
    /// 已从上一级断开的目录不再接受新目录项。
    pub fn add(&self, name: &str, sector: SectorId) -> Result<(), Error> {
        if !is_valid_name(name) {
            return Err(Error::InvalidName);
        }

        let _entries = self.inode.lock_entries();
        if self.inode.is_removed() {
            return Err(Error::NotFound);
        }
        if self.find(name).is_some() {
            return Err(Error::AlreadyExists);
        }

        let offset = self.find_or_new_slot();
        let entry = DirEntry::new(name, sector);
        if self.inode.write_at(&self.vol, offset, entry.as_bytes()) != DirEntry::SIZE {
            return Err(Error::NoSpace);
        }
        Ok(())
    }

    /// 断开 `name` 并标记其索引节点待删除。
    ///
    /// 目录只有在仅剩 `.` 与 `..` 时才能删除。
    pub fn remove(&self, name: &str) -> Result<(), Error> {
        if name == SELF_NAME || name == PARENT_NAME {
            return Err(Error::InvalidName);
        }

        let _entries = self.inode.lock_entries();
        let (offset, entry) = self.find(name).ok_or(Error::NotFound)?;

        let inode = self.vol.open_inode(entry.sector())?;
        if inode.is_dir() {
            let target = Dir::open(Arc::clone(&self.vol), inode)?;
            // 先锁父目录再锁子目录，期间目标不会增加目录项
            let _target_entries = target.inode.lock_entries();
            if !target.is_empty() {
                return Err(Error::DirectoryNotEmpty);
            }
            self.erase(offset);
            target.inode.remove();
        } else {
            self.erase(offset);
            inode.remove();
            self.vol.close_inode(inode);
        }

        log::debug!("unlinked {name} from {}", self.inode_number());
        Ok(())
    }

    /// 目录是否仅剩 `.` 与 `..`
    pub fn is_empty(&self) -> bool {
        self.entries()
            .all(|(_, entry)| entry.name() == SELF_NAME || entry.name() == PARENT_NAME)
    }

    /// 游标后的下一项，跳过 `.` 与 `..`
    pub fn read_next(&mut self) -> Option<vfs::DirEntry> {
        let length = self.inode.length();
        let mut entry = DirEntry::default();

        while self.pos < length {
            let read = self
                .inode
                .read_at(&self.vol, self.pos, entry.as_bytes_mut());
            self.pos += DirEntry::SIZE;
            if read != DirEntry::SIZE {
                break;
            }

            let name = entry.name();
            if entry.is_free() || name == SELF_NAME || name == PARENT_NAME {
                continue;
            }

            let ty = match self.vol.open_inode(entry.sector()) {
                Ok(inode) => {
                    let ty = if inode.is_dir() {
                        DirEntryType::Directory
                    } else {
                        DirEntryType::Regular
                    };
                    self.vol.close_inode(inode);
                    ty
                }
                Err(_) => DirEntryType::Regular,
            };

            return Some(vfs::DirEntry {
                inode: entry.sector().into(),
                ty,
                name: name.to_string(),
            });
        }

        None
    }

    /// 下一项的名字，见 [`Dir::read_next`]
    pub fn read_name(&mut self) -> Option<String> {
        self.read_next().map(|entry| entry.name)
    }

    /// 游标回到第一项
    pub fn rewind(&mut self) {
        self.pos = 0;
    }
}

impl Dir {
    /// 已用槽位及其字节偏移
    fn entries(&self) -> impl Iterator<Item = (usize, DirEntry)> + '_ {
        (0..self.inode.length())
            .step_by(DirEntry::SIZE)
            .filter_map(|offset| {
                let mut entry = DirEntry::default();
                let read = self.inode.read_at(&self.vol, offset, entry.as_bytes_mut());
                (read == DirEntry::SIZE && !entry.is_free()).then_some((offset, entry))
            })
    }

    fn find(&self, name: &str) -> Option<(usize, DirEntry)> {
        self.entries().find(|(_, entry)| entry.name() == name)
    }

    /// 第一个空槽位，没有则取末尾之后
    fn find_or_new_slot(&self) -> usize {
        let length = self.inode.length();
        let mut entry = DirEntry::default();

        for offset in (0..length).step_by(DirEntry::SIZE) {
            let read = self.inode.read_at(&self.vol, offset, entry.as_bytes_mut());
            if read == DirEntry::SIZE && entry.is_free() {
                return offset;
            }
        }

        length.next_multiple_of(DirEntry::SIZE)
    }

    fn erase(&self, offset: usize) {
        self.inode.write_at(&self.vol, offset, &[0; DirEntry::SIZE]);
    }
}

impl Drop for Dir {
    fn drop(&mut self) {
        self.vol.close_inode(Arc::clone(&self.inode));
    }
}
