//! # 基于路径的操作
//!
//! 相对路径从调用者的 [`Cwd`] 出发，绝对路径从根目录出发。
//! 除最后一个分量外都必须是目录；最后一个分量是操作的对象。

use alloc::string::String;
use alloc::sync::Arc;

use block_dev::BlockDevice;
use vfs::{DirEntryType, Error, Stat};

use crate::dir::{self, PARENT_NAME, SELF_NAME};
use crate::free_map::SectorAllocator;
use crate::layout::{DirEntry, DiskInodeKind};
use crate::path::Path;
use crate::{
    DIR_INITIAL_ENTRIES, Dir, File, Inode, ROOT_DIR_SECTOR, SECTOR_SIZE, SectorId, Volume,
};

#[derive(Debug)]
pub struct FileSystem {
    vol: Arc<Volume>,
}

/// 相对路径的起点，未设置时为根目录
#[derive(Debug, Default)]
pub struct Cwd(Option<Dir>);

/// [`FileSystem::open`] 在路径处找到的对象
#[derive(Debug)]
pub enum Handle {
    File(File),
    Dir(Dir),
}

impl FileSystem {
    /// 挂载 `dev` 上的卷；`format` 为真时先建立带根目录的空卷。
    ///
    /// # Panics
    ///
    /// 设备上没有卷，或设备太小无法格式化
    pub fn init(dev: Arc<dyn BlockDevice>, format: bool) -> Self {
        if !format {
            return Self {
                vol: Arc::new(Volume::mount(dev)),
            };
        }

        let vol = Arc::new(Volume::format(dev));
        if let Err(err) = dir::create(&vol, ROOT_DIR_SECTOR, DIR_INITIAL_ENTRIES, ROOT_DIR_SECTOR)
        {
            panic!("cannot create the root directory: {err}");
        }
        vol.sync();
        Self { vol }
    }

    /// 全部写回。此时仍打开的索引节点是调用者泄漏的句柄，会被报告。
    pub fn shutdown(self) {
        self.vol.sync();
        let open = self.vol.open_inodes();
        if open > 0 {
            log::warn!("shutting down with {open} inode(s) still open");
        }
        log::info!("file system shut down");
    }

    pub fn sync(&self) {
        self.vol.sync();
    }

    #[inline]
    pub fn volume(&self) -> &Arc<Volume> {
        &self.vol
    }

    pub fn root(&self) -> Result<Dir, Error> {
        Dir::open_root(Arc::clone(&self.vol))
    }

    /// 在 `path` 创建 `size` 字节的文件，`is_dir` 时创建空目录。
    ///
    /// 创建失败时不残留任何已分配扇区。
    pub fn create(&self, cwd: &Cwd, path: &str, size: usize, is_dir: bool) -> Result<(), Error> {
        let name = path.final_component();
        if name == SELF_NAME || name == PARENT_NAME || !dir::is_valid_name(name) {
            return Err(Error::InvalidName);
        }

        let parent = self.resolve(cwd, path)?;
        if parent.inode().is_removed() {
            return Err(Error::NotFound);
        }
        if parent.lookup(name).is_some() {
            return Err(Error::AlreadyExists);
        }

        let sector = self.vol.allocate(1)?;
        let built = if is_dir {
            let entries = size.div_ceil(DirEntry::SIZE);
            dir::create(&self.vol, sector, entries, parent.inode_number())
        } else {
            self.vol.create_inode(sector, size, DiskInodeKind::File);
            Ok(())
        };

        if let Err(err) = built.and_then(|()| parent.add(name, sector)) {
            self.discard(sector);
            return Err(err);
        }

        log::debug!("created {path} at {sector}");
        Ok(())
    }

    /// 在 `path` 创建空目录
    pub fn make_dir(&self, cwd: &Cwd, path: &str) -> Result<(), Error> {
        self.create(cwd, path, DIR_INITIAL_ENTRIES * DirEntry::SIZE, true)
    }

    /// 打开 `path` 所指的对象。
    ///
    /// 以 `.` 或分隔符结尾的路径打开其所到达的目录；
    /// 以 `..` 结尾的打开该目录的上一级。
    pub fn open(&self, cwd: &Cwd, path: &str) -> Result<Handle, Error> {
        if path.is_empty() {
            return Err(Error::NotFound);
        }

        let dir = self.resolve(cwd, path)?;
        let handle = match path.final_component() {
            "" | SELF_NAME => Handle::Dir(dir),
            PARENT_NAME => Handle::Dir(dir.open_parent()?),
            name => {
                let inode = dir.open_entry(name)?;
                self.handle(inode)?
            }
        };
        Ok(handle)
    }

    /// 打开 `path` 处的普通文件
    pub fn open_file(&self, cwd: &Cwd, path: &str) -> Result<File, Error> {
        self.open(cwd, path)?.into_file().ok_or(Error::IsADirectory)
    }

    /// 打开 `path` 处的目录
    pub fn open_dir(&self, cwd: &Cwd, path: &str) -> Result<Dir, Error> {
        self.open(cwd, path)?.into_dir().ok_or(Error::NotADirectory)
    }

    /// 断开 `path`。目录必须仅剩 `.` 与 `..`。
    ///
    /// 没有人再打开目标时回收其扇区。
    pub fn remove(&self, cwd: &Cwd, path: &str) -> Result<(), Error> {
        let name = path.final_component();
        if name.is_empty() || name == SELF_NAME || name == PARENT_NAME {
            return Err(Error::InvalidName);
        }
        self.resolve(cwd, path)?.remove(name)
    }

    /// `dir` 的下一个目录项名，不含 `.` 与 `..`
    pub fn read_dir(&self, dir: &mut Dir) -> Option<String> {
        dir.read_name()
    }

    /// 把 `cwd` 移到 `path` 处的目录
    pub fn change_dir(&self, cwd: &mut Cwd, path: &str) -> Result<(), Error> {
        cwd.0 = Some(self.open_dir(cwd, path)?);
        Ok(())
    }

    #[inline]
    pub fn is_dir(&self, handle: &Handle) -> bool {
        handle.is_dir()
    }

    #[inline]
    pub fn inode_number(&self, handle: &Handle) -> SectorId {
        handle.inode_number()
    }

    pub fn stat(&self, handle: &Handle) -> Stat {
        let inode = handle.inode();
        Stat {
            mode: if inode.is_dir() {
                DirEntryType::Directory
            } else {
                DirEntryType::Regular
            },
            inode: inode.inumber().into(),
            block_size: SECTOR_SIZE as u64,
            blocks: inode.allocated_sectors(&self.vol) as u64,
            size: inode.length() as u64,
        }
    }
}

impl FileSystem {
    /// 走到包含 `path` 最后一个分量的目录
    fn resolve(&self, cwd: &Cwd, path: &str) -> Result<Dir, Error> {
        let mut dir = match &cwd.0 {
            Some(dir) if path.is_relative() => dir.reopen(),
            _ => self.root()?,
        };

        for cmp in path.walk() {
            // 只有末尾的 `..` 才沿上一级链接走
            if cmp == PARENT_NAME {
                return Err(Error::NotFound);
            }
            let inode = dir.open_entry(cmp)?;
            dir = Dir::open(Arc::clone(&self.vol), inode)?;
        }

        Ok(dir)
    }

    fn handle(&self, inode: Arc<Inode>) -> Result<Handle, Error> {
        let vol = Arc::clone(&self.vol);
        if inode.is_dir() {
            Dir::open(vol, inode).map(Handle::Dir)
        } else {
            Ok(Handle::File(File::open(vol, inode)))
        }
    }

    /// 收回未能链接的索引节点所在扇区
    fn discard(&self, sector: SectorId) {
        match self.vol.open_inode(sector) {
            Ok(inode) => {
                inode.remove();
                self.vol.close_inode(inode);
            }
            Err(_) => self.vol.release(sector, 1),
        }
    }
}

impl Cwd {
    /// 相对路径从根目录出发
    #[inline]
    pub fn root() -> Self {
        Self(None)
    }

    #[inline]
    pub fn dir(&self) -> Option<&Dir> {
        self.0.as_ref()
    }

    /// 当前目录的索引节点号，隐式根目录为 `None`
    pub fn inode_number(&self) -> Option<SectorId> {
        self.dir().map(Dir::inode_number)
    }
}

impl Handle {
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Dir(_))
    }

    pub fn inode(&self) -> &Arc<Inode> {
        match self {
            Self::File(file) => file.inode(),
            Self::Dir(dir) => dir.inode(),
        }
    }

    pub fn inode_number(&self) -> SectorId {
        self.inode().inumber()
    }

    pub fn into_file(self) -> Option<File> {
        match self {
            Self::File(file) => Some(file),
            Self::Dir(_) => None,
        }
    }

    pub fn into_dir(self) -> Option<Dir> {
        match self {
            Self::Dir(dir) => Some(dir),
            Self::File(_) => None,
        }
    }
}
