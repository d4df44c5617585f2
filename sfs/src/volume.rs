use alloc::sync::Arc;

use block_dev::BlockDevice;
use vfs::Error;

use crate::free_map::SectorAllocator;
use crate::inode::InodeTable;
use crate::layout::{DiskInode, DiskInodeKind, SuperBlock};
use crate::{
    BufferCache, FREE_MAP_START, FreeMap, Inode, SECTOR_SIZE, SUPER_BLOCK_SECTOR, SectorId,
};

/// 挂载的设备，持有空闲位图、块缓存与打开索引节点表。
///
/// 索引节点与索引扇区直接在设备上读写，文件数据经过缓存。
#[derive(Debug)]
pub struct Volume {
    dev: Arc<dyn BlockDevice>,
    cache: BufferCache,
    free_map: FreeMap,
    inodes: InodeTable,
}

impl Volume {
    /// 在整个设备上建立空卷。
    ///
    /// 超级块、根目录扇区与空闲位图扇区被预留；根目录本身留给调用者创建。
    pub fn format(dev: Arc<dyn BlockDevice>) -> Self {
        let total_sectors = dev.num_blocks().min(u32::MAX as usize);
        let map_sectors = FreeMap::sectors_for(total_sectors);
        let reserved = FREE_MAP_START.block() + map_sectors;
        assert!(
            total_sectors > reserved,
            "device of {total_sectors} sectors is too small"
        );

        let super_block = SuperBlock::new(total_sectors as u32, map_sectors as u32);
        dev.write_block(SUPER_BLOCK_SECTOR.block(), &super_block.to_sector());
        let free_map = FreeMap::create(Arc::clone(&dev), FREE_MAP_START, total_sectors, reserved);
        log::info!(
            "formatted {total_sectors} sectors, {} free",
            free_map.free_count()
        );

        Self::assemble(dev, free_map)
    }

    /// 打开由 [`Volume::format`] 写下的卷
    pub fn mount(dev: Arc<dyn BlockDevice>) -> Self {
        let mut buf = [0; SECTOR_SIZE];
        dev.read_block(SUPER_BLOCK_SECTOR.block(), &mut buf);
        let super_block = SuperBlock::from_sector(&buf);
        assert!(super_block.is_valid(), "device carries no file system");

        let total_sectors = super_block.total_sectors as usize;
        assert_eq!(
            FreeMap::sectors_for(total_sectors),
            super_block.free_map_sectors as usize,
            "super block disagrees with its free map"
        );
        let free_map = FreeMap::open(Arc::clone(&dev), FREE_MAP_START, total_sectors);
        log::info!(
            "mounted {total_sectors} sectors, {} free",
            free_map.free_count()
        );

        Self::assemble(dev, free_map)
    }

    fn assemble(dev: Arc<dyn BlockDevice>, free_map: FreeMap) -> Self {
        Self {
            cache: BufferCache::new(Arc::clone(&dev)),
            dev,
            free_map,
            inodes: InodeTable::default(),
        }
    }

    #[inline]
    pub fn device(&self) -> &Arc<dyn BlockDevice> {
        &self.dev
    }

    #[inline]
    pub fn cache(&self) -> &BufferCache {
        &self.cache
    }

    #[inline]
    pub fn free_map(&self) -> &FreeMap {
        &self.free_map
    }

    /// 在 `sector` 写入长为 `length` 字节的新索引节点。
    ///
    /// 不分配数据扇区，首次访问时才出现。
    pub fn create_inode(&self, sector: SectorId, length: usize, kind: DiskInodeKind) {
        let disk = DiskInode::new(length as i32, kind);
        self.dev.write_block(sector.block(), disk.as_bytes());
    }

    /// 打开存放在 `sector` 的索引节点，已打开则共享实例
    pub fn open_inode(&self, sector: SectorId) -> Result<Arc<Inode>, Error> {
        self.inodes.open(self, sector)
    }

    pub fn close_inode(&self, inode: Arc<Inode>) {
        self.inodes.close(self, inode);
    }

    /// 打开 `inode` 的上一级目录
    pub fn open_parent(&self, inode: &Inode) -> Result<Arc<Inode>, Error> {
        self.open_inode(inode.parent())
    }

    /// 把 `parent` 记为 `sector` 处索引节点的上一级目录
    pub fn set_parent(&self, sector: SectorId, parent: SectorId) -> Result<(), Error> {
        let inode = self.open_inode(sector)?;
        inode.set_parent(self, parent);
        self.close_inode(inode);
        Ok(())
    }

    /// 当前打开的索引节点个数
    pub fn open_inodes(&self) -> usize {
        self.inodes.len()
    }

    /// 把缓存中的脏扇区全部写回设备
    pub fn sync(&self) {
        self.cache.sync_all();
    }
}

impl SectorAllocator for Volume {
    fn allocate(&self, count: usize) -> Result<SectorId, Error> {
        self.free_map.allocate(count)
    }

    fn release(&self, sector: SectorId, count: usize) {
        // 旧缓冲区不得活过扇区的归属
        for i in 0..count {
            self.cache.invalidate(sector + i as u32);
        }
        self.free_map.release(sector, count);
    }
}
