use alloc::sync::Arc;

use crate::{Inode, SectorId, Volume};

/// 带读写位置的已打开普通文件，析构时关闭
#[derive(Debug)]
pub struct File {
    vol: Arc<Volume>,
    inode: Arc<Inode>,
    pos: usize,
    /// 本句柄是否持有索引节点的一次写拒绝
    deny_write: bool,
}

impl File {
    /// 接管 `inode` 的一个打开者
    pub fn open(vol: Arc<Volume>, inode: Arc<Inode>) -> Self {
        Self {
            vol,
            inode,
            pos: 0,
            deny_write: false,
        }
    }

    /// 同一索引节点的另一个句柄，位置在开头
    pub fn reopen(&self) -> Self {
        Self::open(Arc::clone(&self.vol), self.inode.reopen())
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

    /// 从当前位置读取，并前移读到的字节数
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let read = self.read_at(buf, self.pos);
        self.pos += read;
        read
    }

    /// 在当前位置写入，并前移写下的字节数
    pub fn write(&mut self, buf: &[u8]) -> usize {
        let written = self.write_at(buf, self.pos);
        self.pos += written;
        written
    }

    /// 在 `offset` 处读取，不动位置
    pub fn read_at(&self, buf: &mut [u8], offset: usize) -> usize {
        self.inode.read_at(&self.vol, offset, buf)
    }

    /// 在 `offset` 处写入，不动位置
    pub fn write_at(&self, buf: &[u8], offset: usize) -> usize {
        self.inode.write_at(&self.vol, offset, buf)
    }

    /// 移动位置，可越过文件末尾
    #[inline]
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    #[inline]
    pub fn tell(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.inode.length()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 拒绝经由任何句柄写入该索引节点，直到本句柄重新允许或关闭
    pub fn deny_write(&mut self) {
        if !self.deny_write {
            self.deny_write = self.inode.deny_write();
        }
    }

    pub fn allow_write(&mut self) {
        if self.deny_write {
            self.deny_write = false;
            self.inode.allow_write();
        }
    }
}

impl Drop for File {
    fn drop(&mut self) {
        self.allow_write();
        self.vol.close_inode(Arc::clone(&self.inode));
    }
}
