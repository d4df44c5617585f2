//! 文件系统的宿主机侧：以普通文件为后端的磁盘镜像，
//! 以及把宿主机目录树复制进镜像的打包器。

#[cfg(test)]
mod tests;

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use block_dev::BlockDevice;
use sfs::{Cwd, FileSystem, SECTOR_SIZE};

#[derive(Debug)]
pub struct BlockFile {
    file: Mutex<File>,
    sectors: usize,
}

impl BlockFile {
    /// 把 `file` 当作磁盘，扇区数取其所含的整扇区数
    pub fn new(file: File) -> io::Result<Self> {
        let sectors = file.metadata()?.len() as usize / SECTOR_SIZE;
        Ok(Self {
            file: Mutex::new(file),
            sectors,
        })
    }
}

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start((block_id * SECTOR_SIZE) as u64))
            .expect("seeking error");
        file.read_exact(buf).expect("not a complete block!");
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start((block_id * SECTOR_SIZE) as u64))
            .expect("seeking error");
        file.write_all(buf).expect("not a complete block!");
    }

    fn num_blocks(&self) -> usize {
        self.sectors
    }
}

/// [`pack`] 复制的内容
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Packed {
    pub files: usize,
    pub dirs: usize,
    pub bytes: usize,
}

/// 把 `source` 下的目录树复制到 `fs` 中已存在的目录 `target`
pub fn pack(fs: &FileSystem, source: &Path, target: &str) -> io::Result<Packed> {
    let cwd = Cwd::root();
    let mut packed = Packed::default();
    pack_dir(fs, &cwd, source, target.trim_end_matches('/'), &mut packed)?;
    Ok(packed)
}

fn pack_dir(
    fs: &FileSystem,
    cwd: &Cwd,
    source: &Path,
    target: &str,
    packed: &mut Packed,
) -> io::Result<()> {
    let mut entries = fs::read_dir(source)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            log::warn!("skipping {:?}: not UTF-8", entry.path());
            continue;
        };
        let path = format!("{target}/{name}");

        if entry.file_type()?.is_dir() {
            fs.make_dir(cwd, &path).map_err(|err| fs_error(&path, err))?;
            packed.dirs += 1;
            log::info!("dir {path}");
            pack_dir(fs, cwd, &entry.path(), &path, packed)?;
        } else {
            let mut data = Vec::new();
            File::open(entry.path())?.read_to_end(&mut data)?;
            fs.create(cwd, &path, 0, false)
                .map_err(|err| fs_error(&path, err))?;

            let mut file = fs
                .open_file(cwd, &path)
                .map_err(|err| fs_error(&path, err))?;
            let written = file.write(&data);
            if written != data.len() {
                return Err(io::Error::other(format!(
                    "{path}: only {written} of {} bytes fit",
                    data.len()
                )));
            }

            packed.files += 1;
            packed.bytes += written;
            log::info!("file {path}, {written} bytes");
        }
    }

    Ok(())
}

fn fs_error(path: &str, err: vfs::Error) -> io::Error {
    io::Error::other(format!("{path}: {err}"))
}
