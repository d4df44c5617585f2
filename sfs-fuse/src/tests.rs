use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

use block_dev::BlockDevice;
use sfs::{Cwd, FileSystem, SECTOR_SIZE};

use super::*;

/// 析构时删除的临时目录
struct Scratch(PathBuf);

impl Scratch {
    fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!("sfs-fuse-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&path);
        fs::create_dir_all(&path).unwrap();
        Self(path)
    }

    fn image(&self, sectors: usize) -> Arc<dyn BlockDevice> {
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.0.join("fs.img"))
            .unwrap();
        fd.set_len((sectors * SECTOR_SIZE) as u64).unwrap();
        Arc::new(BlockFile::new(fd).unwrap())
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

#[test]
fn block_file_sizes_itself_from_the_file() {
    let scratch = Scratch::new("size");
    let dev = scratch.image(100);
    assert_eq!(100, dev.num_blocks());

    dev.write_block(42, &[7; SECTOR_SIZE]);
    let mut buf = [0; SECTOR_SIZE];
    dev.read_block(42, &mut buf);
    assert_eq!([7; SECTOR_SIZE], buf);
}

#[test]
fn packed_tree_reads_back_after_remount() {
    let scratch = Scratch::new("pack");
    let source = scratch.0.join("tree");
    fs::create_dir_all(source.join("bin")).unwrap();
    fs::write(source.join("hello.txt"), b"hello, disk").unwrap();
    let big: Vec<u8> = (0..70_000).map(|i| (i % 251) as u8).collect();
    fs::write(source.join("bin").join("big"), &big).unwrap();

    let dev = scratch.image(4096);
    let fs = FileSystem::init(Arc::clone(&dev), true);
    let packed = pack(&fs, &source, "/").unwrap();
    assert_eq!(
        Packed {
            files: 2,
            dirs: 1,
            bytes: 70_000 + 11,
        },
        packed
    );
    fs.shutdown();

    let fs = FileSystem::init(dev, false);
    let cwd = Cwd::root();
    let mut file = fs.open(&cwd, "/bin/big").unwrap().into_file().unwrap();
    let mut back = vec![0; big.len()];
    assert_eq!(big.len(), file.read(&mut back));
    assert_eq!(big, back);

    let mut file = fs.open(&cwd, "/hello.txt").unwrap().into_file().unwrap();
    let mut back = [0; 11];
    file.read(&mut back);
    assert_eq!(b"hello, disk", &back);
}

#[test]
fn names_too_long_for_an_entry_fail_the_pack() {
    let scratch = Scratch::new("long");
    let source = scratch.0.join("tree");
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join("a-file-name-longer-than-an-entry-allows"), b"x").unwrap();

    let fs = FileSystem::init(scratch.image(256), true);
    assert!(pack(&fs, &source, "/").is_err());
}
