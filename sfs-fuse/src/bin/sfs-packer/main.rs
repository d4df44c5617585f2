mod cli;

use std::fs::OpenOptions;
use std::io;
use std::sync::Arc;

use block_dev::BlockDevice;
use clap::Parser;
use cli::Cli;
use sfs::{FileSystem, SECTOR_SIZE};
use sfs_fuse::BlockFile;

fn main() -> io::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    println!("source={:?}\nout={:?}", cli.source, cli.out);

    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&cli.out)?;
    fd.set_len((cli.sectors * SECTOR_SIZE) as u64)?;

    let block_dev: Arc<dyn BlockDevice> = Arc::new(BlockFile::new(fd)?);
    let fs = FileSystem::init(block_dev, true);

    let packed = sfs_fuse::pack(&fs, &cli.source, "/")?;
    log::info!(
        "{} free sectors left",
        fs.volume().free_map().free_count()
    );
    fs.shutdown();

    println!(
        "packed {} file(s) and {} dir(s), {} bytes",
        packed.files, packed.dirs, packed.bytes
    );
    Ok(())
}
