//! # 块设备接口层
//!
//! 块设备以定长的**扇区**为单位存储数据，扇区按编号寻址；
//! [`BlockDevice`] 是对逐扇区读写的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! 所有调用都是同步的：传输完成后才返回。

#![no_std]

use core::any::Any;
use core::fmt::Debug;

pub trait BlockDevice: Debug + Send + Sync + Any {
    /// 把扇区 `block_id` 读入恰好一个扇区长的 `buf`
    fn read_block(&self, block_id: usize, buf: &mut [u8]);

    /// 把恰好一个扇区长的 `buf` 写入扇区 `block_id`
    fn write_block(&self, block_id: usize, buf: &[u8]);

    /// 可寻址的扇区数
    fn num_blocks(&self) -> usize;
}
