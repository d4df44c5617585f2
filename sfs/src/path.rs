//! 以斜杠分隔的路径。
//!
//! 连续的分隔符视为一个。最后一个分量是操作对象，之前的都是途经的目录。

pub trait Path {
    fn is_absolute(&self) -> bool;

    /// 最后一个分量；路径为空或以分隔符结尾时为空
    fn final_component(&self) -> &Self;

    /// 去掉最后一个分量后的路径
    fn directory(&self) -> &Self;

    /// 最后一个分量之前途经的目录分量，不含 `.`
    fn walk(&self) -> impl Iterator<Item = &Self>;

    fn is_relative(&self) -> bool {
        !self.is_absolute()
    }
}

impl Path for str {
    fn is_absolute(&self) -> bool {
        self.starts_with('/')
    }

    fn final_component(&self) -> &Self {
        self.rsplit_once('/').map_or(self, |(_, name)| name)
    }

    fn directory(&self) -> &Self {
        self.rsplit_once('/').map_or("", |(dir, _)| dir)
    }

    fn walk(&self) -> impl Iterator<Item = &Self> {
        self.directory()
            .split('/')
            .filter(|cmp| !cmp.is_empty() && *cmp != ".")
    }
}
