use super::BlockNum;
use std::fmt;

/// `BlockId` names one fixed-size block on disk, a file
/// name plus the position of the block inside the file.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId {
    file_name: String,
    number: BlockNum,
}

impl BlockId {
    pub fn new(file_name: impl Into<String>, number: BlockNum) -> Self {
        Self {
            file_name: file_name.into(),
            number,
        }
    }
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
    pub fn number(&self) -> BlockNum {
        self.number
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[file {}, block {}]", self.file_name, self.number)
    }
}
