use std::{io::Read, sync::Arc};

use crate::{error::Result, schema::SchemaDef};

use super::RecordView;

/// 长度前缀记录流的迭代器。
///
/// # 教案式说明
/// - **意图 (Why)**：日志、批量导出等场景把多条消息按“varint 长度 + 负载”首尾相接写入同一流；
/// - **契约 (What)**：
///   - 每次产出一条记录；流在前缀之前干净结束时迭代结束；
///   - 遇到错误（截断、超限、解码失败、I/O）时产出该错误，随后迭代结束，不再尝试重新同步。
pub struct DelimitedReader<R> {
    def: Arc<SchemaDef>,
    reader: R,
    done: bool,
}

impl<R: Read> DelimitedReader<R> {
    pub fn new(def: Arc<SchemaDef>, reader: R) -> Self {
        Self {
            def,
            reader,
            done: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Iterator for DelimitedReader<R> {
    type Item = Result<RecordView>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match RecordView::from_delimited(Arc::clone(&self.def), &mut self.reader) {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
