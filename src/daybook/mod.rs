use std::fmt::Display;

use thiserror::Error;

pub mod fields;
pub mod tags;
pub mod tree;
pub mod voucher;


pub use tree::{Document, Node, NodeId};
pub use voucher::{collect_allocations, locate_vouchers, Allocation, CsvRow, VoucherFields};

#[derive(Debug, PartialEq, Error)]
pub enum XmlError {
    #[error("{message} (at byte {position})")]
    Syntax { position: u64, message: String },
    #[error("no root element")]
    NoRootElement,
    #[error("element <{0}> is never closed")]
    UnclosedElement(String),
    #[error("content after the root element (at byte {0})")]
    TrailingContent(u64),
}

impl XmlError {
    pub(crate) fn syntax(position: u64, err: impl Display) -> XmlError {
        XmlError::Syntax {
            position,
            message: err.to_string(),
        }
    }
}
