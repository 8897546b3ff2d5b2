use std::io;

use thiserror::Error;

/// Error parsing or building a DNS packet
#[derive(Debug, Error)]
pub enum Error {
    #[error("packet is smaller than header size")]
    HeaderTooShort,
    #[error("packet has incomplete data")]
    UnexpectedEOF,
    #[error("wrong (too short or too long) size of RDATA")]
    WrongRdataLength,
    #[error("label in domain name has unknown label format")]
    UnknownLabelFormat,
    #[error("compression pointers in domain name form a loop")]
    PointerLoop,
    #[error("domain name is longer than 255 bytes")]
    NameTooLong,
    #[error("label {0:?} is longer than 63 bytes")]
    LabelTooLong(String),
    #[error("RDATA of {0} bytes does not fit in a record")]
    RdataTooLong(usize),
    #[error("too many records in one section")]
    TooManyRecords,
    #[error("failed to write packet: {0}")]
    Io(#[from] io::Error),
}
