use thiserror::Error;

/// Stable numeric codes for store errors. These round-trip through the API
/// and match the on-wire convention of negative return values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    BadIndex           = -1,
    BadParam           = -2,
    BadPointer         = -3,
    Lseek              = -4,
    FileOpen           = -5,
    Writing            = -6,
    Locking            = -7,
    Malloc             = -8,
    Reading            = -9,
    Internal           = -10,
    NotOpen            = -11,
    AlreadyOpen        = -12,
    FileHeader         = -13,
    // -14 is unassigned.
    ValueNotInList     = -15,
    WriteoverValidData = -16,
    OutOfRange         = -17,
    WrongModel         = -18,
}

impl ErrorCode {
    pub fn raw(self) -> i32 {
        self as i32
    }

    pub fn from_raw(code: i32) -> Option<ErrorCode> {
        use ErrorCode::*;
        Some(match code {
            -1  => BadIndex,
            -2  => BadParam,
            -3  => BadPointer,
            -4  => Lseek,
            -5  => FileOpen,
            -6  => Writing,
            -7  => Locking,
            -8  => Malloc,
            -9  => Reading,
            -10 => Internal,
            -11 => NotOpen,
            -12 => AlreadyOpen,
            -13 => FileHeader,
            -15 => ValueNotInList,
            -16 => WriteoverValidData,
            -17 => OutOfRange,
            -18 => WrongModel,
            _   => return None,
        })
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("index out of bounds for one of the model dimensions")]
    BadIndex,

    #[error("invalid parameter: {0}")]
    BadParam(&'static str),

    #[error("dangling or inconsistent internal reference")]
    BadPointer,

    #[error("seek beyond the data region")]
    Lseek,

    #[error("failed to open data file")]
    FileOpen(#[source] std::io::Error),

    #[error("short or failed write")]
    Writing(#[source] std::io::Error),

    #[error("failed to acquire or release the file lock")]
    Locking(#[source] nix::Error),

    #[error("allocation refused: requested size is implausible")]
    Malloc,

    #[error("short or failed read")]
    Reading(#[source] std::io::Error),

    #[error("internal inconsistency")]
    Internal,

    #[error("store is not open")]
    NotOpen,

    #[error("store is already open")]
    AlreadyOpen,

    #[error("file header is invalid: {0}")]
    FileHeader(&'static str),

    #[error("value not present in the index list")]
    ValueNotInList,

    #[error("refusing to overwrite a valid cell with a different value")]
    WriteoverValidData,

    #[error("value out of range for the element type")]
    OutOfRange,

    #[error("operation does not apply to this model type")]
    WrongModel,
}

impl StoreError {
    /// The stable numeric code for this error kind.
    pub fn code(&self) -> ErrorCode {
        use StoreError::*;
        match self {
            BadIndex              => ErrorCode::BadIndex,
            BadParam(_)           => ErrorCode::BadParam,
            BadPointer            => ErrorCode::BadPointer,
            Lseek                 => ErrorCode::Lseek,
            FileOpen(_)           => ErrorCode::FileOpen,
            Writing(_)            => ErrorCode::Writing,
            Locking(_)            => ErrorCode::Locking,
            Malloc                => ErrorCode::Malloc,
            Reading(_)            => ErrorCode::Reading,
            Internal              => ErrorCode::Internal,
            NotOpen               => ErrorCode::NotOpen,
            AlreadyOpen           => ErrorCode::AlreadyOpen,
            FileHeader(_)         => ErrorCode::FileHeader,
            ValueNotInList        => ErrorCode::ValueNotInList,
            WriteoverValidData    => ErrorCode::WriteoverValidData,
            OutOfRange            => ErrorCode::OutOfRange,
            WrongModel            => ErrorCode::WrongModel,
        }
    }
}
