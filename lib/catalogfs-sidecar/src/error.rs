use catalogfs_errno::CatalogErrno;

/// Errors raised while parsing or writing a sidecar file.
#[derive(thiserror::Error, Debug)]
pub enum SidecarError {
    /// The first non-skippable line did not match any recognized header.
    #[error("unrecognized sidecar header")]
    HeaderMismatch,
    /// A data line's key exceeded the 1024-byte cap.
    #[error("key exceeds maximum length of 1024 bytes")]
    KeyTooLong,
    /// A data line's value exceeded the 1,048,576-byte cap.
    #[error("value exceeds maximum length of 1048576 bytes")]
    ValueTooLong,
    /// A data line had an empty key before the separator.
    #[error("empty key in data line")]
    EmptyKey,
    /// A recognized key's value failed the strict numeric scan.
    #[error("value for key `{0}` is not a valid integer")]
    MalformedValue(&'static str),
    /// A field that must be non-negative was read as negative.
    #[error("field `{0}` must not be negative")]
    NegativeField(&'static str),
    /// Total sidecar size exceeded the 1 MiB cap.
    #[error("sidecar exceeds maximum size of {0} bytes")]
    SizeLimitExceeded(u64),
    /// A line exceeded the line-reader's cap.
    #[error(transparent)]
    LineTooLong(#[from] catalogfs_linebuf::LineBufError),
    /// The underlying stream returned an error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Every parser rejection surfaces to the dispatcher as "not permitted",
/// matching the error-kind table: "parser rejects" falls under that kind.
/// Bare I/O failures instead carry the underlying errno through verbatim.
impl From<SidecarError> for CatalogErrno {
    fn from(err: SidecarError) -> Self {
        match err {
            SidecarError::Io(e) => CatalogErrno::from(e),
            SidecarError::LineTooLong(catalogfs_linebuf::LineBufError::Io(e)) => {
                CatalogErrno::from(e)
            }
            SidecarError::LineTooLong(catalogfs_linebuf::LineBufError::Overflow(_)) => {
                CatalogErrno::Range
            }
            SidecarError::HeaderMismatch
            | SidecarError::KeyTooLong
            | SidecarError::ValueTooLong
            | SidecarError::EmptyKey
            | SidecarError::MalformedValue(_)
            | SidecarError::NegativeField(_)
            | SidecarError::SizeLimitExceeded(_) => CatalogErrno::Perm,
        }
    }
}
