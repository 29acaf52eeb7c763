use core::fmt;

/// Buffer and region errors raised by [`crate::Image`] and [`crate::ImageView`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    SizeMismatch { expected: usize, actual: usize },
    OutOfBounds,
    InvalidStride,
    EmptyRegion,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeMismatch { expected, actual } => {
                write!(f, "buffer holds {actual} pixels, {expected} required")
            }
            Self::OutOfBounds => write!(f, "region extends past the image"),
            Self::InvalidStride => write!(f, "stride is shorter than the row width"),
            Self::EmptyRegion => write!(f, "region has zero width or height"),
        }
    }
}

impl std::error::Error for Error {}
