/// Error type for compositing operations.
#[derive(Debug)]
pub enum RenderError {
    /// The canvas pixmap could not be allocated.
    Allocation { size: u32 },
    /// The template mask does not match the canvas extent.
    MaskSize { expected: u32, actual: (u32, u32) },
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allocation { size } => {
                write!(f, "failed to allocate a {size}x{size} canvas surface")
            }
            Self::MaskSize { expected, actual } => write!(
                f,
                "template mask is {}x{}, expected {expected}x{expected}",
                actual.0, actual.1
            ),
        }
    }
}

impl std::error::Error for RenderError {}
