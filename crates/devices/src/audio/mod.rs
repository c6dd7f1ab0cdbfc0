//! Note outputs

mod memory;
#[cfg(feature = "midi")]
mod midi;

pub use memory::{MemoryBackend, NullBackend, NullOutput};
#[cfg(feature = "midi")]
pub use midi::{MidirBackend, MidirOutput};

use contracts::AudioBackend;

/// The system backend for this build
pub fn system_backend() -> Box<dyn AudioBackend> {
    #[cfg(feature = "midi")]
    {
        Box::new(MidirBackend::new())
    }
    #[cfg(not(feature = "midi"))]
    {
        Box::new(NullBackend)
    }
}
