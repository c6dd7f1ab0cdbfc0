//! FrameSource trait - capture device abstraction
//!
//! Live cameras, replayed image sequences and synthetic generators all sit
//! behind the same pull-based interface, so the capture loop does not care
//! which kind of device produced a frame.

use crate::{ContractError, Frame};

/// Capture device handle
///
/// Acquisition happens in the constructor of the concrete type (the `open`
/// step); failure there is reported as [`ContractError::DeviceUnavailable`].
///
/// # Example
///
/// ```ignore
/// let mut source: Box<dyn FrameSource> = factory.open_camera(&config.cameras.hand)?;
/// while let Some(frame) = source.read()? {
///     // ...
/// }
/// source.close();
/// ```
pub trait FrameSource: Send {
    /// Device identifier (used in logs and metrics)
    fn device_id(&self) -> &str;

    /// Fixed (width, height) of every frame this source produces
    fn resolution(&self) -> (u32, u32);

    /// Pull the next frame.
    ///
    /// `Ok(None)` signals end of stream. An `Err` is a single failed read;
    /// the caller decides whether repeated failures end the stream.
    fn read(&mut self) -> Result<Option<Frame>, ContractError>;

    /// Release the device. Must be idempotent.
    fn close(&mut self);
}
