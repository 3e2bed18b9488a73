//! Device capability seam.

use crate::error::ActuatorError;
use std::path::Path;

/// Drives the reading device: page turns, frame capture, and the checks the
/// capture loop needs between pages.
///
/// The guard calls `turn_page` itself only for a recovery probe; the normal
/// turn between pages belongs to the capture loop.
pub trait PageActuator {
    /// Advance the device by one page
    fn turn_page(&mut self) -> Result<(), ActuatorError>;

    /// Write the current screen to `destination` as PNG
    fn capture_frame(&mut self, destination: &Path) -> Result<(), ActuatorError>;

    /// Whether the device reports another page after the current one
    fn has_next_page(&mut self) -> Result<bool, ActuatorError> {
        Ok(true)
    }

    /// Whether the reading session is still open
    fn is_session_alive(&mut self) -> Result<bool, ActuatorError> {
        Ok(true)
    }
}

impl<A: PageActuator + ?Sized> PageActuator for &mut A {
    fn turn_page(&mut self) -> Result<(), ActuatorError> {
        (**self).turn_page()
    }

    fn capture_frame(&mut self, destination: &Path) -> Result<(), ActuatorError> {
        (**self).capture_frame(destination)
    }

    fn has_next_page(&mut self) -> Result<bool, ActuatorError> {
        (**self).has_next_page()
    }

    fn is_session_alive(&mut self) -> Result<bool, ActuatorError> {
        (**self).is_session_alive()
    }
}

impl<A: PageActuator + ?Sized> PageActuator for Box<A> {
    fn turn_page(&mut self) -> Result<(), ActuatorError> {
        (**self).turn_page()
    }

    fn capture_frame(&mut self, destination: &Path) -> Result<(), ActuatorError> {
        (**self).capture_frame(destination)
    }

    fn has_next_page(&mut self) -> Result<bool, ActuatorError> {
        (**self).has_next_page()
    }

    fn is_session_alive(&mut self) -> Result<bool, ActuatorError> {
        (**self).is_session_alive()
    }
}
