//! Camera contract and the scoped session that owns an open device.

use std::ops::{Deref, DerefMut};

use tracing::debug;

use crate::types::{CaptureError, Frame};

/// Opens camera devices by index.
pub trait CameraBackend {
    type Device: CameraDevice;

    /// Fails with [`CaptureError::Unavailable`] when the camera cannot be opened.
    fn open(&mut self, index: u32) -> Result<Self::Device, CaptureError>;
}

/// An open camera handle.
pub trait CameraDevice {
    /// Request a capture resolution. Devices may ignore the request.
    fn configure(&mut self, width: u32, height: u32) -> Result<(), CaptureError>;

    /// Block until the next frame. `Ok(None)` signals end of stream.
    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError>;

    /// Release the underlying device.
    fn release(&mut self);
}

/// Exclusive owner of an open [`CameraDevice`].
///
/// The device is released exactly once, when the session is dropped.
pub struct CameraSession<D: CameraDevice> {
    device: D,
    index: u32,
}

impl<D: CameraDevice> CameraSession<D> {
    pub fn open<B>(backend: &mut B, index: u32) -> Result<Self, CaptureError>
    where
        B: CameraBackend<Device = D>,
    {
        let device = backend.open(index)?;
        debug!(camera = index, "camera opened");
        Ok(Self { device, index })
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl<D: CameraDevice> Deref for CameraSession<D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.device
    }
}

impl<D: CameraDevice> DerefMut for CameraSession<D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

impl<D: CameraDevice> Drop for CameraSession<D> {
    fn drop(&mut self) {
        self.device.release();
        debug!(camera = self.index, "camera released");
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;

    struct CountingDevice {
        released: Rc<Cell<u32>>,
    }

    impl CameraDevice for CountingDevice {
        fn configure(&mut self, _width: u32, _height: u32) -> Result<(), CaptureError> {
            Ok(())
        }

        fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
            Ok(None)
        }

        fn release(&mut self) {
            self.released.set(self.released.get() + 1);
        }
    }

    struct CountingBackend {
        released: Rc<Cell<u32>>,
        available: bool,
    }

    impl CameraBackend for CountingBackend {
        type Device = CountingDevice;

        fn open(&mut self, index: u32) -> Result<CountingDevice, CaptureError> {
            if !self.available {
                return Err(CaptureError::Unavailable { index });
            }
            Ok(CountingDevice {
                released: self.released.clone(),
            })
        }
    }

    #[test]
    fn session_releases_once_on_drop() {
        let released = Rc::new(Cell::new(0));
        let mut backend = CountingBackend {
            released: released.clone(),
            available: true,
        };
        {
            let mut session = CameraSession::open(&mut backend, 1).unwrap();
            assert_eq!(session.index(), 1);
            assert!(session.read_frame().unwrap().is_none());
            assert_eq!(released.get(), 0);
        }
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn failed_open_releases_nothing() {
        let released = Rc::new(Cell::new(0));
        let mut backend = CountingBackend {
            released: released.clone(),
            available: false,
        };
        let result = CameraSession::open(&mut backend, 3);
        assert!(matches!(result, Err(CaptureError::Unavailable { index: 3 })));
        assert_eq!(released.get(), 0);
    }
}
