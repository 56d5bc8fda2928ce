use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use image::RgbaImage;
use slide_regions::{DisplayBackend, InputEvent, Result};
use std::time::Duration;

/// Updates sent from the annotation thread to the UI
#[derive(Debug, Clone)]
pub enum ViewerUpdate {
    Title(String),
    Frame {
        width: usize,
        height: usize,
        rgba_data: Vec<u8>,
    },
    /// The orchestrator is done; the window should close
    Finished,
}

/// Display backend for an annotation session running off the UI thread.
///
/// Frames go to the egui app over one channel, input events come back over
/// another. Once the UI is gone every poll reports [`InputEvent::Closed`].
pub struct ChannelBackend {
    update_tx: Sender<ViewerUpdate>,
    event_rx: Receiver<InputEvent>,
}

impl ChannelBackend {
    pub fn new(update_tx: Sender<ViewerUpdate>, event_rx: Receiver<InputEvent>) -> Self {
        Self {
            update_tx,
            event_rx,
        }
    }

    fn send(&self, update: ViewerUpdate) {
        // A closed UI shows up as Closed on the next poll
        let _ = self.update_tx.send(update);
    }
}

impl DisplayBackend for ChannelBackend {
    fn set_title(&mut self, title: &str) -> Result<()> {
        self.send(ViewerUpdate::Title(title.to_string()));
        Ok(())
    }

    fn present(&mut self, frame: &RgbaImage) -> Result<()> {
        self.send(ViewerUpdate::Frame {
            width: frame.width() as usize,
            height: frame.height() as usize,
            rgba_data: frame.as_raw().clone(),
        });
        Ok(())
    }

    fn poll_event(&mut self, timeout: Duration) -> Result<Option<InputEvent>> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Ok(Some(InputEvent::Closed)),
        }
    }
}
