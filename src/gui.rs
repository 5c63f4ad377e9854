//! A minimal debug window showing annotated frames.

use opencv::highgui;

use crate::image::Image;
use crate::video::image_to_bgr;

/// How long [`show_image`] waits for keyboard input, in milliseconds.
const KEY_POLL_MS: i32 = 10;

/// A key press observed while showing a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// No key was pressed.
    None,
    /// `q` was pressed; the run should stop.
    Quit,
    /// Any other key, as its 8-bit key code.
    Other(u8),
}

impl Key {
    fn from_code(code: i32) -> Self {
        if code < 0 {
            return Key::None;
        }
        match (code & 0xff) as u8 {
            b'q' => Key::Quit,
            other => Key::Other(other),
        }
    }

    #[inline]
    pub fn is_quit(&self) -> bool {
        *self == Key::Quit
    }
}

/// Displays `image` in the window titled `title` and polls the keyboard briefly.
///
/// The window is created on first use.
pub fn show_image(title: &str, image: &Image) -> anyhow::Result<Key> {
    let bgr = image_to_bgr(image)?;
    highgui::imshow(title, &bgr)?;
    let code = highgui::wait_key(KEY_POLL_MS)?;
    Ok(Key::from_code(code))
}

/// Closes all windows opened by [`show_image`].
pub fn close_windows() -> anyhow::Result<()> {
    highgui::destroy_all_windows()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_codes() {
        assert_eq!(Key::from_code(-1), Key::None);
        assert_eq!(Key::from_code('q' as i32), Key::Quit);
        // Some backends set modifier bits above the low byte.
        assert_eq!(Key::from_code(0x10_0000 | 'q' as i32), Key::Quit);
        assert_eq!(Key::from_code('Q' as i32), Key::Other(b'Q'));
        assert!(!Key::from_code(27).is_quit());
    }
}
