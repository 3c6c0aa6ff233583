//! The shared seek engine behind the trajectory, light, and yaw players.
//!
//! Each encoded stream decodes lazily into time [`Window`]s. A [`Cursor`]
//! caches the current window and re-positions it on demand: backward
//! queries rewind to the first window, forward queries advance one window
//! at a time, so monotone query sequences decode each window once.

use crate::error::Result;

/// One decoded segment covering `[start_ms, start_ms + duration_ms)`.
#[derive(Debug, Clone)]
pub struct Window<T> {
    pub start_ms: u32,
    pub duration_ms: u32,
    pub data: T,
}

impl<T> Window<T> {
    pub fn end_ms(&self) -> u32 {
        self.start_ms.saturating_add(self.duration_ms)
    }

    pub fn contains(&self, t_ms: u32) -> bool {
        t_ms >= self.start_ms && t_ms < self.end_ms()
    }

    /// Time into the window, in seconds.
    pub fn local_sec(&self, t_ms: u32) -> f32 {
        (t_ms.saturating_sub(self.start_ms)) as f32 / 1000.0
    }

    pub fn duration_sec(&self) -> f32 {
        self.duration_ms as f32 / 1000.0
    }
}

/// Lazily decodes a stream of windows. Rewinding restarts the decode from
/// the first segment.
pub trait SegmentSource {
    type Segment;

    fn rewind(&mut self);

    /// Decode the next window, or `None` at end of stream.
    fn next_window(&mut self) -> Result<Option<Window<Self::Segment>>>;
}

/// Where a seek landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    /// The stream has no windows at all.
    Empty,
    /// The query time falls inside the current window.
    Within,
    /// The query time is at or past the end of the final window, which
    /// stays cached for endpoint clamping.
    PastEnd,
}

/// A stateful cursor over a [`SegmentSource`].
#[derive(Debug)]
pub struct Cursor<S: SegmentSource> {
    source: S,
    current: Option<Window<S::Segment>>,
    exhausted: bool,
}

impl<S: SegmentSource> Cursor<S> {
    /// Build a cursor and decode the first window (if any).
    pub fn new(source: S) -> Result<Self> {
        let mut cursor = Self {
            source,
            current: None,
            exhausted: false,
        };
        cursor.rewind()?;
        Ok(cursor)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Restart from the first window.
    pub fn rewind(&mut self) -> Result<()> {
        self.source.rewind();
        self.current = self.source.next_window()?;
        self.exhausted = self.current.is_none();
        Ok(())
    }

    /// Advance to the next window. Returns `false` at end of stream; the
    /// final window stays cached.
    pub fn build_next_segment(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        match self.source.next_window()? {
            Some(window) => {
                self.current = Some(window);
                Ok(true)
            }
            None => {
                self.exhausted = true;
                Ok(false)
            }
        }
    }

    pub fn has_more_segments(&self) -> bool {
        !self.exhausted
    }

    /// The cached window, if the stream has ever produced one.
    pub fn current(&self) -> Option<&Window<S::Segment>> {
        self.current.as_ref()
    }

    /// Position the cursor so the cached window covers `t_ms`, decoding
    /// forward (or rewinding first) as needed.
    pub fn seek_ms(&mut self, t_ms: u32) -> Result<Landing> {
        let Some(current) = &self.current else {
            return Ok(Landing::Empty);
        };
        if t_ms < current.start_ms {
            self.rewind()?;
        }
        loop {
            let Some(current) = &self.current else {
                return Ok(Landing::Empty);
            };
            if t_ms < current.end_ms() {
                return Ok(Landing::Within);
            }
            if !self.build_next_segment()? {
                return Ok(Landing::PastEnd);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Fixed windows of 100 ms, values 0..n.
    struct Fixed {
        count: u32,
        next: u32,
    }

    impl Fixed {
        fn new(count: u32) -> Self {
            Self { count, next: 0 }
        }
    }

    impl SegmentSource for Fixed {
        type Segment = u32;

        fn rewind(&mut self) {
            self.next = 0;
        }

        fn next_window(&mut self) -> Result<Option<Window<u32>>> {
            if self.next >= self.count {
                return Ok(None);
            }
            let idx = self.next;
            self.next += 1;
            Ok(Some(Window {
                start_ms: idx * 100,
                duration_ms: 100,
                data: idx,
            }))
        }
    }

    #[test]
    fn empty_stream() {
        let mut cursor = Cursor::new(Fixed::new(0)).unwrap();
        assert!(cursor.current().is_none());
        assert!(!cursor.has_more_segments());
        assert_eq!(cursor.seek_ms(0).unwrap(), Landing::Empty);
    }

    #[test]
    fn forward_seek_advances() {
        let mut cursor = Cursor::new(Fixed::new(5)).unwrap();
        assert_eq!(cursor.seek_ms(250).unwrap(), Landing::Within);
        assert_eq!(cursor.current().unwrap().data, 2);
        assert_eq!(cursor.seek_ms(499).unwrap(), Landing::Within);
        assert_eq!(cursor.current().unwrap().data, 4);
    }

    #[test]
    fn backward_seek_rewinds() {
        let mut cursor = Cursor::new(Fixed::new(5)).unwrap();
        cursor.seek_ms(450).unwrap();
        assert_eq!(cursor.seek_ms(50).unwrap(), Landing::Within);
        assert_eq!(cursor.current().unwrap().data, 0);
    }

    #[test]
    fn seek_past_end_keeps_last_window() {
        let mut cursor = Cursor::new(Fixed::new(3)).unwrap();
        assert_eq!(cursor.seek_ms(10_000).unwrap(), Landing::PastEnd);
        assert_eq!(cursor.current().unwrap().data, 2);
        assert!(!cursor.has_more_segments());
        // A backward seek after exhaustion still works.
        assert_eq!(cursor.seek_ms(0).unwrap(), Landing::Within);
        assert_eq!(cursor.current().unwrap().data, 0);
        assert!(cursor.has_more_segments());
    }

    #[test]
    fn boundary_belongs_to_next_window() {
        let mut cursor = Cursor::new(Fixed::new(3)).unwrap();
        assert_eq!(cursor.seek_ms(100).unwrap(), Landing::Within);
        assert_eq!(cursor.current().unwrap().data, 1);
    }

    #[test]
    fn manual_iteration() {
        let mut cursor = Cursor::new(Fixed::new(2)).unwrap();
        assert_eq!(cursor.current().unwrap().data, 0);
        assert!(cursor.build_next_segment().unwrap());
        assert_eq!(cursor.current().unwrap().data, 1);
        assert!(!cursor.build_next_segment().unwrap());
        assert_eq!(cursor.current().unwrap().data, 1);
        assert!(!cursor.has_more_segments());
    }
}
