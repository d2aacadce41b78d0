use std::io::Write;

use anyhow::Result;
use hitglow_core::{ColorCode, TileId};
use hitglow_system_playback::{Hold, Transport};

/// Transport printing every frame as a grid of hexadecimal color codes.
pub(crate) struct ConsoleTransport<W> {
    out: W,
    size: usize,
}

impl<W: Write> ConsoleTransport<W> {
    /// Creates a transport writing frames of `size × size` pixels to `out`.
    pub(crate) fn new(out: W, size: u32) -> Self {
        Self {
            out,
            size: size as usize,
        }
    }
}

impl<W: Write> Transport for ConsoleTransport<W> {
    fn push_frame(&mut self, tile: TileId, frame: &[ColorCode], hold: Hold) -> Result<()> {
        match hold {
            Hold::Forever => writeln!(self.out, "{tile}")?,
            Hold::For(duration) => writeln!(self.out, "{tile} (hold {duration:?})")?,
        }
        for row in frame.chunks(self.size.max(1)) {
            let line: Vec<String> = row.iter().map(|color| format!("{:02x}", color.get())).collect();
            writeln!(self.out, "  {}", line.join(" "))?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn clear(&mut self, tile: TileId) -> Result<()> {
        writeln!(self.out, "{tile} cleared")?;
        self.out.flush()?;
        Ok(())
    }
}
