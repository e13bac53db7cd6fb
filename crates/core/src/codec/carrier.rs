// Carrier framing
//
// Each carrier message is "<marker> g=<generation> p=<index>/<total>\n<chunk>".

use crate::error::{AppError, Result};

/// Prefix identifying carrier messages in the storage channel
pub const CARRIER_MARKER: &str = "[QUEUE_STORE]";

/// Characters reserved for the header within one platform message
pub const CARRIER_HEADER_RESERVE: usize = 64;

/// One framed chunk of a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierFrame {
    pub generation: u64,
    /// 1-based part index
    pub index: usize,
    pub total: usize,
    pub chunk: String,
}

impl CarrierFrame {
    /// Frame every chunk of one snapshot
    pub fn frame_all(generation: u64, chunks: Vec<String>) -> Vec<CarrierFrame> {
        let total = chunks.len();
        chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| CarrierFrame {
                generation,
                index: i + 1,
                total,
                chunk,
            })
            .collect()
    }

    /// Message content for this frame
    pub fn render(&self) -> String {
        format!(
            "{} g={} p={}/{}\n{}",
            CARRIER_MARKER, self.generation, self.index, self.total, self.chunk
        )
    }

    /// Parse message content.
    ///
    /// Returns `None` for messages that are not carriers, `Some(Err)` for
    /// carriers with a damaged header.
    pub fn parse(content: &str) -> Option<Result<CarrierFrame>> {
        let rest = content.strip_prefix(CARRIER_MARKER)?;
        Some(Self::parse_header(rest))
    }

    fn parse_header(rest: &str) -> Result<CarrierFrame> {
        let bad = |what: &str| AppError::CorruptRecord(format!("bad carrier header: {}", what));

        let (header, chunk) = rest.split_once('\n').ok_or_else(|| bad("no newline"))?;
        let mut fields = header.split_whitespace();

        let generation = fields
            .next()
            .and_then(|f| f.strip_prefix("g="))
            .and_then(|g| g.parse::<u64>().ok())
            .ok_or_else(|| bad("generation"))?;

        let (index, total) = fields
            .next()
            .and_then(|f| f.strip_prefix("p="))
            .and_then(|p| p.split_once('/'))
            .and_then(|(i, t)| Some((i.parse::<usize>().ok()?, t.parse::<usize>().ok()?)))
            .ok_or_else(|| bad("part"))?;

        if fields.next().is_some() {
            return Err(bad("trailing fields"));
        }
        if index == 0 || index > total {
            return Err(bad("part index out of range"));
        }

        Ok(CarrierFrame {
            generation,
            index,
            total,
            chunk: chunk.to_string(),
        })
    }
}

/// Validate frames (chronological order) and return the generation and chunks.
///
/// All frames must belong to one generation and form parts `1..=total` in order.
pub fn assemble(frames: &[CarrierFrame]) -> Result<(u64, Vec<String>)> {
    let first = frames
        .first()
        .ok_or_else(|| AppError::CorruptRecord("no carriers".to_string()))?;

    if frames.iter().any(|f| f.generation != first.generation) {
        return Err(AppError::CorruptRecord(
            "carriers from different snapshots are mixed".to_string(),
        ));
    }
    if frames.len() != first.total {
        return Err(AppError::CorruptRecord(format!(
            "expected {} carriers, found {}",
            first.total,
            frames.len()
        )));
    }
    for (pos, frame) in frames.iter().enumerate() {
        if frame.total != first.total || frame.index != pos + 1 {
            return Err(AppError::CorruptRecord(format!(
                "carrier {} out of sequence",
                frame.index
            )));
        }
    }

    Ok((
        first.generation,
        frames.iter().map(|f| f.chunk.clone()).collect(),
    ))
}
