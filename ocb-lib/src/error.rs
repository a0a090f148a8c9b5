use crate::words::{ChannelId, GtsTag};

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The top 4 bits of a raw word do not name a known word kind.
    #[error("invalid word id {id:#x}")]
    InvalidWord { id: u8 },

    /// OCB packet header and trailer disagree on gate type or gate tag.
    #[error("OCB header/trailer mismatch: gate type {header_gate_type}/{trailer_gate_type}, gate tag {header_gate_tag}/{trailer_gate_tag}")]
    OCBEnvelopeMismatch {
        header_gate_type: u8,
        trailer_gate_type: u8,
        header_gate_tag: u8,
        trailer_gate_tag: u8,
    },

    /// An OCB packet header arrived while another OCB packet was still open.
    #[error("OCB packet header inside an open OCB packet")]
    NestedOcbHeader,

    /// The word stream ended inside an OCB packet.
    #[error("stream ended inside an OCB packet")]
    TruncatedStream,

    /// A FEB trailer arrived with no gate header opening the packet.
    #[error("FEB trailer for board {board_id} without a gate header")]
    FebTrailerWithoutHeader { board_id: u8 },

    /// A FEB packet slice was empty or did not begin with a gate header.
    #[error("empty FEB packet")]
    FebPacketEmpty,

    /// A hit word's tag matches neither the current nor the previous GTS tag.
    #[error("hit tag {tag_id} on board {board_id} channel {channel_id} matches neither current nor previous GTS tag")]
    HitTagMismatch {
        board_id: u8,
        channel_id: ChannelId,
        tag_id: u8,
    },

    /// GTS trailer 1 carries a tag different from the open GTS header.
    #[error("GTS trailer tag {trailer_tag:#x} does not match current GTS tag {current_tag:?}")]
    TrailerTagMismatch {
        trailer_tag: GtsTag,
        current_tag: Option<GtsTag>,
    },

    /// GTS trailer 2 arrived with no GTS interval open.
    #[error("GTS trailer without a GTS header")]
    TrailerWithoutHeader,

    #[error("duplicate rising edge for channel {channel_id} hit {hit_id}")]
    DuplicateRisingEdge { channel_id: ChannelId, hit_id: u8 },

    #[error("falling edge before rising edge for channel {channel_id} hit {hit_id}")]
    FallingBeforeRising { channel_id: ChannelId, hit_id: u8 },

    #[error("duplicate low-gain amplitude for channel {channel_id}")]
    DuplicateGainLG { channel_id: ChannelId },

    #[error("duplicate high-gain amplitude for channel {channel_id}")]
    DuplicateGainHG { channel_id: ChannelId },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
