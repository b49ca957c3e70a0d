//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Control Byte
//! ```text
//!   7      6      5      4      3  2  1  0
//! ┌──────┬──────┬──────┬──────┬────────────┐
//! │ S2S  │ COMP │ SER  │ SYNC │ command id │
//! └──────┴──────┴──────┴──────┴────────────┘
//! ```
//!
//! ### Commands
//! - 0x0: PING    0x1: GET     0x2: DEL     0x3: PUT
//! - 0x4: SETDB   0x5: START   0x6: STOP    0x7: LIST
//! - 0x8: DROP    0x9: COMMIT  0xa: ADD     0xb: UPDATE
//! - 0xe: ADMIN   0xf: EXTRA   (unsupported)
//!
//! ### Status Codes
//! - 0: UNDEFINED   1: OK          2: PROTOCOL   3: SERVER
//! - 4: FULL_DB     5: TOO_MANY_DB 6: BAD_NAME   7: TRANSACTION

mod command;
mod response;
mod codec;

pub use command::{
    decode_control_byte, CommandId, Request, RequestOptions, COMMAND_MASK, OPT_COMPRESSED,
    OPT_SERIALIZED, OPT_SERVER_TO_SERVER, OPT_SYNC,
};
pub use response::{ResponseHeader, Status, STATUS_MASK};
pub use codec::{
    encode_request, write_list_end, write_list_entry, write_response, FrameReader, LIST_END,
};
