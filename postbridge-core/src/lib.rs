// Core building blocks of the postbridge RPC bridge:
// - flat string frame codec
// - correlation ids
// - pending-call table for locally issued calls
// - dispatch table for locally registered handlers

pub mod codec;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod ids;
pub mod pending;

pub use codec::{decode_frame, encode_frame, CodecError, FrameCodec, DEFAULT_MAX_FRAME_LEN, DELIMITER};
pub use dispatch::{DispatchTable, Handler, HandlerKind, Namespace, ProgressReporter};
pub use error::{BridgeError, ErrorCode};
pub use frame::{AckOutcome, AckPayload, Frame, FrameKind};
pub use ids::{CorrelationId, IdAllocator, SequentialAllocator, UuidAllocator};
pub use pending::{CallReceiver, CallSender, PendingCall, PendingCallStats, PendingCallTable};
