pub mod accumulator;
pub mod decoder;
pub mod session;
pub mod telemetry;

pub use accumulator::DeltaAccumulator;
pub use decoder::{ frames, Frame, FrameDecoder };
pub use session::{ SessionTag, StreamSession };
pub use telemetry::{ estimate_tokens, StatsSnapshot, Telemetry };
