pub mod frame;
pub mod normalizer;

pub use frame::{FRAME_HEADER_LEN, LineSplitter, MAX_LINE_LEN, strip_frame_header};
pub use normalizer::{LineNormalizer, normalize, now_rfc3339, service_name};
