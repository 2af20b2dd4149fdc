mod router;

pub use router::{BUCKET_NUMBER, Interval, ShardRouter, create_intervals};
