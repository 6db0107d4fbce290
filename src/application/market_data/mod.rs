pub mod candle_aggregator;
pub mod volume_profile_builder;

pub use candle_aggregator::CandleAggregator;
pub use volume_profile_builder::VolumeProfileBuilder;
