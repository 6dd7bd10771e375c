pub mod features;
pub mod http_cache;
pub mod http_client;
pub mod match_agg;
pub mod names;
pub mod pipeline;
pub mod point_stream;
pub mod rank_reference;
pub mod slam_fetch;
pub mod store;
pub mod tour_dataset;
