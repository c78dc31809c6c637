// Re-exported broccoli_queue option types, so consumers configure publishing
// and consumption without depending on the broker crate directly.

pub type PublishConfig = broccoli_queue::queue::PublishOptions;
pub type ConsumeConfig = broccoli_queue::queue::ConsumeOptions;
pub type RetryStrategy = broccoli_queue::queue::RetryStrategy;
