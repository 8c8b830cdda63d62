/// LLM decorators for adding functionality to base LLM implementations.
///
/// Decorators implement the LLM trait themselves and wrap another LLM
/// implementation, adding their behavior transparently.
pub mod retry;

pub use retry::RetryableLLM;
