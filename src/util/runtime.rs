use super::async_flag;
use async_trait::async_trait;

/// Marker returned by `Runnable::run` once its exit flag has fired and the
/// loop has wound down.
#[derive(Debug)]
pub struct Exited;

#[async_trait]
pub trait Runnable: Send + Sync {
    async fn run(
        &self,
        exit_flag: async_flag::Receiver,
    ) -> Exited;
}
