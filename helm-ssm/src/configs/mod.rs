pub mod loaders;
pub mod session;

pub use session::{ExecutionContext, SessionConfig};

#[async_trait::async_trait]
pub trait Configs: Sized {
    async fn load() -> Result<Self, Box<dyn std::error::Error + Send + Sync>>;
}
