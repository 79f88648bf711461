use crate::error::Result;

/// Долгоживущая фоновая служба, запускаемая из `main`
#[async_trait::async_trait]
pub trait BackgroundService {
    /// Имя для логов
    fn name(&self) -> &'static str;

    /// Работает до отмены или закрытия входных каналов
    async fn run(self: Box<Self>) -> Result<()>;
}
