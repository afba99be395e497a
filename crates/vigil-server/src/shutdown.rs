use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};
use vigil_alert::EngineHandle;

/// 关闭信号类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM
    Term,

    /// SIGINT - Ctrl+C
    Interrupt,

    /// 手动触发
    Manual,
}

/// 信号处理器，把系统信号广播给引擎循环和 HTTP 服务
pub struct SignalHandler {
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
}

impl SignalHandler {
    pub fn new() -> (Self, broadcast::Receiver<ShutdownSignal>) {
        let (tx, rx) = broadcast::channel(16);
        (Self { shutdown_tx: tx }, rx)
    }

    /// 等待系统信号并广播
    #[cfg(unix)]
    pub async fn wait_for_system_signal(&self) -> std::io::Result<ShutdownSignal> {
        use signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut manual = self.shutdown_tx.subscribe();

        let received = tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
                ShutdownSignal::Term
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
                ShutdownSignal::Interrupt
            }
            _ = manual.recv() => return Ok(ShutdownSignal::Manual),
        };
        let _ = self.shutdown_tx.send(received);
        Ok(received)
    }

    #[cfg(not(unix))]
    pub async fn wait_for_system_signal(&self) -> std::io::Result<ShutdownSignal> {
        let mut manual = self.shutdown_tx.subscribe();
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C");
                let _ = self.shutdown_tx.send(ShutdownSignal::Interrupt);
                Ok(ShutdownSignal::Interrupt)
            }
            _ = manual.recv() => Ok(ShutdownSignal::Manual),
        }
    }

    /// 手动触发关闭
    pub fn trigger_shutdown(&self) {
        info!("Manual shutdown triggered");
        let _ = self.shutdown_tx.send(ShutdownSignal::Manual);
    }

    /// 订阅关闭信号
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownSignal> {
        self.shutdown_tx.subscribe()
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new().0
    }
}

/// 等待引擎循环退出，超时后强制中止
pub async fn drain(mut handle: EngineHandle, timeout: Duration) {
    if tokio::time::timeout(timeout, handle.join()).await.is_err() {
        warn!(timeout_secs = timeout.as_secs(), "Engine loops did not stop in time, aborting");
        handle.abort();
    } else {
        info!("Engine loops stopped");
    }
}

/// 把广播信号转换成 axum 的 graceful shutdown future
pub async fn wait_for(mut rx: broadcast::Receiver<ShutdownSignal>) {
    match rx.recv().await {
        Ok(signal) => info!(?signal, "HTTP server shutting down"),
        Err(e) => warn!(error = %e, "Shutdown channel closed"),
    }
}
