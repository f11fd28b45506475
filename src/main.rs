use anyhow::Result;
use chrono::Utc;
use futures::FutureExt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{info, warn};

use attendance_bot::utils::logging::{self, log_run_error, log_startup};
use attendance_bot::{AttendanceRunner, Config, RunContext, Schedules};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logging::init(config.verbose_logging);
    log_startup(&config);

    let schedules = Schedules::from_config(&config)?;
    let runner = Arc::new(AttendanceRunner::from_config(&config)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut manual = signals::ManualTrigger::install()?;
    let mut shutdown = signals::Shutdown::install()?;
    let mut runs = JoinSet::new();

    loop {
        // 回收已结束的运行
        while let Some(Some(_)) = runs.join_next().now_or_never() {}

        let next = schedules.next_fire(Utc::now());
        let wait = match &next {
            Some(next) => {
                info!("⏰ 下一次运行: {} ({})", next.at.format("%Y-%m-%d %H:%M %:z"), next.label);
                (next.at.with_timezone(&Utc) - Utc::now())
                    .to_std()
                    .unwrap_or_default()
            }
            None => {
                warn!("⚠️ 计划中没有可用的触发时间，只响应手动触发");
                std::time::Duration::MAX
            }
        };

        let scheduled = next.as_ref().map(|n| n.label);
        let trigger = tokio::select! {
            _ = sleep(wait), if scheduled.is_some() => scheduled.unwrap_or("schedule"),
            _ = manual.recv() => "manual",
            _ = shutdown.recv() => break,
        };

        let ctx = RunContext::with_timeout(config.run_timeout()).with_shutdown(shutdown_rx.clone());
        let runner = Arc::clone(&runner);
        runs.spawn(async move {
            info!("▶️ 开始运行 ({})", trigger);
            match runner.run_attendance(&ctx).await {
                Ok(report) if report.skipped => {}
                Ok(_) => info!("✓ 运行 ({}) 结束", trigger),
                Err(e) => log_run_error(trigger, &e),
            }
        });
    }

    info!("🛑 收到退出信号，取消进行中的运行");
    let _ = shutdown_tx.send(true);
    while runs.join_next().await.is_some() {}

    let drained = runner.sink().drain().await;
    if drained > 0 {
        info!("📨 退出前发送了 {} 条通知", drained);
    }
    info!("👋 程序退出");

    Ok(())
}

#[cfg(unix)]
mod signals {
    use tokio::signal::unix::{signal, Signal, SignalKind};

    /// SIGUSR1 触发一次手动运行
    pub struct ManualTrigger(Signal);

    impl ManualTrigger {
        pub fn install() -> std::io::Result<Self> {
            Ok(Self(signal(SignalKind::user_defined1())?))
        }

        pub async fn recv(&mut self) {
            if self.0.recv().await.is_none() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Ctrl-C 或 SIGTERM
    pub struct Shutdown(Signal);

    impl Shutdown {
        pub fn install() -> std::io::Result<Self> {
            Ok(Self(signal(SignalKind::terminate())?))
        }

        pub async fn recv(&mut self) {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = self.0.recv() => {}
            }
        }
    }
}

#[cfg(not(unix))]
mod signals {
    pub struct ManualTrigger;

    impl ManualTrigger {
        pub fn install() -> std::io::Result<Self> {
            Ok(Self)
        }

        pub async fn recv(&mut self) {
            std::future::pending::<()>().await;
        }
    }

    pub struct Shutdown;

    impl Shutdown {
        pub fn install() -> std::io::Result<Self> {
            Ok(Self)
        }

        pub async fn recv(&mut self) {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}
