use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{self, Instant};

/// レート制限の判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    Proceed,
    WaitUntil(Instant),
}

/// プロセス全体で1つのスロットル。呼び出し元ごとのキューは持たない
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call: Mutex::new(None),
        }
    }

    /// 記録はせずに判定だけ行う。枠を消費せずに待ち時間を知りたい呼び出し元向け
    pub async fn check(&self, now: Instant) -> Permit {
        let last_call = self.last_call.lock().await;
        permit_for(*last_call, now, self.interval)
    }

    /// 呼び出し枠を確保する。必要なら待機し、待った時間を返す
    pub async fn acquire(&self) -> Duration {
        let now = Instant::now();
        let start_at = {
            let mut last_call = self.last_call.lock().await;
            let start_at = match permit_for(*last_call, now, self.interval) {
                Permit::Proceed => now,
                Permit::WaitUntil(at) => at,
            };
            *last_call = Some(start_at);
            start_at
        };

        if start_at > now {
            tracing::debug!(
                "[RateLimit] waiting {:?} before next completion call",
                start_at - now
            );
            time::sleep_until(start_at).await;
        }
        start_at - now
    }
}

fn permit_for(last_call: Option<Instant>, now: Instant, interval: Duration) -> Permit {
    match last_call {
        Some(last) => {
            let ready_at = last + interval;
            if now < ready_at {
                Permit::WaitUntil(ready_at)
            } else {
                Permit::Proceed
            }
        }
        None => Permit::Proceed,
    }
}
