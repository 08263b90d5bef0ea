#![forbid(unsafe_code)]

// Behavior loop - periodic movement and chat for a spawned session

use crate::client::{ClientHandle, Control};
use crate::metrics::SwarmMetrics;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Canned lines the chat task picks from
pub const CHAT_MESSAGES: [&str; 5] = [
    "Hello!",
    "How are you?",
    "This is a test message.",
    "Benchmarking the server.",
    "PrismarineJS is awesome!",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BehaviorConfig {
    /// Period of the movement task
    pub movement_interval: Duration,
    /// How long `forward` stays engaged after each movement tick
    pub movement_duration: Duration,
    /// Period of the chat task
    pub chat_interval: Duration,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            movement_interval: Duration::from_millis(2000),
            movement_duration: Duration::from_millis(1000),
            chat_interval: Duration::from_millis(5000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorKind {
    Movement,
    Chat,
}

/// One periodic task owned by a session
#[derive(Debug)]
pub struct BehaviorTask {
    pub kind: BehaviorKind,
    pub interval: Duration,
    handle: JoinHandle<()>,
}

/// Movement and chat tasks of one session, sharing a single cancellation signal.
///
/// Dropping the loop cancels it.
#[derive(Debug)]
pub struct BehaviorLoop {
    token: CancellationToken,
    tasks: Vec<BehaviorTask>,
}

impl BehaviorLoop {
    pub fn attach(
        identity: &str,
        client: Arc<dyn ClientHandle>,
        config: &BehaviorConfig,
        token: CancellationToken,
        metrics: SwarmMetrics,
    ) -> Self {
        let movement = tokio::spawn(run_movement(
            identity.to_string(),
            client.clone(),
            config.movement_interval,
            config.movement_duration,
            token.clone(),
            metrics.clone(),
        ));
        let chat = tokio::spawn(run_chat(
            identity.to_string(),
            client,
            config.chat_interval,
            token.clone(),
            metrics,
        ));

        debug!("{}: Behavior attached", identity);

        Self {
            token,
            tasks: vec![
                BehaviorTask {
                    kind: BehaviorKind::Movement,
                    interval: config.movement_interval,
                    handle: movement,
                },
                BehaviorTask {
                    kind: BehaviorKind::Chat,
                    interval: config.chat_interval,
                    handle: chat,
                },
            ],
        }
    }

    pub fn tasks(&self) -> &[BehaviorTask] {
        &self.tasks
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancel(&self) {
        self.token.cancel();
        for task in &self.tasks {
            task.handle.abort();
        }
    }
}

impl Drop for BehaviorLoop {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Horizontal perturbation for one movement tick, each axis in [-1, 1).
pub fn movement_offset<R: Rng>(rng: &mut R) -> (f64, f64) {
    (rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0))
}

pub fn pick_message<R: Rng>(rng: &mut R) -> &'static str {
    CHAT_MESSAGES[rng.gen_range(0..CHAT_MESSAGES.len())]
}

/// First tick fires one full period after attach.
fn ticker(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn run_movement(
    identity: String,
    client: Arc<dyn ClientHandle>,
    period: Duration,
    hold: Duration,
    token: CancellationToken,
    metrics: SwarmMetrics,
) {
    let mut rng = StdRng::from_entropy();
    let mut ticker = ticker(period);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(position) = client.position() else {
            debug!("{}: Position unknown, skipping movement tick", identity);
            continue;
        };

        let (dx, dz) = movement_offset(&mut rng);
        let target = position.offset_horizontal(dx, dz);
        let engaged = client
            .look_at(target, true)
            .and_then(|_| client.set_control_state(Control::Forward, true));
        if let Err(e) = engaged {
            warn!("{}: Movement tick failed: {}", identity, e);
            continue;
        }
        metrics.inc_moves();

        // Overlaps with the next tick are allowed; each release is its own one-shot.
        let release_client = client.clone();
        let release_token = token.clone();
        let release_identity = identity.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = release_token.cancelled() => {}
                _ = sleep(hold) => {
                    if let Err(e) = release_client.set_control_state(Control::Forward, false) {
                        debug!("{}: Forward release failed: {}", release_identity, e);
                    }
                }
            }
        });
    }

    debug!("{}: Movement task stopped", identity);
}

async fn run_chat(
    identity: String,
    client: Arc<dyn ClientHandle>,
    period: Duration,
    token: CancellationToken,
    metrics: SwarmMetrics,
) {
    let mut rng = StdRng::from_entropy();
    let mut ticker = ticker(period);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let message = pick_message(&mut rng);
        match client.chat(message) {
            Ok(()) => metrics.inc_chats(),
            Err(e) => warn!("{}: Chat failed: {}", identity, e),
        }
    }

    debug!("{}: Chat task stopped", identity);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::scripted::{ControlCall, FakeClient};
    use crate::client::Vec3;

    fn attach(client: &Arc<FakeClient>) -> BehaviorLoop {
        BehaviorLoop::attach(
            "Bot1",
            client.clone(),
            &BehaviorConfig::default(),
            CancellationToken::new(),
            SwarmMetrics::new(),
        )
    }

    #[test]
    fn test_movement_offset_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            let (dx, dz) = movement_offset(&mut rng);
            assert!((-1.0..1.0).contains(&dx));
            assert!((-1.0..1.0).contains(&dz));
        }
    }

    #[test]
    fn test_pick_message_from_canned_set() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1_000 {
            assert!(CHAT_MESSAGES.contains(&pick_message(&mut rng)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_follow_periods() {
        let client = Arc::new(FakeClient::at(Vec3::new(5.0, 70.0, -5.0)));
        let behavior = attach(&client);
        assert_eq!(behavior.tasks().len(), 2);
        assert_eq!(behavior.tasks()[0].kind, BehaviorKind::Movement);
        assert_eq!(behavior.tasks()[1].interval, Duration::from_millis(5000));

        sleep(Duration::from_millis(5500)).await;

        // Movement at 2000 and 4000, releases at 3000 and 5000, chat at 5000.
        let calls = client.calls();
        let looks: Vec<Vec3> = calls
            .iter()
            .filter_map(|c| match c {
                ControlCall::LookAt(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(looks.len(), 2);
        for p in looks {
            assert_eq!(p.y, 70.0);
            assert!((4.0..6.0).contains(&p.x));
            assert!((-6.0..-4.0).contains(&p.z));
        }
        assert_eq!(client.count(|c| *c == ControlCall::Control(Control::Forward, true)), 2);
        assert_eq!(client.count(|c| *c == ControlCall::Control(Control::Forward, false)), 2);
        let chats: Vec<_> = calls
            .iter()
            .filter_map(|c| match c {
                ControlCall::Chat(m) => Some(m.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(chats.len(), 1);
        assert!(CHAT_MESSAGES.contains(&chats[0].as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_tick() {
        let client = Arc::new(FakeClient::at(Vec3::default()));
        let behavior = attach(&client);

        sleep(Duration::from_millis(1999)).await;
        behavior.cancel();
        assert!(behavior.is_cancelled());

        sleep(Duration::from_secs(30)).await;
        assert!(client.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_release() {
        let client = Arc::new(FakeClient::at(Vec3::default()));
        let behavior = attach(&client);

        sleep(Duration::from_millis(2500)).await;
        drop(behavior);
        sleep(Duration::from_secs(30)).await;

        assert_eq!(client.count(|c| matches!(c, ControlCall::LookAt(_))), 1);
        assert_eq!(client.count(|c| *c == ControlCall::Control(Control::Forward, false)), 0);
        assert_eq!(client.count(|c| matches!(c, ControlCall::Chat(_))), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_position_skips_movement() {
        let client = Arc::new(FakeClient::default());
        let _behavior = attach(&client);

        sleep(Duration::from_millis(5500)).await;
        assert_eq!(client.count(|c| matches!(c, ControlCall::LookAt(_))), 0);
        assert_eq!(client.count(|c| matches!(c, ControlCall::Chat(_))), 1);
    }
}
